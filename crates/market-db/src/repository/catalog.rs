//! # Catalog Repository
//!
//! Read side of the catalog: listings, categories, shops.
//!
//! ## Query Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. listings ⋈ shops ⋈ products ⋈ categories   → one row per listing   │
//! │  2. listing_parameters WHERE listing_id IN (…)  → grouped in memory     │
//! │                                                                         │
//! │  Parameters are never joined into the first query, so a listing with   │
//! │  four parameters is still one listing (and one basket line when        │
//! │  totals are computed).                                                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use market_core::{
    Category, ListingFilter, ListingParameter, ListingView, Money, ProductSummary, Shop,
};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::DbResult;

/// Columns of [`ListingRow`]; combine with [`LISTING_JOINS`].
pub(crate) const LISTING_COLUMNS: &str = r#"
    l.id, l.external_id, l.model, l.shop_id, s.name AS shop_name,
    l.price, l.price_rrc, l.quantity,
    p.name AS product_name, p.category_id, c.name AS category_name
"#;

pub(crate) const LISTING_JOINS: &str = r#"
    JOIN shops s ON s.id = l.shop_id
    JOIN products p ON p.id = l.product_id
    JOIN categories c ON c.id = p.category_id
"#;

/// Flat listing row as returned by SQLite.
#[derive(Debug, Clone, FromRow)]
pub(crate) struct ListingRow {
    pub id: i64,
    pub external_id: i64,
    pub model: String,
    pub shop_id: i64,
    pub shop_name: String,
    pub price: Money,
    pub price_rrc: Money,
    pub quantity: i64,
    pub product_name: String,
    pub category_id: i64,
    pub category_name: String,
}

impl ListingRow {
    pub(crate) fn into_view(self, parameters: Vec<ListingParameter>) -> ListingView {
        ListingView {
            id: self.id,
            external_id: self.external_id,
            model: self.model,
            shop_id: self.shop_id,
            shop: self.shop_name,
            price: self.price,
            price_rrc: self.price_rrc,
            quantity: self.quantity,
            product: ProductSummary {
                name: self.product_name,
                category_id: self.category_id,
                category: self.category_name,
            },
            product_parameters: parameters,
        }
    }
}

#[derive(Debug, FromRow)]
struct ParameterRow {
    listing_id: i64,
    name: String,
    value: String,
}

/// Loads the parameters of the given listings, keyed by listing id.
pub(crate) async fn load_parameters<'e, E>(
    executor: E,
    listing_ids: &[i64],
) -> DbResult<HashMap<i64, Vec<ListingParameter>>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let mut grouped: HashMap<i64, Vec<ListingParameter>> = HashMap::new();
    if listing_ids.is_empty() {
        return Ok(grouped);
    }

    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT listing_id, name, value FROM listing_parameters WHERE listing_id IN (",
    );
    let mut separated = query.separated(", ");
    for id in listing_ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY id");

    let rows: Vec<ParameterRow> = query.build_query_as().fetch_all(executor).await?;
    for row in rows {
        grouped.entry(row.listing_id).or_default().push(ListingParameter {
            parameter: row.name,
            value: row.value,
        });
    }

    Ok(grouped)
}

/// Attaches parameters to listing rows.
pub(crate) async fn assemble_listings(
    pool: &SqlitePool,
    rows: Vec<ListingRow>,
) -> DbResult<Vec<ListingView>> {
    let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
    let mut parameters = load_parameters(pool, &ids).await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let params = parameters.remove(&row.id).unwrap_or_default();
            row.into_view(params)
        })
        .collect())
}

/// Repository for catalog queries.
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    /// Lists purchasable listings.
    ///
    /// Only listings of active shops are returned, ordered by id. Both
    /// filters are optional and combine with AND.
    pub async fn list_listings(&self, filter: ListingFilter) -> DbResult<Vec<ListingView>> {
        debug!(shop_id = ?filter.shop_id, category_id = ?filter.category_id, "Listing catalog");

        let sql = format!(
            r#"
            SELECT {LISTING_COLUMNS}
            FROM product_listings l
            {LISTING_JOINS}
            WHERE s.active = 1
              AND (?1 IS NULL OR l.shop_id = ?1)
              AND (?2 IS NULL OR p.category_id = ?2)
            ORDER BY l.id
            "#
        );

        let rows = sqlx::query_as::<_, ListingRow>(&sql)
            .bind(filter.shop_id)
            .bind(filter.category_id)
            .fetch_all(&self.pool)
            .await?;

        assemble_listings(&self.pool, rows).await
    }

    /// Gets one listing regardless of its shop's state.
    pub async fn get_listing(&self, id: i64) -> DbResult<Option<ListingView>> {
        let sql = format!(
            "SELECT {LISTING_COLUMNS} FROM product_listings l {LISTING_JOINS} WHERE l.id = ?1"
        );
        let row = sqlx::query_as::<_, ListingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(assemble_listings(&self.pool, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Counts the listings of one shop (active or not).
    pub async fn count_listings(&self, shop_id: i64) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product_listings WHERE shop_id = ?1")
            .bind(shop_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Lists all categories, ordered by id.
    pub async fn list_categories(&self) -> DbResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(categories)
    }

    /// Lists active shops, ordered by id.
    pub async fn list_shops(&self) -> DbResult<Vec<Shop>> {
        let shops = sqlx::query_as::<_, Shop>(
            "SELECT id, name, url, user_id, active FROM shops WHERE active = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(shops)
    }
}
