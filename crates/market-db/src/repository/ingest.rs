//! # Ingest Repository
//!
//! Replaces a supplier's catalog with the content of a price list.
//!
//! ## Replacement Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   SINGLE TRANSACTION                                    │
//! │                                                                         │
//! │  1. shop         resolve by name, create if missing                     │
//! │                  (a name owned by another supplier aborts)              │
//! │  2. categories   upsert by external id, link to the shop                │
//! │  3. listings     DELETE basket lines of the shop's listings             │
//! │                  DELETE every listing of the shop                       │
//! │                  (cascades to parameters; placed lines keep their       │
//! │                  snapshot and lose only the listing reference)          │
//! │  4. per goods    product (name, category) get-or-create                 │
//! │                  INSERT listing, INSERT one row per parameter           │
//! │                                                                         │
//! │  COMMIT ← readers see either the old catalog or the new one            │
//! │  error  ← transaction dropped, old catalog untouched                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use market_core::price_list::PriceList;
use market_core::{CoreError, IngestReport};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::DbResult;

/// Repository for price-list ingestion.
#[derive(Debug, Clone)]
pub struct IngestRepository {
    pool: SqlitePool,
}

impl IngestRepository {
    /// Creates a new IngestRepository.
    pub fn new(pool: SqlitePool) -> Self {
        IngestRepository { pool }
    }

    /// Replaces all listings of the supplier's shop named in `list`.
    ///
    /// ## Arguments
    /// * `supplier_id` - Account performing the upload
    /// * `url` - Where the document came from (stored on the shop)
    /// * `list` - Parsed and validated document
    ///
    /// ## Errors
    /// - `Uniqueness` when the shop name belongs to another supplier
    pub async fn replace_catalog(
        &self,
        supplier_id: i64,
        url: Option<&str>,
        list: &PriceList,
    ) -> DbResult<IngestReport> {
        let mut tx = self.pool.begin().await?;

        let shop_id = resolve_shop(&mut tx, supplier_id, &list.shop, url).await?;

        for category in &list.categories {
            sqlx::query("INSERT INTO categories (id, name) VALUES (?1, ?2) ON CONFLICT(id) DO NOTHING")
                .bind(category.id)
                .bind(&category.name)
                .execute(&mut *tx)
                .await?;

            sqlx::query("INSERT OR IGNORE INTO shop_categories (shop_id, category_id) VALUES (?1, ?2)")
                .bind(shop_id)
                .bind(category.id)
                .execute(&mut *tx)
                .await?;
        }

        let released = sqlx::query(
            r#"
            DELETE FROM order_lines
            WHERE listing_id IN (SELECT id FROM product_listings WHERE shop_id = ?1)
              AND order_id IN (SELECT id FROM orders WHERE state = 'basket')
            "#,
        )
        .bind(shop_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let removed = sqlx::query("DELETE FROM product_listings WHERE shop_id = ?1")
            .bind(shop_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        debug!(shop_id, removed, released, "Previous listings removed");

        let mut parameters = 0;
        for item in &list.goods {
            let product_id = resolve_product(&mut tx, &item.name, item.category).await?;

            let listing_id = sqlx::query(
                r#"
                INSERT INTO product_listings (
                    external_id, model, price, price_rrc, quantity, product_id, shop_id
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(item.id)
            .bind(&item.model)
            .bind(item.price)
            .bind(item.price_rrc)
            .bind(item.quantity)
            .bind(product_id)
            .bind(shop_id)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

            for (name, value) in &item.parameters {
                sqlx::query(
                    "INSERT INTO listing_parameters (listing_id, name, value) VALUES (?1, ?2, ?3)",
                )
                .bind(listing_id)
                .bind(name)
                .bind(value)
                .execute(&mut *tx)
                .await?;
                parameters += 1;
            }
        }

        tx.commit().await?;

        let report = IngestReport {
            shop_id,
            categories: list.categories.len(),
            listings: list.goods.len(),
            parameters,
        };
        info!(
            supplier_id,
            shop = %list.shop,
            shop_id,
            listings = report.listings,
            parameters = report.parameters,
            "Price list ingested"
        );

        Ok(report)
    }
}

/// Finds the shop by name or creates it for the supplier.
async fn resolve_shop(
    conn: &mut SqliteConnection,
    supplier_id: i64,
    name: &str,
    url: Option<&str>,
) -> DbResult<i64> {
    let existing: Option<(i64, i64)> = sqlx::query_as("SELECT id, user_id FROM shops WHERE name = ?1")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

    match existing {
        Some((_, owner)) if owner != supplier_id => Err(CoreError::duplicate("shop", name).into()),
        Some((id, _)) => {
            if let Some(url) = url {
                sqlx::query("UPDATE shops SET url = ?1 WHERE id = ?2")
                    .bind(url)
                    .bind(id)
                    .execute(&mut *conn)
                    .await?;
            }
            Ok(id)
        }
        None => {
            let id = sqlx::query("INSERT INTO shops (name, url, user_id, active) VALUES (?1, ?2, ?3, 1)")
                .bind(name)
                .bind(url)
                .bind(supplier_id)
                .execute(&mut *conn)
                .await?
                .last_insert_rowid();
            debug!(shop_id = id, name, "Shop created");
            Ok(id)
        }
    }
}

/// Finds the product `(name, category)` or creates it.
async fn resolve_product(conn: &mut SqliteConnection, name: &str, category_id: i64) -> DbResult<i64> {
    sqlx::query("INSERT INTO products (name, category_id) VALUES (?1, ?2) ON CONFLICT(name, category_id) DO NOTHING")
        .bind(name)
        .bind(category_id)
        .execute(&mut *conn)
        .await?;

    let id: i64 = sqlx::query_scalar("SELECT id FROM products WHERE name = ?1 AND category_id = ?2")
        .bind(name)
        .bind(category_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(id)
}
