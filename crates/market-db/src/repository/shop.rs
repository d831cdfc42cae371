//! # Shop Repository
//!
//! Supplier-side shop operations: listing own shops and toggling whether
//! their listings can be bought.

use market_core::Shop;
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::DbResult;

/// Repository for supplier shop operations.
#[derive(Debug, Clone)]
pub struct ShopRepository {
    pool: SqlitePool,
}

impl ShopRepository {
    /// Creates a new ShopRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ShopRepository { pool }
    }

    /// Lists the shops owned by a supplier.
    pub async fn shops_of(&self, user_id: i64) -> DbResult<Vec<Shop>> {
        debug!(user_id, "Listing supplier shops");

        let shops = sqlx::query_as::<_, Shop>(
            "SELECT id, name, url, user_id, active FROM shops WHERE user_id = ?1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(shops)
    }

    /// Gets a shop by name.
    pub async fn find_by_name(&self, name: &str) -> DbResult<Option<Shop>> {
        let shop = sqlx::query_as::<_, Shop>(
            "SELECT id, name, url, user_id, active FROM shops WHERE name = ?1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(shop)
    }

    /// Sets the state of every shop of the supplier.
    ///
    /// ## Returns
    /// Number of shops updated (0 when the supplier has none).
    pub async fn set_state(&self, user_id: i64, active: bool) -> DbResult<u64> {
        let result = sqlx::query("UPDATE shops SET active = ?1 WHERE user_id = ?2")
            .bind(active)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        info!(user_id, active, shops = result.rows_affected(), "Shop state updated");
        Ok(result.rows_affected())
    }
}
