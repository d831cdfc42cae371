//! # Order Repository
//!
//! Baskets, placed orders and the supplier view of orders.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Lifecycle                                   │
//! │                                                                         │
//! │  1. BASKET (created lazily, at most one per buyer)                     │
//! │     └── add_items()    → lines inserted one by one                     │
//! │     └── update_items() → quantities changed                            │
//! │     └── remove_items() → lines deleted                                 │
//! │                                                                         │
//! │  2. PLACE                                                              │
//! │     └── place_order()  → state 'basket' → 'new'                        │
//! │     └── each line freezes shop_id, price and its listing snapshot      │
//! │     └── (also inserts OrderPlaced into the outbox, same transaction)   │
//! │                                                                         │
//! │  3. DOWNSTREAM (confirmed, assembled, sent, delivered, canceled)       │
//! │     └── set by other systems, read-only here                           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Totals are never stored. They are reduced from one row per order line
//! by `market_core::pricing` every time an order is read. Basket lines are
//! read through their live listing; placed lines only through the frozen
//! columns, so a later catalog replacement cannot change a placed order.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use market_core::pricing::{OrderTotals, PricedLine};
use market_core::{
    AddItemsOutcome, BasketView, BuyerInfo, CoreError, ItemRejection, LineUpdate, Money,
    NewLine, NotificationEvent, OrderDetail, OrderLineView, OrderState, OrderSummary,
};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::catalog::{load_parameters, ListingRow, LISTING_COLUMNS, LISTING_JOINS};
use crate::repository::contact::ContactRepository;
use crate::repository::outbox::enqueue_in;
use crate::repository::user::UserRepository;

/// Message of the PlaceOrder failure; covers every mismatch so callers
/// cannot learn which foreign orders exist.
pub const PLACE_ORDER_FAILED: &str = "Order could not be placed";

/// Message of the AddItems precondition failure.
pub const CONTACT_REQUIRED: &str = "Contact details are required before adding items";

#[derive(Debug, Clone, FromRow)]
struct OrderRow {
    id: i64,
    user_id: i64,
    contact_id: Option<i64>,
    state: OrderState,
    dt: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct LineRow {
    line_id: i64,
    line_quantity: i64,
    #[sqlx(flatten)]
    listing: ListingRow,
}

/// A placed line with the listing as it was at checkout.
#[derive(Debug, FromRow)]
struct FrozenLineRow {
    id: i64,
    quantity: i64,
    listing_snapshot: String,
}

/// One pricing row of an order list. Line columns are NULL for an order
/// without lines.
#[derive(Debug, FromRow)]
struct SummaryRow {
    id: i64,
    state: OrderState,
    dt: DateTime<Utc>,
    shop_id: Option<i64>,
    price: Option<Money>,
    quantity: Option<i64>,
}

/// Repository for basket and order operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    // =========================================================================
    // Basket
    // =========================================================================

    /// Adds lines to the buyer's basket, creating the basket if needed.
    ///
    /// Items are inserted independently: a listing already in the basket,
    /// an unknown listing or a listing of an inactive shop is reported in
    /// `rejected` and does not stop the remaining items.
    ///
    /// ## Errors
    /// - `Precondition` when the buyer has no contact on file
    pub async fn add_items(&self, user_id: i64, lines: &[NewLine]) -> DbResult<AddItemsOutcome> {
        if !ContactRepository::new(self.pool.clone()).exists_for(user_id).await? {
            return Err(CoreError::Precondition(CONTACT_REQUIRED.to_string()).into());
        }

        let mut conn = self.pool.acquire().await?;
        let basket_id = ensure_basket(&mut conn, user_id).await?;

        let mut outcome = AddItemsOutcome::default();
        for (index, line) in lines.iter().enumerate() {
            match insert_line(&mut conn, basket_id, line).await {
                Ok(()) => outcome.created += 1,
                Err(DbError::Domain(err)) => {
                    debug!(user_id, listing_id = line.listing_id, error = %err, "Basket item rejected");
                    outcome.rejected.push(ItemRejection {
                        index,
                        listing_id: Some(line.listing_id),
                        reason: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            user_id,
            basket_id,
            created = outcome.created,
            rejected = outcome.rejected.len(),
            "Items added to basket"
        );
        Ok(outcome)
    }

    /// Deletes lines from the buyer's basket; returns the number removed.
    ///
    /// Ids of lines outside the buyer's basket are ignored.
    pub async fn remove_items(&self, user_id: i64, line_ids: &[i64]) -> DbResult<u64> {
        if line_ids.is_empty() {
            return Ok(0);
        }

        let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
            "DELETE FROM order_lines WHERE order_id IN \
             (SELECT id FROM orders WHERE state = 'basket' AND user_id = ",
        );
        query.push_bind(user_id).push(") AND id IN (");
        let mut separated = query.separated(", ");
        for id in line_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let deleted = query.build().execute(&self.pool).await?.rows_affected();

        info!(user_id, deleted, "Items removed from basket");
        Ok(deleted)
    }

    /// Changes quantities of lines in the buyer's basket.
    ///
    /// Updates of lines outside the buyer's basket are ignored.
    pub async fn update_items(&self, user_id: i64, updates: &[LineUpdate]) -> DbResult<u64> {
        let mut tx = self.pool.begin().await?;
        let mut updated = 0;

        for update in updates {
            updated += sqlx::query(
                r#"
                UPDATE order_lines SET quantity = ?1
                WHERE id = ?2
                  AND order_id IN (SELECT id FROM orders WHERE state = 'basket' AND user_id = ?3)
                "#,
            )
            .bind(update.quantity)
            .bind(update.id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;

        info!(user_id, updated, "Basket quantities updated");
        Ok(updated)
    }

    /// Gets the buyer's basket with totals, if one exists.
    pub async fn get_basket(&self, user_id: i64) -> DbResult<Option<BasketView>> {
        let basket = sqlx::query_as::<_, OrderRow>(
            "SELECT id, user_id, contact_id, state, dt FROM orders WHERE user_id = ?1 AND state = 'basket'",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(basket) = basket else {
            return Ok(None);
        };

        let mut conn = self.pool.acquire().await?;
        let ordered_items = load_live_lines(&mut conn, basket.id).await?;
        let totals = OrderTotals::of_views(&ordered_items);

        Ok(Some(BasketView {
            id: basket.id,
            dt: basket.dt,
            state: basket.state,
            ordered_items,
            sum: totals.sum,
            delivery: totals.delivery,
            total_sum: totals.total_sum,
        }))
    }

    // =========================================================================
    // Placing
    // =========================================================================

    /// Turns the buyer's basket into a placed order.
    ///
    /// ## Compare-and-swap
    /// The state change is one `UPDATE … WHERE state = 'basket'` guarded by
    /// ownership of the order and the contact and by the basket having
    /// lines. The `OrderPlaced` event is queued in the same transaction, so
    /// under concurrent calls exactly one succeeds and one event exists.
    ///
    /// The winning transaction also copies every line's shop, price and
    /// listing view onto the line.
    ///
    /// ## Errors
    /// - `Argument` when nothing matched (foreign, missing, already placed,
    ///   empty, or a contact of someone else)
    pub async fn place_order(&self, user_id: i64, order_id: i64, contact_id: i64) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let changed = sqlx::query(
            r#"
            UPDATE orders SET state = 'new', contact_id = ?1
            WHERE id = ?2
              AND user_id = ?3
              AND state = 'basket'
              AND EXISTS (SELECT 1 FROM contacts WHERE id = ?1 AND user_id = ?3)
              AND EXISTS (SELECT 1 FROM order_lines WHERE order_id = ?2)
            "#,
        )
        .bind(contact_id)
        .bind(order_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if changed != 1 {
            warn!(user_id, order_id, contact_id, "Order placement rejected");
            return Err(CoreError::argument(PLACE_ORDER_FAILED).into());
        }

        let lines = load_live_lines(&mut tx, order_id).await?;
        for line in &lines {
            sqlx::query(
                "UPDATE order_lines SET shop_id = ?1, price = ?2, listing_snapshot = ?3 WHERE id = ?4",
            )
            .bind(line.product_info.shop_id)
            .bind(line.product_info.price)
            .bind(serde_json::to_string(&line.product_info)?)
            .bind(line.id)
            .execute(&mut *tx)
            .await?;
        }

        let email: String = sqlx::query_scalar("SELECT email FROM users WHERE id = ?1")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

        enqueue_in(
            &mut tx,
            &NotificationEvent::OrderPlaced {
                order_id,
                user_id,
                email,
            },
        )
        .await?;

        tx.commit().await?;

        info!(user_id, order_id, lines = lines.len(), "Order placed");
        Ok(())
    }

    // =========================================================================
    // Buyer Orders
    // =========================================================================

    /// Lists the buyer's placed orders, newest first.
    pub async fn list_orders(&self, user_id: i64) -> DbResult<Vec<OrderSummary>> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT o.id, o.state, o.dt, ol.shop_id, ol.price, ol.quantity
            FROM orders o
            LEFT JOIN order_lines ol ON ol.order_id = o.id
            WHERE o.user_id = ?1 AND o.state <> 'basket'
            ORDER BY o.dt DESC, o.id DESC, ol.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(summarize(rows, OrderTotals::with_delivery))
    }

    /// Gets one of the buyer's placed orders.
    ///
    /// ## Errors
    /// - `NotFound` for baskets, missing and foreign orders
    pub async fn get_order(&self, user_id: i64, order_id: i64) -> DbResult<OrderDetail> {
        let order = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT id, user_id, contact_id, state, dt FROM orders
            WHERE id = ?1 AND user_id = ?2 AND state <> 'basket'
            "#,
        )
        .bind(order_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CoreError::not_found("Order", order_id))?;

        let lines = self.load_frozen_lines(order.id, None).await?;
        let totals = OrderTotals::of_views(&lines);
        self.detail(order, lines, totals).await
    }

    // =========================================================================
    // Supplier Orders
    // =========================================================================

    /// Lists placed orders containing the supplier's listings.
    ///
    /// Totals count only the supplier's own lines, without delivery.
    pub async fn supplier_orders(&self, supplier_id: i64) -> DbResult<Vec<OrderSummary>> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            r#"
            SELECT o.id, o.state, o.dt, ol.shop_id, ol.price, ol.quantity
            FROM orders o
            JOIN order_lines ol ON ol.order_id = o.id
            JOIN shops s ON s.id = ol.shop_id
            WHERE s.user_id = ?1 AND o.state <> 'basket'
            ORDER BY o.dt DESC, o.id DESC, ol.id
            "#,
        )
        .bind(supplier_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(summarize(rows, OrderTotals::items_only))
    }

    /// Gets a placed order as seen by a supplier: only their own lines.
    ///
    /// ## Errors
    /// - `NotFound` when the order has no line of the supplier
    pub async fn supplier_order(&self, supplier_id: i64, order_id: i64) -> DbResult<OrderDetail> {
        let order = sqlx::query_as::<_, OrderRow>(
            "SELECT id, user_id, contact_id, state, dt FROM orders WHERE id = ?1 AND state <> 'basket'",
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| CoreError::not_found("Order", order_id))?;

        let lines = self.load_frozen_lines(order.id, Some(supplier_id)).await?;
        if lines.is_empty() {
            return Err(CoreError::not_found("Order", order_id).into());
        }

        let priced: Vec<PricedLine> = lines.iter().map(PricedLine::from).collect();
        let totals = OrderTotals::items_only(&priced);
        self.detail(order, lines, totals).await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Loads the frozen lines of a placed order, optionally only the lines
    /// of one supplier's shops.
    async fn load_frozen_lines(
        &self,
        order_id: i64,
        supplier_id: Option<i64>,
    ) -> DbResult<Vec<OrderLineView>> {
        let rows = sqlx::query_as::<_, FrozenLineRow>(
            r#"
            SELECT ol.id, ol.quantity, ol.listing_snapshot
            FROM order_lines ol
            LEFT JOIN shops s ON s.id = ol.shop_id
            WHERE ol.order_id = ?1
              AND ol.listing_snapshot IS NOT NULL
              AND (?2 IS NULL OR s.user_id = ?2)
            ORDER BY ol.id
            "#,
        )
        .bind(order_id)
        .bind(supplier_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> DbResult<OrderLineView> {
                Ok(OrderLineView {
                    id: row.id,
                    quantity: row.quantity,
                    product_info: serde_json::from_str(&row.listing_snapshot)?,
                })
            })
            .collect()
    }

    async fn detail(
        &self,
        order: OrderRow,
        ordered_items: Vec<OrderLineView>,
        totals: OrderTotals,
    ) -> DbResult<OrderDetail> {
        let buyer = UserRepository::new(self.pool.clone())
            .get(order.user_id)
            .await?
            .ok_or_else(|| DbError::not_found("User", order.user_id))?;

        let contact = match order.contact_id {
            Some(id) => {
                ContactRepository::new(self.pool.clone())
                    .get(order.user_id, id)
                    .await?
            }
            None => None,
        };

        Ok(OrderDetail {
            id: order.id,
            dt: order.dt,
            state: order.state,
            ordered_items,
            total_sum: totals.total_sum,
            user: BuyerInfo::from(&buyer),
            phone: contact.as_ref().map(|c| c.phone.clone()),
            contact: contact.as_ref().map(|c| c.address()),
        })
    }
}

/// Returns the buyer's basket id, creating the basket if needed.
///
/// The partial unique index on `orders(user_id) WHERE state = 'basket'`
/// makes the insert a no-op when a basket already exists, including one
/// created concurrently.
async fn ensure_basket(conn: &mut SqliteConnection, user_id: i64) -> DbResult<i64> {
    sqlx::query(
        r#"
        INSERT INTO orders (user_id, state, dt) VALUES (?1, 'basket', ?2)
        ON CONFLICT (user_id) WHERE state = 'basket' DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    let id: i64 = sqlx::query_scalar("SELECT id FROM orders WHERE user_id = ?1 AND state = 'basket'")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(id)
}

/// Loads the lines of a basket with their current listings.
async fn load_live_lines(conn: &mut SqliteConnection, order_id: i64) -> DbResult<Vec<OrderLineView>> {
    let sql = format!(
        r#"
        SELECT ol.id AS line_id, ol.quantity AS line_quantity,
               {LISTING_COLUMNS}
        FROM order_lines ol
        JOIN product_listings l ON l.id = ol.listing_id
        {LISTING_JOINS}
        WHERE ol.order_id = ?1
        ORDER BY ol.id
        "#
    );

    let rows = sqlx::query_as::<_, LineRow>(&sql)
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

    let listing_ids: Vec<i64> = rows.iter().map(|row| row.listing.id).collect();
    let mut parameters = load_parameters(&mut *conn, &listing_ids).await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let params = parameters.remove(&row.listing.id).unwrap_or_default();
            OrderLineView {
                id: row.line_id,
                quantity: row.line_quantity,
                product_info: row.listing.into_view(params),
            }
        })
        .collect())
}

/// Inserts one basket line, mapping per-item failures to domain errors.
async fn insert_line(conn: &mut SqliteConnection, basket_id: i64, line: &NewLine) -> DbResult<()> {
    let purchasable: Option<i64> = sqlx::query_scalar(
        r#"
        SELECT l.id FROM product_listings l
        JOIN shops s ON s.id = l.shop_id
        WHERE l.id = ?1 AND s.active = 1
        "#,
    )
    .bind(line.listing_id)
    .fetch_optional(&mut *conn)
    .await?;

    if purchasable.is_none() {
        return Err(CoreError::not_found("Listing", line.listing_id).into());
    }

    sqlx::query("INSERT INTO order_lines (order_id, listing_id, quantity) VALUES (?1, ?2, ?3)")
        .bind(basket_id)
        .bind(line.listing_id)
        .bind(line.quantity)
        .execute(&mut *conn)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => CoreError::duplicate("listing", line.listing_id).into(),
            other => other,
        })?;

    Ok(())
}

/// Folds pricing rows (ordered by order) into one summary per order.
fn summarize(rows: Vec<SummaryRow>, totals: fn(&[PricedLine]) -> OrderTotals) -> Vec<OrderSummary> {
    let mut order: Vec<(i64, OrderState, DateTime<Utc>)> = Vec::new();
    let mut lines: HashMap<i64, Vec<PricedLine>> = HashMap::new();

    for row in rows {
        if order.last().map(|(id, _, _)| *id) != Some(row.id) {
            order.push((row.id, row.state, row.dt));
        }
        let entry = lines.entry(row.id).or_default();
        if let (Some(shop_id), Some(price), Some(quantity)) = (row.shop_id, row.price, row.quantity) {
            entry.push(PricedLine::new(shop_id, price, quantity));
        }
    }

    order
        .into_iter()
        .map(|(id, state, dt)| {
            let priced = lines.remove(&id).unwrap_or_default();
            OrderSummary {
                id,
                dt,
                state,
                total_sum: totals(&priced).total_sum,
            }
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
