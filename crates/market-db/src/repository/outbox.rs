//! # Notification Outbox Repository
//!
//! Manages the queue of notification events waiting for delivery.
//!
//! ## The Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Outbox Pattern Implementation                        │
//! │                                                                         │
//! │  STATE CHANGE (e.g., place_order)                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   SINGLE TRANSACTION                            │   │
//! │  │                                                                 │   │
//! │  │  1. UPDATE orders SET state = 'new' WHERE ... state = 'basket' │   │
//! │  │                                                                 │   │
//! │  │  2. INSERT INTO notification_outbox (kind, payload)            │   │
//! │  │     VALUES ('order_placed', <event JSON>)                      │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT ← Both succeed or both fail                                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │            DISPATCHER WORKER (market-api, async)                │   │
//! │  │                                                                 │   │
//! │  │  1. SELECT * FROM notification_outbox                          │   │
//! │  │     WHERE dispatched_at IS NULL AND attempts < max             │   │
//! │  │  2. For each entry: hand to the sink                           │   │
//! │  │     b. On success: SET dispatched_at = NOW()                   │   │
//! │  │     c. On failure: SET attempts += 1, last_error = ?           │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! │  The request that placed the order never waits for delivery.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use market_core::{NotificationEvent, OutboxEntry};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;

/// Entries that failed this many times are no longer picked up.
pub const MAX_DISPATCH_ATTEMPTS: i64 = 5;

/// Writes an event to the outbox on the given connection.
///
/// Pass the connection of an open transaction so the event commits (or
/// rolls back) together with the change that produced it.
pub(crate) async fn enqueue_in(
    conn: &mut SqliteConnection,
    event: &NotificationEvent,
) -> DbResult<OutboxEntry> {
    let entry = OutboxEntry {
        id: Uuid::new_v4().to_string(),
        kind: event.kind().to_string(),
        payload: serde_json::to_string(event)?,
        attempts: 0,
        last_error: None,
        created_at: Utc::now(),
        dispatched_at: None,
    };

    debug!(id = %entry.id, kind = %entry.kind, "Queuing notification");

    sqlx::query(
        r#"
        INSERT INTO notification_outbox (
            id, kind, payload, attempts, last_error, created_at, dispatched_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.kind)
    .bind(&entry.payload)
    .bind(entry.attempts)
    .bind(&entry.last_error)
    .bind(entry.created_at)
    .bind(entry.dispatched_at)
    .execute(&mut *conn)
    .await?;

    Ok(entry)
}

/// Repository for notification outbox operations.
#[derive(Debug, Clone)]
pub struct OutboxRepository {
    pool: SqlitePool,
}

impl OutboxRepository {
    /// Creates a new OutboxRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OutboxRepository { pool }
    }

    /// Queues an event outside of any other transaction.
    pub async fn enqueue(&self, event: &NotificationEvent) -> DbResult<OutboxEntry> {
        let mut conn = self.pool.acquire().await?;
        enqueue_in(&mut conn, event).await
    }

    /// Gets pending entries that still have attempts left.
    ///
    /// ## Returns
    /// Entries where `dispatched_at IS NULL`, oldest first.
    pub async fn get_pending(&self, limit: u32) -> DbResult<Vec<OutboxEntry>> {
        let entries = sqlx::query_as::<_, OutboxEntry>(
            r#"
            SELECT id, kind, payload, attempts, last_error, created_at, dispatched_at
            FROM notification_outbox
            WHERE dispatched_at IS NULL AND attempts < ?1
            ORDER BY created_at ASC
            LIMIT ?2
            "#,
        )
        .bind(MAX_DISPATCH_ATTEMPTS)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Marks an entry as delivered.
    pub async fn mark_dispatched(&self, id: &str) -> DbResult<()> {
        sqlx::query("UPDATE notification_outbox SET dispatched_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Records a delivery failure.
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE notification_outbox SET
                attempts = attempts + 1,
                last_error = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Counts undelivered entries, including exhausted ones.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notification_outbox WHERE dispatched_at IS NULL",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    /// Lists entries of one kind, newest first (diagnostics and tests).
    pub async fn list_by_kind(&self, kind: &str) -> DbResult<Vec<OutboxEntry>> {
        let entries = sqlx::query_as::<_, OutboxEntry>(
            r#"
            SELECT id, kind, payload, attempts, last_error, created_at, dispatched_at
            FROM notification_outbox
            WHERE kind = ?1
            ORDER BY created_at DESC
            "#,
        )
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Deletes delivered entries older than `days_old` days.
    pub async fn cleanup_dispatched(&self, days_old: u32) -> DbResult<u64> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days_old));
        let result = sqlx::query(
            r#"
            DELETE FROM notification_outbox
            WHERE dispatched_at IS NOT NULL AND dispatched_at < ?1
            "#,
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
