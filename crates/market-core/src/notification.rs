//! # Notification Events
//!
//! Events the marketplace hands to the external notifier.
//!
//! Events are written to the outbox in the same transaction as the state
//! change that caused them, then delivered by the dispatcher worker.
//! Delivery itself (e-mail, chat, ...) happens outside this system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A notification waiting for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NotificationEvent {
    /// An account was created.
    UserRegistered { user_id: i64, email: String },

    /// A basket became a placed order.
    OrderPlaced {
        order_id: i64,
        user_id: i64,
        email: String,
    },
}

impl NotificationEvent {
    /// Stable name stored in the outbox `kind` column.
    pub const fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::UserRegistered { .. } => "user_registered",
            NotificationEvent::OrderPlaced { .. } => "order_placed",
        }
    }

    /// Recipient address of the notification.
    pub fn recipient(&self) -> &str {
        match self {
            NotificationEvent::UserRegistered { email, .. }
            | NotificationEvent::OrderPlaced { email, .. } => email,
        }
    }
}

/// A row of the notification outbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OutboxEntry {
    /// UUID, usable by consumers as an idempotency key.
    pub id: String,
    pub kind: String,
    /// The serialized [`NotificationEvent`].
    pub payload: String,
    pub attempts: i64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub dispatched_at: Option<DateTime<Utc>>,
}

impl OutboxEntry {
    /// Decodes the stored event.
    pub fn event(&self) -> Result<NotificationEvent, serde_json::Error> {
        serde_json::from_str(&self.payload)
    }
}
