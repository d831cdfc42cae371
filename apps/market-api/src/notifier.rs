//! # Notification Dispatcher
//!
//! Drains the notification outbox and hands each event to a sink.
//!
//! ## Dispatch Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Dispatch Flow                                    │
//! │                                                                         │
//! │  1. Business operation (register, place order)                          │
//! │     └── INSERT INTO notification_outbox (same transaction)             │
//! │                                                                         │
//! │  2. Dispatcher polls on interval                                        │
//! │     └── SELECT pending entries with attempts left                      │
//! │                                                                         │
//! │  3. Sink delivers each entry                                            │
//! │     ├── Redis PUBLISH on the notify channel                            │
//! │     └── or a log line when Redis is not configured                     │
//! │                                                                         │
//! │  4. Result recorded                                                     │
//! │     ├── delivered → dispatched_at = now                                │
//! │     └── failed    → attempts += 1, last_error                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Delivery is at-least-once: an entry delivered right before a crash is
//! sent again. Consumers deduplicate on the entry id.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use market_core::{NotificationEvent, OutboxEntry};
use market_db::{Database, DbResult};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Delivered entries older than this are purged when the dispatcher starts.
pub const DISPATCHED_RETENTION_DAYS: u32 = 30;

// =============================================================================
// Sinks
// =============================================================================

/// Sink delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Delivery failed: {0}")]
    Delivery(String),
}

/// Destination for notification events.
pub trait NotificationSink: Send + Sync + 'static {
    /// Delivers one outbox entry.
    fn deliver(
        &self,
        entry: &OutboxEntry,
        event: &NotificationEvent,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Writes events to the log. Used when no Redis is configured.
#[derive(Debug, Clone, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    async fn deliver(&self, entry: &OutboxEntry, event: &NotificationEvent) -> Result<(), SinkError> {
        info!(
            id = %entry.id,
            kind = event.kind(),
            recipient = event.recipient(),
            "Notification"
        );
        Ok(())
    }
}

/// Publishes events to a Redis pub/sub channel.
///
/// Message body: `{"id": <entry id>, "event": <NotificationEvent>}`.
#[derive(Clone)]
pub struct RedisSink {
    connection: MultiplexedConnection,
    channel: String,
}

impl RedisSink {
    /// Opens a multiplexed connection for publishing.
    pub async fn connect(client: &redis::Client, channel: impl Into<String>) -> redis::RedisResult<Self> {
        let connection = client.get_multiplexed_async_connection().await?;
        Ok(RedisSink {
            connection,
            channel: channel.into(),
        })
    }
}

impl NotificationSink for RedisSink {
    async fn deliver(&self, entry: &OutboxEntry, event: &NotificationEvent) -> Result<(), SinkError> {
        let message = json!({ "id": entry.id, "event": event }).to_string();
        let mut connection = self.connection.clone();
        let receivers: i64 = connection.publish(&self.channel, message).await?;
        debug!(id = %entry.id, channel = %self.channel, receivers, "Notification published");
        Ok(())
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Polls the outbox and delivers pending entries.
pub struct Dispatcher<S> {
    db: Database,
    sink: Arc<S>,
    poll_interval: Duration,
    batch_size: u32,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for controlling the dispatcher.
#[derive(Clone)]
pub struct DispatcherHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl DispatcherHandle {
    /// Triggers graceful shutdown.
    pub async fn shutdown(&self) {
        if self.shutdown_tx.send(()).await.is_err() {
            debug!("Dispatcher already stopped");
        }
    }
}

impl<S: NotificationSink> Dispatcher<S> {
    /// Creates a new dispatcher and returns a handle.
    pub fn new(db: Database, sink: S, poll_interval: Duration, batch_size: u32) -> (Self, DispatcherHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let dispatcher = Dispatcher {
            db,
            sink: Arc::new(sink),
            poll_interval,
            batch_size,
            shutdown_rx,
        };

        (dispatcher, DispatcherHandle { shutdown_tx })
    }

    /// Runs the dispatch loop.
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) {
        info!(interval = ?self.poll_interval, "Notification dispatcher starting");

        match self.db.outbox().cleanup_dispatched(DISPATCHED_RETENTION_DAYS).await {
            Ok(0) => {}
            Ok(purged) => info!(purged, "Old notifications purged"),
            Err(e) => warn!(?e, "Failed to purge old notifications"),
        }

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.dispatch_batch().await {
                        error!(?e, "Failed to dispatch outbox batch");
                    }
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Notification dispatcher shutting down");
                    break;
                }
            }
        }

        info!("Notification dispatcher stopped");
    }

    /// Delivers one batch of pending entries; returns how many were delivered.
    pub async fn dispatch_batch(&self) -> DbResult<usize> {
        let entries = self.db.outbox().get_pending(self.batch_size).await?;

        if entries.is_empty() {
            debug!("No pending notifications");
            return Ok(0);
        }

        debug!(count = entries.len(), "Dispatching notifications");

        let mut delivered = 0;
        for entry in entries {
            let outcome = match entry.event() {
                Ok(event) => self.sink.deliver(&entry, &event).await,
                Err(e) => Err(SinkError::Delivery(format!("undecodable payload: {e}"))),
            };

            match outcome {
                Ok(()) => {
                    self.db.outbox().mark_dispatched(&entry.id).await?;
                    delivered += 1;
                }
                Err(e) => {
                    warn!(id = %entry.id, kind = %entry.kind, attempts = entry.attempts + 1, error = %e, "Notification delivery failed");
                    self.db.outbox().mark_failed(&entry.id, &e.to_string()).await?;
                }
            }
        }

        if delivered > 0 {
            info!(delivered, "Notifications dispatched");
        }
        Ok(delivered)
    }
}

// =============================================================================
// Tests
// =============================================================================
