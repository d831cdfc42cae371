//! # Market API
//!
//! HTTP boundary of the marketplace.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Market API Routes (/api/v1)                     │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  Catalog       │  │  Basket        │  │  Orders                    ││
//! │  │                │  │                │  │                            ││
//! │  │ • /products    │  │ • GET  view    │  │ • GET  /orders             ││
//! │  │ • /categories  │  │ • POST add     │  │ • POST /orders (place)     ││
//! │  │ • /shops       │  │ • PUT  qty     │  │ • GET  /orders/{id}        ││
//! │  │                │  │ • DELETE lines │  │                            ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  Partner       │  │  Contact       │  │  Health                    ││
//! │  │  (shops only)  │  │                │  │                            ││
//! │  │ • update       │  │ • /user/contact│  │ • /health                  ││
//! │  │ • state        │  │   CRUD         │  │                            ││
//! │  │ • orders       │  │                │  │                            ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  Background: notifier::Dispatcher drains the outbox to Redis / log      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `HTTP_PORT` - HTTP server port (default: 8000)
//! - `DATABASE_PATH` - SQLite file (default: ./data/market.db)
//! - `DB_MAX_CONNECTIONS` - Pool size (default: 5)
//! - `REDIS_URL` - Redis for notifications (optional)
//! - `NOTIFY_CHANNEL` - Redis channel (default: market:notifications)
//! - `NOTIFY_POLL_INTERVAL_SECS` - Outbox poll interval (default: 5)
//! - `NOTIFY_BATCH_SIZE` - Entries per poll (default: 50)
//! - `FETCH_TIMEOUT_SECS` - Price-list download timeout (default: 30)

pub mod auth;
pub mod config;
pub mod error;
pub mod fetch;
pub mod notifier;
pub mod routes;

use std::sync::Arc;

use market_db::Database;

// Re-exports
pub use config::MarketConfig;
pub use error::{ApiError, ApiResult};
pub use fetch::Fetcher;
pub use routes::router;

/// Shared application state.
pub struct AppState {
    pub db: Database,
    pub config: MarketConfig,
    pub fetcher: Fetcher,
}

impl AppState {
    /// Builds the state, including the price-list HTTP client.
    pub fn new(db: Database, config: MarketConfig) -> reqwest::Result<Arc<Self>> {
        let fetcher = Fetcher::new(config.fetch_timeout(), config.fetch_max_bytes)?;
        Ok(Arc::new(AppState { db, config, fetcher }))
    }
}
