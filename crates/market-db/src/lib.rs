//! # market-db: Database Layer for the Marketplace
//!
//! This crate provides database access for the marketplace.
//! It uses SQLite with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Marketplace Data Flow                            │
//! │                                                                         │
//! │  HTTP handler (POST /basket)                                           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     market-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │  │   │
//! │  │   │               │    │ CatalogRepo   │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ IngestRepo    │    │ 001_initial_ │  │   │
//! │  │   │ Connection    │    │ OrderRepo     │    │   schema.sql │  │   │
//! │  │   │ Management    │    │ OutboxRepo …  │    │              │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database                             │   │
//! │  │   ./data/market.db (WAL)                                        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (catalog, orders, ...)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use market_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./data/market.db")).await?;
//!
//! let listings = db.catalog().list_listings(Default::default()).await?;
//! let basket = db.orders().get_basket(buyer_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::catalog::CatalogRepository;
pub use repository::contact::ContactRepository;
pub use repository::ingest::IngestRepository;
pub use repository::order::OrderRepository;
pub use repository::outbox::{OutboxRepository, MAX_DISPATCH_ATTEMPTS};
pub use repository::shop::ShopRepository;
pub use repository::user::UserRepository;
