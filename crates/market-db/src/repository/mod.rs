//! # Repository Module
//!
//! Database repository implementations for the marketplace.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  HTTP handler                                                          │
//! │       │                                                                 │
//! │       │  db.orders().place_order(buyer, order_id, contact_id)          │
//! │       ▼                                                                 │
//! │  OrderRepository                                                       │
//! │  ├── add_items / remove_items / update_items                           │
//! │  ├── get_basket                                                        │
//! │  ├── place_order   ──► orders + notification_outbox (one transaction) │
//! │  └── list_orders / get_order / supplier_orders / supplier_order        │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CatalogRepository`](catalog::CatalogRepository) - Listings, categories, shops (read side)
//! - [`IngestRepository`](ingest::IngestRepository) - Price-list replacement
//! - [`ShopRepository`](shop::ShopRepository) - Supplier shop state
//! - [`OrderRepository`](order::OrderRepository) - Basket and orders
//! - [`ContactRepository`](contact::ContactRepository) - Buyer contacts
//! - [`UserRepository`](user::UserRepository) - Accounts and tokens
//! - [`OutboxRepository`](outbox::OutboxRepository) - Notification queue

pub mod catalog;
pub mod contact;
pub mod ingest;
pub mod order;
pub mod outbox;
pub mod shop;
pub mod user;
