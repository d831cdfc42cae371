//! # market-core: Pure Business Logic for the Marketplace
//!
//! This crate holds the domain rules of the marketplace as pure functions
//! with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Marketplace Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    market-api (HTTP boundary)                   │   │
//! │  │   /partner/update ──► /products ──► /basket ──► /orders         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ market-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌────────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │  pricing  │  │ price_list │  │validation │  │   │
//! │  │   │  Listing  │  │  totals   │  │  document  │  │  request  │  │   │
//! │  │   │   Order   │  │ delivery  │  │   parse    │  │  fields   │  │   │
//! │  │   └───────────┘  └───────────┘  └────────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    market-db (Database Layer)                   │   │
//! │  │        SQLite queries, migrations, ingestion, outbox            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Shop, Listing, Order, Contact, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`pricing`] - Basket and order totals (item sum + delivery)
//! - [`price_list`] - Supplier price-list document parsing
//! - [`validation`] - Request field parsing and business rule validation
//! - [`notification`] - Events handed to the external notifier
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use market_core::money::Money;
//! use market_core::pricing::{OrderTotals, PricedLine};
//!
//! let lines = [
//!     PricedLine::new(1, Money::from_units(110_000), 2),
//!     PricedLine::new(1, Money::from_units(65_000), 1),
//! ];
//! let totals = OrderTotals::with_delivery(&lines);
//!
//! assert_eq!(totals.sum.units(), 285_000);
//! assert_eq!(totals.delivery.units(), 300); // one shop
//! assert_eq!(totals.total_sum.units(), 285_300);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod notification;
pub mod price_list;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use notification::{NotificationEvent, OutboxEntry};
pub use price_list::PriceList;
pub use pricing::{OrderTotals, PricedLine};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Flat delivery charge applied once per distinct shop in an order.
pub const DELIVERY_FEE: Money = Money::from_units(300);

/// Maximum quantity of a single listing in a basket.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 10000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 9999;

/// Highest unit price a price list may quote.
///
/// Keeps `price × MAX_ITEM_QUANTITY` summed over any realistic basket far
/// below `i64::MAX`.
pub const MAX_PRICE: Money = Money::from_units(1_000_000_000_000);
