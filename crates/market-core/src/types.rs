//! # Domain Types
//!
//! Core domain types used throughout the marketplace.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────┐   ┌─────────────┐   ┌──────────────────┐              │
//! │  │    Shop     │◄──│   Listing   │──►│     Product      │──► Category  │
//! │  │  owner/user │   │ price, qty  │   │ name + category  │              │
//! │  │  active     │   │ parameters  │   └──────────────────┘              │
//! │  └─────────────┘   └──────▲──────┘                                      │
//! │                           │                                             │
//! │  ┌─────────────┐   ┌──────┴──────┐   ┌─────────────┐                   │
//! │  │    User     │──►│    Order    │──►│  OrderLine  │                   │
//! │  │ shop/buyer  │   │ state, dt   │   │  quantity   │                   │
//! │  └──────┬──────┘   └──────┬──────┘   └─────────────┘                   │
//! │         └──────► Contact ◄┘                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Rows that are read straight from SQLite derive `sqlx::FromRow` when the
//! `sqlx` feature is on. View types (`ListingView`, `BasketView`, ...) are
//! assembled by the repositories and serialized as API payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Users
// =============================================================================

/// The two kinds of marketplace account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum UserKind {
    /// Supplier: owns shops, uploads price lists, sees incoming orders.
    Shop,
    /// Buyer: keeps a basket and places orders.
    Buyer,
}

impl Default for UserKind {
    fn default() -> Self {
        UserKind::Buyer
    }
}

/// An account known to the marketplace.
///
/// Accounts are created by the surrounding platform; the core only reads
/// them to resolve an authenticated identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct User {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: String,
    pub company: String,
    pub position: String,
    pub kind: UserKind,
}

impl User {
    /// Whether this account may use the supplier (`/partner/*`) operations.
    #[inline]
    pub fn is_supplier(&self) -> bool {
        self.kind == UserKind::Shop
    }
}

/// Fields for creating an account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub middle_name: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub kind: UserKind,
}

// =============================================================================
// Catalog
// =============================================================================

/// A supplier's shop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Shop {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing)]
    pub user_id: i64,
    /// Whether listings of this shop are purchasable (`state` on the wire).
    #[serde(rename = "state")]
    pub active: bool,
}

/// A product category; the id is the supplier feed's external id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// A name/value pair attached to a listing, e.g. `Цвет: золотистый`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingParameter {
    pub parameter: String,
    pub value: String,
}

/// Product name with its category, embedded in listing payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSummary {
    pub name: String,
    pub category_id: i64,
    pub category: String,
}

/// A product as sold by one shop, with everything the catalog shows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingView {
    pub id: i64,
    pub external_id: i64,
    pub model: String,
    pub shop_id: i64,
    /// Shop name.
    pub shop: String,
    pub price: Money,
    pub price_rrc: Money,
    pub quantity: i64,
    pub product: ProductSummary,
    pub product_parameters: Vec<ListingParameter>,
}

/// Optional filters of the catalog query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingFilter {
    pub shop_id: Option<i64>,
    pub category_id: Option<i64>,
}

/// Summary of one price-list ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReport {
    pub shop_id: i64,
    pub categories: usize,
    pub listings: usize,
    pub parameters: usize,
}

// =============================================================================
// Contacts
// =============================================================================

/// A buyer's delivery address and phone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Contact {
    pub id: i64,
    #[serde(skip_serializing)]
    pub user_id: i64,
    pub city: String,
    pub street: String,
    pub house: Option<String>,
    pub structure: Option<String>,
    pub building: Option<String>,
    pub apartment: Option<String>,
    pub phone: String,
}

impl Contact {
    /// The address part of the contact, without the phone.
    pub fn address(&self) -> Address {
        Address {
            city: self.city.clone(),
            street: self.street.clone(),
            house: self.house.clone(),
            structure: self.structure.clone(),
            building: self.building.clone(),
            apartment: self.apartment.clone(),
        }
    }
}

/// Fields for creating a contact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactInput {
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub street: String,
    pub house: Option<String>,
    pub structure: Option<String>,
    pub building: Option<String>,
    pub apartment: Option<String>,
    #[serde(default)]
    pub phone: String,
}

/// Partial update of a contact; `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactPatch {
    pub city: Option<String>,
    pub street: Option<String>,
    pub house: Option<String>,
    pub structure: Option<String>,
    pub building: Option<String>,
    pub apartment: Option<String>,
    pub phone: Option<String>,
}

/// Delivery address shown on order details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub city: String,
    pub street: String,
    pub house: Option<String>,
    pub structure: Option<String>,
    pub building: Option<String>,
    pub apartment: Option<String>,
}

// =============================================================================
// Orders
// =============================================================================

/// Lifecycle state of an order.
///
/// The core performs only `Basket → Placed`; later states are set by
/// downstream systems and are read-only here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    /// Mutable pre-checkout order, one per buyer.
    Basket,
    /// Confirmed by the buyer; content is frozen.
    #[serde(rename = "new")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "new"))]
    Placed,
    Confirmed,
    Assembled,
    Sent,
    Delivered,
    Canceled,
}

impl OrderState {
    /// Wire/database name of the state.
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderState::Basket => "basket",
            OrderState::Placed => "new",
            OrderState::Confirmed => "confirmed",
            OrderState::Assembled => "assembled",
            OrderState::Sent => "sent",
            OrderState::Delivered => "delivered",
            OrderState::Canceled => "canceled",
        }
    }

    /// Whether lines may still be added, changed or removed.
    #[inline]
    pub const fn is_mutable(&self) -> bool {
        matches!(self, OrderState::Basket)
    }
}

impl Default for OrderState {
    fn default() -> Self {
        OrderState::Basket
    }
}

/// A line to add to the basket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLine {
    pub listing_id: i64,
    pub quantity: i64,
}

/// A quantity change for an existing basket line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineUpdate {
    pub id: i64,
    pub quantity: i64,
}

/// Why one requested basket item was not added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRejection {
    /// Position of the item in the request.
    pub index: usize,
    /// `None` when the entry named no readable listing id.
    pub listing_id: Option<i64>,
    pub reason: String,
}

/// Result of adding items to the basket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddItemsOutcome {
    pub created: usize,
    pub rejected: Vec<ItemRejection>,
}

/// One order line with its listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineView {
    pub id: i64,
    pub product_info: ListingView,
    pub quantity: i64,
}

/// The buyer's basket with computed totals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasketView {
    pub id: i64,
    pub dt: DateTime<Utc>,
    pub state: OrderState,
    pub ordered_items: Vec<OrderLineView>,
    pub sum: Money,
    pub delivery: Money,
    pub total_sum: Money,
}

/// Row of an order list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderSummary {
    pub id: i64,
    pub dt: DateTime<Utc>,
    pub state: OrderState,
    pub total_sum: Money,
}

/// Buyer details shown on an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyerInfo {
    pub last_name: String,
    pub first_name: String,
    pub middle_name: String,
    pub email: String,
}

impl From<&User> for BuyerInfo {
    fn from(user: &User) -> Self {
        BuyerInfo {
            last_name: user.last_name.clone(),
            first_name: user.first_name.clone(),
            middle_name: user.middle_name.clone(),
            email: user.email.clone(),
        }
    }
}

/// Full order view for buyers and suppliers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    pub id: i64,
    pub dt: DateTime<Utc>,
    pub state: OrderState,
    pub ordered_items: Vec<OrderLineView>,
    pub total_sum: Money,
    pub user: BuyerInfo,
    pub phone: Option<String>,
    pub contact: Option<Address>,
}

// =============================================================================
// Unit Tests
// =============================================================================
