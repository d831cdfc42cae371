//! # Pricing
//!
//! Basket and order totals.
//!
//! ## Formula
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sum       = Σ line.quantity × line.price                               │
//! │  delivery  = |{ line.shop_id }| × DELIVERY_FEE   (once per shop)        │
//! │  total_sum = sum + delivery                                             │
//! │                                                                         │
//! │  Supplier views use `sum` alone: delivery belongs to the buyer's        │
//! │  order as a whole and is not split between suppliers.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Totals are reduced over one entry per order line. Callers must never feed
//! rows multiplied by a join (e.g. one row per listing parameter).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::OrderLineView;
use crate::DELIVERY_FEE;

/// The pricing-relevant part of one order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub shop_id: i64,
    pub price: Money,
    pub quantity: i64,
}

impl PricedLine {
    pub const fn new(shop_id: i64, price: Money, quantity: i64) -> Self {
        PricedLine {
            shop_id,
            price,
            quantity,
        }
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        self.price.multiply_quantity(self.quantity)
    }
}

impl From<&OrderLineView> for PricedLine {
    fn from(line: &OrderLineView) -> Self {
        PricedLine::new(
            line.product_info.shop_id,
            line.product_info.price,
            line.quantity,
        )
    }
}

/// Computed totals of an order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub sum: Money,
    pub delivery: Money,
    pub total_sum: Money,
}

impl OrderTotals {
    /// Buyer totals: item sum plus one delivery fee per distinct shop.
    pub fn with_delivery(lines: &[PricedLine]) -> Self {
        Self::with_fee(lines, DELIVERY_FEE)
    }

    /// Buyer totals with an explicit per-shop fee.
    pub fn with_fee(lines: &[PricedLine], fee: Money) -> Self {
        let sum = item_sum(lines);
        let delivery = fee * distinct_shops(lines) as i64;
        OrderTotals {
            sum,
            delivery,
            total_sum: sum + delivery,
        }
    }

    /// Supplier totals: item sum only.
    pub fn items_only(lines: &[PricedLine]) -> Self {
        let sum = item_sum(lines);
        OrderTotals {
            sum,
            delivery: Money::zero(),
            total_sum: sum,
        }
    }

    /// Buyer totals of already assembled line views.
    pub fn of_views(lines: &[OrderLineView]) -> Self {
        let priced: Vec<PricedLine> = lines.iter().map(PricedLine::from).collect();
        Self::with_delivery(&priced)
    }
}

/// Σ quantity × price.
pub fn item_sum(lines: &[PricedLine]) -> Money {
    lines.iter().map(PricedLine::line_total).sum()
}

/// Number of distinct shops among the lines.
pub fn distinct_shops(lines: &[PricedLine]) -> usize {
    lines
        .iter()
        .map(|line| line.shop_id)
        .collect::<BTreeSet<_>>()
        .len()
}

// =============================================================================
// Unit Tests
// =============================================================================
