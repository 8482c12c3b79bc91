//! Cart pricing rules.
//!
//! Shipping is a step function of the total number of units in the cart:
//!
//! | units | shipping |
//! |---|---|
//! | 0 | 0 |
//! | 1–2 | 45 |
//! | 3–8 | 65 |
//! | > 8 | 100 + 35 per started block of 5 units beyond the 8th |
//!
//! Tax is charged per line as `price * quantity * tax_percent / 100`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Flat rate for one or two units.
pub const SHIPPING_SMALL: i64 = 45;
/// Flat rate for three to eight units.
pub const SHIPPING_MEDIUM: i64 = 65;
/// Base rate once the cart exceeds [`SHIPPING_BULK_THRESHOLD`] units.
pub const SHIPPING_BULK_BASE: i64 = 100;
/// Surcharge per started block beyond the threshold.
pub const SHIPPING_BULK_STEP: i64 = 35;
/// Units covered by each surcharge block.
pub const SHIPPING_BULK_BLOCK: u32 = 5;
/// Largest unit count covered by the medium rate.
pub const SHIPPING_BULK_THRESHOLD: u32 = 8;

/// Shipping cost for a cart holding `units` items in total.
#[must_use]
pub fn shipping_cost(units: u32) -> Decimal {
    match units {
        0 => Decimal::ZERO,
        1..=2 => Decimal::from(SHIPPING_SMALL),
        3..=SHIPPING_BULK_THRESHOLD => Decimal::from(SHIPPING_MEDIUM),
        _ => {
            let extra_blocks = (units - SHIPPING_BULK_THRESHOLD).div_ceil(SHIPPING_BULK_BLOCK);
            Decimal::from(SHIPPING_BULK_BASE)
                + Decimal::from(SHIPPING_BULK_STEP) * Decimal::from(extra_blocks)
        }
    }
}

/// Tax owed on one cart line.
#[must_use]
pub fn line_tax(price: Decimal, quantity: u32, tax_percent: Decimal) -> Decimal {
    price * Decimal::from(quantity) * tax_percent / Decimal::ONE_HUNDRED
}

/// Derived cart figures. Always recomputed from the current lines, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CartTotals {
    /// Total units across all lines.
    pub item_count: u32,
    /// Σ price × quantity.
    pub subtotal: Decimal,
    /// Step-function shipping for `item_count`.
    pub shipping: Decimal,
    /// Σ per-line tax.
    pub tax: Decimal,
    /// subtotal + shipping + tax.
    pub total: Decimal,
}
