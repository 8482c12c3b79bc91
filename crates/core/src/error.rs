//! Domain rule violations.
//!
//! These are raised before any state changes, so a rejected mutation never
//! needs a rollback.

use thiserror::Error;

use crate::types::{AddressId, OrderId, OrderStatus, ProductId};

/// A mutation that would break a collection invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Order status change not permitted by the lifecycle.
    #[error("order status cannot move from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: OrderStatus,
        /// Requested status.
        to: OrderStatus,
    },

    /// Cart lines need at least one unit.
    #[error("quantity must be at least 1")]
    ZeroQuantity,

    /// Product is inactive or has no stock.
    #[error("product {0} is not available")]
    Unavailable(ProductId),

    /// No cart line for the product.
    #[error("product {0} is not in the cart")]
    NotInCart(ProductId),

    /// Address id not present in the address book.
    #[error("unknown address: {0}")]
    UnknownAddress(AddressId),

    /// Address has not been confirmed by the server yet.
    #[error("address {0} has not been saved yet")]
    UnconfirmedAddress(AddressId),

    /// Order id not present in the order list.
    #[error("unknown order: {0}")]
    UnknownOrder(OrderId),

    /// Checkout attempted with nothing in the cart.
    #[error("cart is empty")]
    EmptyCart,

    /// A required form field is blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Postal code is not six digits.
    #[error("invalid pincode: {0}")]
    InvalidPincode(String),
}
