//! Placed orders.
//!
//! An order captures its lines, total and shipping address at placement
//! time; later catalog changes never reach it. Only the status moves, and
//! only along the lifecycle in [`OrderStatus`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::models::address::AddressFields;
use crate::models::cart::{Cart, CartItem};
use crate::types::{OrderId, OrderStatus, PaymentMethod, ProductId};

/// A line item frozen at order time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub price: Decimal,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
}

impl From<&CartItem> for OrderItem {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id.clone(),
            quantity: item.quantity,
            price: item.price,
            name: item.name.clone(),
            image: item.image.clone(),
        }
    }
}

/// Body of `POST /auth/orders/:phone`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    pub shipping_address: AddressFields,
    pub payment_method: PaymentMethod,
}

impl OrderRequest {
    /// Snapshot the cart for submission.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::EmptyCart`] if there is nothing to order.
    pub fn from_cart(
        cart: &Cart,
        total_amount: Decimal,
        shipping_address: AddressFields,
        payment_method: PaymentMethod,
    ) -> Result<Self, DomainError> {
        if cart.is_empty() {
            return Err(DomainError::EmptyCart);
        }
        Ok(Self {
            items: cart.items().iter().map(OrderItem::from).collect(),
            total_amount,
            shipping_address,
            payment_method,
        })
    }
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(alias = "_id", alias = "orderId")]
    id: OrderId,
    items: Vec<OrderItem>,
    total_amount: Decimal,
    #[serde(default)]
    status: OrderStatus,
    shipping_address: AddressFields,
    payment_method: PaymentMethod,
    created_at: DateTime<Utc>,
}

impl Order {
    /// Materialize a submitted request under a server-assigned id.
    #[must_use]
    pub fn new(id: OrderId, request: OrderRequest, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            items: request.items,
            total_amount: request.total_amount,
            status: OrderStatus::Pending,
            shipping_address: request.shipping_address,
            payment_method: request.payment_method,
            created_at,
        }
    }

    #[must_use]
    pub const fn id(&self) -> &OrderId {
        &self.id
    }

    #[must_use]
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    #[must_use]
    pub const fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    #[must_use]
    pub const fn status(&self) -> OrderStatus {
        self.status
    }

    #[must_use]
    pub const fn shipping_address(&self) -> &AddressFields {
        &self.shipping_address
    }

    #[must_use]
    pub const fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Move to `next`, returning the previous status.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::InvalidTransition`] if the lifecycle forbids it.
    pub fn set_status(&mut self, next: OrderStatus) -> Result<OrderStatus, DomainError> {
        let previous = self.status;
        self.status = previous.transition(next)?;
        Ok(previous)
    }
}

/// Sort newest first, the order lists are displayed in.
pub fn sort_newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
