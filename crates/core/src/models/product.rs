//! Catalog products.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::cart::CartItem;
use crate::types::ProductId;

/// A product as served by `GET /products`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(alias = "_id")]
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Unit price.
    pub price: Decimal,
    /// Tax rate as a percentage (18 means 18%).
    #[serde(default, alias = "tax")]
    pub tax_percent: Decimal,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub stock: u32,
    #[serde(default = "default_active")]
    pub active: bool,
}

const fn default_active() -> bool {
    true
}

impl Product {
    /// Snapshot this product as a cart line.
    #[must_use]
    pub fn to_cart_item(&self, quantity: u32) -> CartItem {
        CartItem {
            product_id: self.id.clone(),
            name: self.name.clone(),
            image: self.images.first().cloned(),
            quantity,
            price: self.price,
        }
    }

    /// Whether the product can be added to a cart.
    #[must_use]
    pub const fn is_purchasable(&self) -> bool {
        self.active && self.stock > 0
    }
}

/// Admin create/update payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub tax_percent: Decimal,
    pub category: Option<String>,
    pub images: Vec<String>,
    pub stock: u32,
    pub active: bool,
}
