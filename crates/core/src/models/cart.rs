//! Shopping cart lines.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::pricing::{CartTotals, line_tax, shipping_cost};
use crate::types::ProductId;

/// One product line in the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    #[serde(alias = "id")]
    pub product_id: ProductId,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    pub quantity: u32,
    /// Unit price at the time the line was added.
    pub price: Decimal,
}

impl CartItem {
    /// `price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// The cart: at most one line per product, every line with quantity ≥ 1.
///
/// Deserialization goes through [`Cart::from_items`], so snapshots loaded
/// from disk or returned by the server are normalized the same way as local
/// mutations.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<CartItem>", into = "Vec<CartItem>")]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    /// Build a cart, merging duplicate products and dropping zero-quantity lines.
    #[must_use]
    pub fn from_items(items: impl IntoIterator<Item = CartItem>) -> Self {
        let mut cart = Self::default();
        for item in items {
            cart.add(item);
        }
        cart
    }

    /// Current lines in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up the line for a product.
    #[must_use]
    pub fn get(&self, product_id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|i| &i.product_id == product_id)
    }

    /// Add a line, or increase the quantity of the existing line for the
    /// same product. The existing line keeps its captured price and name.
    /// Adding zero units is a no-op.
    pub fn add(&mut self, item: CartItem) {
        if item.quantity == 0 {
            return;
        }
        match self
            .items
            .iter_mut()
            .find(|existing| existing.product_id == item.product_id)
        {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
            None => self.items.push(item),
        }
    }

    /// Set the quantity for a product already in the cart. Zero removes the line.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::NotInCart`] if there is no line for the product.
    pub fn set_quantity(&mut self, product_id: &ProductId, quantity: u32) -> Result<(), DomainError> {
        if quantity == 0 {
            return self.remove(product_id).map(|_| ());
        }
        let line = self
            .items
            .iter_mut()
            .find(|i| &i.product_id == product_id)
            .ok_or_else(|| DomainError::NotInCart(product_id.clone()))?;
        line.quantity = quantity;
        Ok(())
    }

    /// Remove the line for a product.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::NotInCart`] if there is no line for the product.
    pub fn remove(&mut self, product_id: &ProductId) -> Result<CartItem, DomainError> {
        let idx = self
            .items
            .iter()
            .position(|i| &i.product_id == product_id)
            .ok_or_else(|| DomainError::NotInCart(product_id.clone()))?;
        Ok(self.items.remove(idx))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |acc, i| acc.saturating_add(i.quantity))
    }

    /// Σ price × quantity.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Compute all derived figures. `tax_percent` supplies the current tax
    /// rate for each product.
    pub fn totals(&self, tax_percent: impl Fn(&ProductId) -> Decimal) -> CartTotals {
        let item_count = self.item_count();
        let subtotal = self.subtotal();
        let shipping = shipping_cost(item_count);
        let tax: Decimal = self
            .items
            .iter()
            .map(|i| line_tax(i.price, i.quantity, tax_percent(&i.product_id)))
            .sum();

        CartTotals {
            item_count,
            subtotal,
            shipping,
            tax,
            total: subtotal + shipping + tax,
        }
    }
}

impl From<Vec<CartItem>> for Cart {
    fn from(items: Vec<CartItem>) -> Self {
        Self::from_items(items)
    }
}

impl From<Cart> for Vec<CartItem> {
    fn from(cart: Cart) -> Self {
        cart.items
    }
}
