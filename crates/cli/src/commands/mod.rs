//! CLI command implementations.

pub mod admin;
pub mod session;
pub mod shop;

use std::fmt::Write as _;

use pantry_core::{Address, AddressBook, Cart, CartTotals, CurrencyCode, Order, Price, Product};
use rust_decimal::Decimal;
use pantry_sync::{ConfigError, SyncError};
use thiserror::Error;

/// Errors that end a CLI command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode output: {0}")]
    Json(#[from] serde_json::Error),

    /// Failure already printed as a JSON envelope.
    #[error("command failed")]
    Reported,
}

// =============================================================================
// Text rendering
// =============================================================================

/// Amount in the store currency, rounded to two places.
pub(crate) fn money(amount: Decimal) -> String {
    Price::new(amount, CurrencyCode::default()).to_string()
}

pub(crate) fn product_line(product: &Product) -> String {
    let availability = if product.is_purchasable() {
        format!("{} in stock", product.stock)
    } else {
        "unavailable".to_string()
    };
    format!(
        "{:<12} {:<32} {:>11} tax {}%  {availability}",
        product.id,
        product.name,
        money(product.price),
        product.tax_percent
    )
}

pub(crate) fn cart_text(cart: &Cart, totals: &CartTotals) -> String {
    if cart.is_empty() {
        return "Cart is empty".to_string();
    }
    let mut out = String::new();
    for item in cart.items() {
        let _ = writeln!(
            out,
            "{:<12} {:<32} {:>3} × {:>9} = {:>11}",
            item.product_id,
            item.name,
            item.quantity,
            money(item.price),
            money(item.line_total())
        );
    }
    let _ = writeln!(out, "Items    {:>11}", totals.item_count);
    let _ = writeln!(out, "Subtotal {:>11}", money(totals.subtotal));
    let _ = writeln!(out, "Shipping {:>11}", money(totals.shipping));
    let _ = writeln!(out, "Tax      {:>11}", money(totals.tax));
    let _ = write!(out, "Total    {:>11}", money(totals.total));
    out
}

pub(crate) fn address_line(address: &Address) -> String {
    let marker = if address.default { "*" } else { " " };
    let fields = &address.fields;
    format!(
        "{marker} {:<12} {} - {}, {}, {} {}",
        address.id, fields.name, fields.line1, fields.city, fields.state, fields.pincode
    )
}

pub(crate) fn address_book_text(book: &AddressBook) -> String {
    if book.is_empty() {
        return "No saved addresses".to_string();
    }
    book.addresses()
        .iter()
        .map(address_line)
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn order_line(order: &Order) -> String {
    format!(
        "{:<12} {}  {:<10} {:>11}  {} item(s)  {}",
        order.id(),
        order.created_at().format("%Y-%m-%d %H:%M"),
        order.status(),
        money(order.total_amount()),
        order.items().len(),
        order.payment_method()
    )
}

pub(crate) fn orders_text(orders: &[Order]) -> String {
    if orders.is_empty() {
        return "No orders".to_string();
    }
    orders.iter().map(order_line).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use pantry_core::{AddressFields, AddressId, CartItem, Phone, ProductId};
    use rust_decimal::Decimal;

    use super::*;

    fn item(id: &str, quantity: u32, price: i64) -> CartItem {
        CartItem {
            product_id: ProductId::new(id),
            name: format!("Product {id}"),
            image: None,
            quantity,
            price: Decimal::from(price),
        }
    }

    #[test]
    fn test_cart_text_shows_totals() {
        let cart = Cart::from_items([item("p1", 2, 100), item("p2", 1, 50)]);
        let totals = cart.totals(|_| Decimal::ZERO);
        let text = cart_text(&cart, &totals);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 7);
        assert!(lines[4].starts_with("Shipping") && lines[4].ends_with("₹65.00"));
        assert!(lines[6].starts_with("Total") && lines[6].ends_with("₹315.00"));
    }

    #[test]
    fn test_empty_cart_text() {
        let cart = Cart::default();
        assert_eq!(cart_text(&cart, &CartTotals::default()), "Cart is empty");
    }

    #[test]
    fn test_address_line_marks_default() {
        let address = Address {
            id: AddressId::new("addr-1"),
            fields: AddressFields {
                name: "Asha".to_string(),
                phone: Phone::parse("9876543210").expect("phone"),
                email: None,
                line1: "12 MG Road".to_string(),
                line2: None,
                city: "Bengaluru".to_string(),
                state: "Karnataka".to_string(),
                pincode: "560001".to_string(),
                landmark: None,
            },
            default: true,
        };
        assert!(address_line(&address).starts_with("* addr-1"));
    }

    #[test]
    fn test_money_rounds_to_paise() {
        assert_eq!(money(Decimal::new(12_345, 3)), "₹12.35");
    }
}
