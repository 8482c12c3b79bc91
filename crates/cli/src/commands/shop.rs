//! Shopper commands: catalog, cart, wishlist, addresses, checkout, orders.
//!
//! Mutations wait for the server before printing so the output is the
//! canonical state, not the optimistic one.

use std::fmt::Write as _;

use clap::{Args, Subcommand};
use pantry_core::{
    AddressFields, AddressId, Cart, CartTotals, DomainError, Email, OrderId, PaymentMethod, Phone,
    ProductId, Wishlist,
};
use pantry_sync::{Storefront, SyncError};
use serde::Serialize;

use super::{
    CliError, address_book_text, cart_text, money, order_line, orders_text, product_line,
};
use crate::output::Output;

#[derive(Subcommand)]
pub enum ProductsCommand {
    /// List the catalog
    List,
    /// Show one product
    Show {
        /// Product ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum CartCommand {
    /// Show lines and totals
    Show,
    /// Add units of a product
    Add {
        /// Product ID
        id: String,

        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set a line's quantity (0 removes it)
    Set {
        /// Product ID
        id: String,

        quantity: u32,
    },
    /// Remove a line
    Remove {
        /// Product ID
        id: String,
    },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
pub enum WishlistCommand {
    /// List liked products
    Show,
    /// Like or unlike a product
    Toggle {
        /// Product ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum AddressCommand {
    /// List saved addresses (`*` marks the default)
    List,
    /// Save a new address
    Add {
        #[command(flatten)]
        fields: AddressArgs,

        /// Make this the default address
        #[arg(long)]
        default: bool,
    },
    /// Replace an address's fields
    Update {
        /// Address ID
        id: String,

        #[command(flatten)]
        fields: AddressArgs,
    },
    /// Make an address the default
    Default {
        /// Address ID
        id: String,
    },
    /// Delete an address
    Remove {
        /// Address ID
        id: String,
    },
}

#[derive(Args)]
pub struct AddressArgs {
    /// Recipient name
    #[arg(long)]
    name: String,

    /// Contact number (defaults to the signed-in phone)
    #[arg(long)]
    phone: Option<Phone>,

    #[arg(long)]
    email: Option<Email>,

    #[arg(long)]
    line1: String,

    #[arg(long)]
    line2: Option<String>,

    #[arg(long)]
    city: String,

    #[arg(long)]
    state: String,

    /// Six-digit postal code
    #[arg(long)]
    pincode: String,

    #[arg(long)]
    landmark: Option<String>,
}

impl AddressArgs {
    fn into_fields(self, shop: &Storefront) -> Result<AddressFields, SyncError> {
        let phone = match self.phone {
            Some(phone) => phone,
            None => shop.session().phone()?,
        };
        Ok(AddressFields {
            name: self.name,
            phone,
            email: self.email,
            line1: self.line1,
            line2: self.line2,
            city: self.city,
            state: self.state,
            pincode: self.pincode,
            landmark: self.landmark,
        })
    }
}

#[derive(Subcommand)]
pub enum OrdersCommand {
    /// Show the local order history
    List,
    /// Reload the order history from the server
    Refresh,
    /// Show one order
    Show {
        /// Order ID
        id: String,
    },
}

#[derive(Serialize)]
struct CartView {
    items: Cart,
    totals: CartTotals,
}

impl CartView {
    /// Totals use each line's current tax rate, fetched if not cached.
    async fn priced(shop: &Storefront, items: Cart) -> Result<Self, SyncError> {
        let totals = shop.catalog().price_cart(&items).await?;
        Ok(Self { items, totals })
    }

    fn render(&self) -> String {
        cart_text(&self.items, &self.totals)
    }
}

// =============================================================================
// Catalog
// =============================================================================

pub async fn products(
    shop: &Storefront,
    output: &Output,
    action: ProductsCommand,
) -> Result<(), CliError> {
    match action {
        ProductsCommand::List => {
            let result = shop.catalog().list().await.map_err(SyncError::from);
            output.emit(result, |products| {
                products.iter().map(product_line).collect::<Vec<_>>().join("\n")
            })
        }
        ProductsCommand::Show { id } => {
            let result = shop
                .catalog()
                .product(&ProductId::new(id))
                .await
                .map_err(SyncError::from);
            output.emit(result, |product| {
                let mut text = product_line(product);
                if !product.description.is_empty() {
                    text.push('\n');
                    text.push_str(&product.description);
                }
                text
            })
        }
    }
}

// =============================================================================
// Cart
// =============================================================================

pub async fn cart(shop: &Storefront, output: &Output, action: CartCommand) -> Result<(), CliError> {
    let result = match action {
        CartCommand::Show => Ok(shop.cart().items()),
        CartCommand::Add { id, quantity } => {
            let id = ProductId::new(id);
            async { shop.cart().add_product(&id, quantity).await?.await }.await
        }
        CartCommand::Set { id, quantity } => {
            let id = ProductId::new(id);
            async { shop.cart().set_quantity(&id, quantity)?.await }.await
        }
        CartCommand::Remove { id } => {
            let id = ProductId::new(id);
            async { shop.cart().remove(&id)?.await }.await
        }
        CartCommand::Clear => async { shop.cart().clear()?.await }.await,
    };
    let view = match result {
        Ok(items) => CartView::priced(shop, items).await,
        Err(err) => Err(err),
    };
    output.emit(view, CartView::render)
}

// =============================================================================
// Wishlist
// =============================================================================

pub async fn wishlist(
    shop: &Storefront,
    output: &Output,
    action: WishlistCommand,
) -> Result<(), CliError> {
    let result: Result<Wishlist, SyncError> = match action {
        WishlistCommand::Show => Ok(shop.wishlist().items()),
        WishlistCommand::Toggle { id } => {
            let id = ProductId::new(id);
            async {
                let (liked, pending) = shop.wishlist().toggle(&id)?;
                tracing::info!(product_id = %id, liked, "Wishlist toggled");
                pending.await
            }
            .await
        }
    };
    output.emit(result, |wishlist| {
        if wishlist.is_empty() {
            return "Wishlist is empty".to_string();
        }
        wishlist
            .ids()
            .iter()
            .map(|id| match shop.catalog().cached(id) {
                Some(product) => product_line(&product),
                None => id.to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    })
}

// =============================================================================
// Addresses
// =============================================================================

pub async fn address(
    shop: &Storefront,
    output: &Output,
    action: AddressCommand,
) -> Result<(), CliError> {
    let addresses = shop.addresses();
    let result = match action {
        AddressCommand::List => Ok(addresses.list()),
        AddressCommand::Add { fields, default } => {
            async {
                let fields = fields.into_fields(shop)?;
                let (_, pending) = addresses.add(fields, default)?;
                pending.await
            }
            .await
        }
        AddressCommand::Update { id, fields } => {
            async {
                let fields = fields.into_fields(shop)?;
                addresses.update(&AddressId::new(id), fields)?.await
            }
            .await
        }
        AddressCommand::Default { id } => {
            let id = AddressId::new(id);
            async { addresses.set_default(&id)?.await }.await
        }
        AddressCommand::Remove { id } => {
            let id = AddressId::new(id);
            async { addresses.remove(&id)?.await }.await
        }
    };
    output.emit(result, address_book_text)
}

// =============================================================================
// Checkout & orders
// =============================================================================

pub async fn checkout(
    shop: &Storefront,
    output: &Output,
    address: &str,
    payment: PaymentMethod,
) -> Result<(), CliError> {
    let result = shop.checkout(&AddressId::new(address), payment).await;
    output.emit(result, |order| format!("Order placed\n{}", order_line(order)))
}

pub async fn orders(
    shop: &Storefront,
    output: &Output,
    action: OrdersCommand,
) -> Result<(), CliError> {
    match action {
        OrdersCommand::List => output.emit(Ok(shop.orders().list()), |o| orders_text(o)),
        OrdersCommand::Refresh => {
            let result = async { shop.orders().refresh()?.await }.await;
            output.emit(result, |o| orders_text(o))
        }
        OrdersCommand::Show { id } => {
            let id = OrderId::new(id);
            let result = shop
                .orders()
                .get(&id)
                .ok_or_else(|| DomainError::UnknownOrder(id).into());
            output.emit(result, |order| {
                let mut text = order_line(order);
                for item in order.items() {
                    let _ = write!(
                        text,
                        "\n  {:<12} {:<32} {:>3} × {}",
                        item.product_id,
                        item.name,
                        item.quantity,
                        money(item.price)
                    );
                }
                let to = order.shipping_address();
                let _ = write!(
                    text,
                    "\nShip to {}, {}, {}, {} {}",
                    to.name, to.line1, to.city, to.state, to.pincode
                );
                text
            })
        }
    }
}
