//! Store administration commands.
//!
//! # Usage
//!
//! ```bash
//! # Create a product
//! pantry admin products create --name Kettle --price 1299 --tax 18 --stock 20
//!
//! # Move an order along its lifecycle
//! pantry admin orders status ord-9 shipped
//! ```
//!
//! # Environment Variables
//!
//! - `PANTRY_ADMIN_KEY` - Admin route key sent with every admin request

use clap::{Args, Subcommand};
use pantry_core::{OrderId, OrderStatus, ProductId, ProductInput};
use pantry_sync::{AdminConsole, Storefront};
use rust_decimal::Decimal;

use super::{CliError, order_line, orders_text, product_line};
use crate::output::Output;

#[derive(Subcommand)]
pub enum AdminCommand {
    /// Manage the catalog
    Products {
        #[command(subcommand)]
        action: ProductAction,
    },
    /// Manage orders
    Orders {
        #[command(subcommand)]
        action: OrderAction,
    },
    /// List registered users
    Users,
}

#[derive(Subcommand)]
pub enum ProductAction {
    /// Create a product
    Create(ProductArgs),
    /// Replace a product's fields
    Update {
        /// Product ID
        id: String,

        #[command(flatten)]
        fields: ProductArgs,
    },
    /// Delete a product
    Delete {
        /// Product ID
        id: String,
    },
}

#[derive(Subcommand)]
pub enum OrderAction {
    /// Load every order
    List,
    /// Change an order's status
    Status {
        /// Order ID
        id: String,

        /// `pending`, `processing`, `shipped`, `delivered` or `cancelled`
        status: OrderStatus,
    },
}

#[derive(Args)]
pub struct ProductArgs {
    #[arg(long)]
    name: String,

    #[arg(long, default_value = "")]
    description: String,

    /// Unit price
    #[arg(long)]
    price: Decimal,

    /// Tax rate as a percentage
    #[arg(long = "tax", default_value_t = Decimal::ZERO)]
    tax_percent: Decimal,

    #[arg(long)]
    category: Option<String>,

    /// Image URL (repeatable)
    #[arg(long = "image")]
    images: Vec<String>,

    #[arg(long, default_value_t = 0)]
    stock: u32,

    /// Hide the product from the storefront
    #[arg(long)]
    inactive: bool,
}

impl From<ProductArgs> for ProductInput {
    fn from(args: ProductArgs) -> Self {
        Self {
            name: args.name,
            description: args.description,
            price: args.price,
            tax_percent: args.tax_percent,
            category: args.category,
            images: args.images,
            stock: args.stock,
            active: !args.inactive,
        }
    }
}

pub async fn run(shop: &Storefront, output: &Output, action: AdminCommand) -> Result<(), CliError> {
    let admin = match shop.admin() {
        Ok(admin) => admin,
        Err(e) => return output.emit(Err::<(), _>(e), |_| String::new()),
    };

    match action {
        AdminCommand::Products { action } => products(&admin, output, action).await,
        AdminCommand::Orders { action } => orders(&admin, output, action).await,
        AdminCommand::Users => {
            let result = admin.list_users().await;
            output.emit(result, |users| {
                users
                    .iter()
                    .map(|u| format!("{:<14} {:<24} {}", u.phone, u.name, u.role))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
    }
}

async fn products(
    admin: &AdminConsole,
    output: &Output,
    action: ProductAction,
) -> Result<(), CliError> {
    match action {
        ProductAction::Create(fields) => {
            let result = admin.create_product(&fields.into()).await;
            output.emit(result, |p| format!("Created\n{}", product_line(p)))
        }
        ProductAction::Update { id, fields } => {
            let result = admin
                .update_product(&ProductId::new(id), &fields.into())
                .await;
            output.emit(result, |p| format!("Updated\n{}", product_line(p)))
        }
        ProductAction::Delete { id } => {
            let result = admin.delete_product(&ProductId::new(id.clone())).await;
            output.emit(result, |_| format!("Deleted product {id}"))
        }
    }
}

async fn orders(admin: &AdminConsole, output: &Output, action: OrderAction) -> Result<(), CliError> {
    match action {
        OrderAction::List => {
            let result = async { admin.refresh_orders()?.await }.await;
            output.emit(result, |o| orders_text(o))
        }
        OrderAction::Status { id, status } => {
            let id = OrderId::new(id);
            let result = async {
                // The status check runs against the loaded list
                admin.refresh_orders()?.await?;
                admin.set_order_status(&id, status)?.await
            }
            .await;
            output.emit(result, order_line)
        }
    }
}
