//! Pantry CLI - storefront client for the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Sign in with a token from the identity provider
//! pantry login --phone 9876543210 --id-token "$ID_TOKEN"
//!
//! # Shop
//! pantry products list
//! pantry cart add p1 -q 2
//! pantry address add --name Asha --line1 "12 MG Road" --city Bengaluru \
//!     --state Karnataka --pincode 560001 --default
//! pantry checkout --address addr-1 --payment upi
//!
//! # Administer (admin role and PANTRY_ADMIN_KEY required)
//! pantry admin orders status ord-9 shipped
//! ```
//!
//! Pass `--json` to any command to print the `{ success, data, message }`
//! envelope instead of text.
//!
//! # Environment Variables
//!
//! - `PANTRY_API_URL` - Storefront API base URL (required)
//! - `PANTRY_ADMIN_KEY` - Admin route key
//! - `PANTRY_DATA_DIR` - Where local state is kept (default `.pantry`)
//! - `SENTRY_DSN` - Error tracking
//! - `RUST_LOG` - Log filter (logs go to stderr)

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use pantry_sync::{Storefront, SyncConfig};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod output;

use commands::admin::AdminCommand;
use commands::shop::{AddressCommand, CartCommand, OrdersCommand, ProductsCommand, WishlistCommand};
use commands::{CliError, session};
use output::Output;

#[derive(Parser)]
#[command(name = "pantry")]
#[command(author, version, about = "Pantry storefront client")]
struct Cli {
    /// Print results as JSON envelopes
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with an identity-provider token
    Login {
        /// Ten-digit mobile number
        #[arg(short, long)]
        phone: pantry_core::Phone,

        /// ID token from the identity provider
        #[arg(long, env = "PANTRY_ID_TOKEN", hide_env_values = true)]
        id_token: String,
    },
    /// Sign out and forget local state
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Browse the catalog
    Products {
        #[command(subcommand)]
        action: ProductsCommand,
    },
    /// Manage the cart
    Cart {
        #[command(subcommand)]
        action: CartCommand,
    },
    /// Manage the wishlist
    Wishlist {
        #[command(subcommand)]
        action: WishlistCommand,
    },
    /// Manage saved addresses
    Address {
        #[command(subcommand)]
        action: AddressCommand,
    },
    /// Place an order for the current cart
    Checkout {
        /// Saved address to ship to
        #[arg(short, long)]
        address: String,

        /// `cod`, `card`, `upi`, `net_banking` or `wallet`
        #[arg(short, long, default_value = "cod")]
        payment: pantry_core::PaymentMethod,
    },
    /// Order history
    Orders {
        #[command(subcommand)]
        action: OrdersCommand,
    },
    /// Store administration
    Admin {
        #[command(subcommand)]
        action: AdminCommand,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &SyncConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "pantry_sync=warn,pantry_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match SyncConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(2);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    let output = Output::new(cli.json);
    if let Err(e) = run(cli.command, &config, &output).await {
        if !matches!(e, CliError::Reported) {
            tracing::error!("Command failed: {e}");
        }
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: &SyncConfig, output: &Output) -> Result<(), CliError> {
    let shop = Storefront::from_config(config)?;
    shop.init().await;

    let result = dispatch(command, &shop, output).await;

    // Let queued remote calls finish before exiting
    shop.teardown().await;
    result
}

async fn dispatch(command: Commands, shop: &Storefront, output: &Output) -> Result<(), CliError> {
    match command {
        Commands::Login { phone, id_token } => {
            session::login(shop, output, phone, id_token.into()).await
        }
        Commands::Logout => session::logout(shop, output),
        Commands::Whoami => session::whoami(shop, output),
        Commands::Products { action } => commands::shop::products(shop, output, action).await,
        Commands::Cart { action } => commands::shop::cart(shop, output, action).await,
        Commands::Wishlist { action } => commands::shop::wishlist(shop, output, action).await,
        Commands::Address { action } => commands::shop::address(shop, output, action).await,
        Commands::Checkout { address, payment } => {
            commands::shop::checkout(shop, output, &address, payment).await
        }
        Commands::Orders { action } => commands::shop::orders(shop, output, action).await,
        Commands::Admin { action } => commands::admin::run(shop, output, action).await,
    }
}
