//! Pantry Sync - optimistic client state for the Pantry storefront API.
//!
//! Every user-owned collection (cart, wishlist, addresses, orders) lives in
//! a persisted [`LocalStore`]. Mutations are applied locally first so the
//! UI updates immediately, then sent to the server in submission order.
//! The server's answer replaces the local copy; a failure restores the
//! snapshot taken when the mutation was submitted.
//!
//! # Modules
//!
//! - [`store`] - Persisted, observable collection state with a loading flag
//! - [`controller`] - Per-collection command lanes and rollback
//! - [`api`] - REST accessor, response envelope, read retries
//! - [`services`] - Cart, wishlist, address and order operations
//! - [`catalog`] - Cached product reads
//! - [`storefront`] - Composition root and checkout
//! - [`admin`] - Product, order status and user administration
//!
//! # Example
//!
//! ```no_run
//! # async fn run() -> Result<(), pantry_sync::SyncError> {
//! use pantry_core::ProductId;
//! use pantry_sync::{Storefront, SyncConfig};
//!
//! let config = SyncConfig::from_env()?;
//! let shop = Storefront::from_config(&config)?;
//! shop.init().await;
//!
//! // Visible immediately; `pending` resolves once the server agrees.
//! let pending = shop.cart().add_product(&ProductId::new("p1"), 2).await?;
//! println!("{} items", shop.cart().items().item_count());
//! pending.await?;
//!
//! shop.teardown().await;
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod admin;
pub mod api;
pub mod catalog;
pub mod config;
pub mod controller;
pub mod error;
pub mod notify;
pub mod persist;
pub mod services;
pub mod session;
pub mod store;
pub mod storefront;

pub use admin::AdminConsole;
pub use api::{ApiError, ApiResponse, Backend, HttpBackend, RetryPolicy};
pub use catalog::Catalog;
pub use config::{ConfigError, SyncConfig};
pub use controller::{Pending, SyncController};
pub use error::SyncError;
pub use notify::{Notification, Notifier, Severity};
pub use persist::{FileStorage, MemoryStorage, Storage, StorageError};
pub use services::{AddressService, CartService, OrderService, WishlistService};
pub use session::SessionStore;
pub use store::{LoadingGuard, LocalStore};
pub use storefront::{Storefront, StorefrontOptions};
