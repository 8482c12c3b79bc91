//! Pantry Core - Shared domain library.
//!
//! This crate provides the types and rules used by every Pantry component:
//! - `sync` - Local stores, REST accessor and the optimistic sync controller
//! - `cli` - Command-line front end
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no persistence. Every collection invariant (single default
//! address, no zero-quantity cart lines, no duplicate wishlist ids, legal
//! order transitions) lives here so local mutations and server snapshots are
//! normalized by the same code.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, phone numbers, emails, prices, statuses
//! - [`models`] - Products, cart, wishlist, addresses, orders, profiles
//! - [`pricing`] - Shipping step function, tax and cart totals
//! - [`error`] - Domain rule violations

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod error;
pub mod models;
pub mod pricing;
pub mod types;

pub use error::DomainError;
pub use models::*;
pub use pricing::CartTotals;
pub use types::*;
