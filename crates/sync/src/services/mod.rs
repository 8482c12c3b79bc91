//! Per-collection services.
//!
//! Each service pairs a [`SyncController`](crate::controller::SyncController)
//! with the backend calls for its collection. Mutations return as soon as
//! the local store has changed; the returned [`Pending`](crate::Pending)
//! resolves with the server's canonical collection.

mod addresses;
mod cart;
mod orders;
mod wishlist;

pub use addresses::AddressService;
pub use cart::CartService;
pub use orders::OrderService;
pub use wishlist::WishlistService;

/// Storage keys, one per collection.
pub mod keys {
    pub const CART: &str = "cart";
    pub const WISHLIST: &str = "wishlist";
    pub const ADDRESSES: &str = "addresses";
    pub const ORDERS: &str = "orders";
    pub const ADMIN_ORDERS: &str = "admin-orders";
}

/// Reconcile by adopting the server's collection as-is.
#[allow(clippy::unnecessary_wraps)]
fn adopt<T: Clone>(_local: &T, canonical: &T) -> Option<T> {
    Some(canonical.clone())
}
