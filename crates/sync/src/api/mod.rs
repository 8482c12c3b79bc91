//! Remote accessor for the storefront REST API.
//!
//! [`Backend`] is the seam between the sync layer and the network: one
//! method per endpoint, each returning an [`ApiResult`]. [`HttpBackend`] is
//! the production implementation.
//!
//! # Conventions
//!
//! - Per-user routes are keyed by phone number.
//! - Cart, wishlist and address mutations answer with the full canonical
//!   collection, which callers use to reconcile local state.
//! - Only reads are retried; see [`RetryPolicy`].

mod error;
mod http;
mod retry;
mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use error::{ApiError, ApiResult};
pub use http::HttpBackend;
pub use retry::RetryPolicy;
pub use types::*;

use async_trait::async_trait;
use pantry_core::{
    AddressBook, AddressFields, AddressId, Cart, CartItem, Order, OrderId, OrderRequest,
    OrderStatus, Phone, Product, ProductId, ProductInput, Profile, ProfileUpdate, UserSummary,
    Wishlist,
};

/// Storefront API operations.
#[async_trait]
pub trait Backend: Send + Sync {
    // =========================================================================
    // Catalog
    // =========================================================================

    /// `GET /products`
    async fn list_products(&self) -> ApiResult<Vec<Product>>;

    /// `GET /products/:id`
    async fn get_product(&self, id: &ProductId) -> ApiResult<Product>;

    // =========================================================================
    // Account
    // =========================================================================

    /// `POST /auth/login`
    async fn login(&self, request: &LoginRequest) -> ApiResult<LoginResponse>;

    /// `GET /auth/profile/:phone`
    async fn get_profile(&self, phone: &Phone) -> ApiResult<Profile>;

    /// `PUT /auth/profile/:phone`
    async fn update_profile(&self, phone: &Phone, update: &ProfileUpdate) -> ApiResult<Profile>;

    // =========================================================================
    // Addresses
    // =========================================================================

    /// `GET /auth/addresses/:phone`
    async fn list_addresses(&self, phone: &Phone) -> ApiResult<AddressBook>;

    /// `POST /auth/addresses/:phone`
    async fn create_address(
        &self,
        phone: &Phone,
        fields: &AddressFields,
        default: bool,
    ) -> ApiResult<AddressBook>;

    /// `PUT /auth/addresses/:phone/:id`
    async fn update_address(
        &self,
        phone: &Phone,
        id: &AddressId,
        fields: &AddressFields,
        default: bool,
    ) -> ApiResult<AddressBook>;

    /// `DELETE /auth/addresses/:phone/:id`
    async fn delete_address(&self, phone: &Phone, id: &AddressId) -> ApiResult<AddressBook>;

    // =========================================================================
    // Cart
    // =========================================================================

    /// `POST /auth/cart/:phone` with the line's absolute quantity.
    async fn upsert_cart_item(&self, phone: &Phone, item: &CartItem) -> ApiResult<Cart>;

    /// `DELETE /auth/cart/:phone/:id`
    async fn remove_cart_item(&self, phone: &Phone, id: &ProductId) -> ApiResult<Cart>;

    /// `DELETE /auth/cart/:phone`
    async fn clear_cart(&self, phone: &Phone) -> ApiResult<Cart>;

    // =========================================================================
    // Wishlist
    // =========================================================================

    /// `POST /auth/wishlist/:phone`
    async fn add_to_wishlist(&self, phone: &Phone, id: &ProductId) -> ApiResult<Wishlist>;

    /// `DELETE /auth/wishlist/:phone/:id`
    async fn remove_from_wishlist(&self, phone: &Phone, id: &ProductId) -> ApiResult<Wishlist>;

    // =========================================================================
    // Orders
    // =========================================================================

    /// `POST /auth/orders/:phone`
    async fn place_order(&self, phone: &Phone, request: &OrderRequest) -> ApiResult<Order>;

    /// `GET /auth/orders/:phone`
    async fn list_orders(&self, phone: &Phone) -> ApiResult<Vec<Order>>;

    // =========================================================================
    // Admin
    // =========================================================================

    /// `POST /admin/products`
    async fn admin_create_product(&self, input: &ProductInput) -> ApiResult<Product>;

    /// `PUT /admin/products/:id`
    async fn admin_update_product(&self, id: &ProductId, input: &ProductInput)
    -> ApiResult<Product>;

    /// `DELETE /admin/products/:id`
    async fn admin_delete_product(&self, id: &ProductId) -> ApiResult<()>;

    /// `GET /admin/orders`
    async fn admin_list_orders(&self) -> ApiResult<Vec<Order>>;

    /// `PUT /admin/orders/:id/status`
    async fn admin_update_order_status(&self, id: &OrderId, status: OrderStatus)
    -> ApiResult<Order>;

    /// `GET /admin/users`
    async fn admin_list_users(&self) -> ApiResult<Vec<UserSummary>>;
}
