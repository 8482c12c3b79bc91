//! Store administration.
//!
//! Obtained from [`Storefront::admin`](crate::Storefront::admin), which
//! checks the admin role. Every request also carries the configured admin
//! key.

use std::sync::Arc;

use pantry_core::{
    DomainError, Order, OrderId, OrderStatus, Product, ProductId, ProductInput, UserSummary,
    sort_newest_first,
};
use tracing::{info, instrument};

use crate::api::Backend;
use crate::catalog::Catalog;
use crate::controller::{Pending, SyncController};
use crate::error::SyncError;

/// Admin operations on products, orders and users.
#[derive(Clone)]
pub struct AdminConsole {
    backend: Arc<dyn Backend>,
    catalog: Catalog,
    orders: SyncController<Vec<Order>>,
}

impl AdminConsole {
    pub(crate) const fn new(
        backend: Arc<dyn Backend>,
        catalog: Catalog,
        orders: SyncController<Vec<Order>>,
    ) -> Self {
        Self {
            backend,
            catalog,
            orders,
        }
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_product(&self, input: &ProductInput) -> Result<Product, SyncError> {
        let product = self.backend.admin_create_product(input).await?;
        info!(product_id = %product.id, "Product created");
        self.catalog.seed(product.clone());
        Ok(product)
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self, input), fields(product_id = %id))]
    pub async fn update_product(
        &self,
        id: &ProductId,
        input: &ProductInput,
    ) -> Result<Product, SyncError> {
        self.catalog.invalidate(id);
        let product = self.backend.admin_update_product(id, input).await?;
        self.catalog.seed(product.clone());
        Ok(product)
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete_product(&self, id: &ProductId) -> Result<(), SyncError> {
        self.catalog.invalidate(id);
        self.backend.admin_delete_product(id).await?;
        info!("Product deleted");
        Ok(())
    }

    // =========================================================================
    // Orders
    // =========================================================================

    /// Orders as last loaded, newest first.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.orders.store().get()
    }

    /// Load every order from the server.
    ///
    /// # Errors
    ///
    /// Fails if the lane is closed.
    pub fn refresh_orders(&self) -> Result<Pending<Vec<Order>>, SyncError> {
        let backend = Arc::clone(&self.backend);
        self.orders.submit(
            "load orders",
            |_| Ok(()),
            move |()| async move { backend.admin_list_orders().await },
            |_, canonical: &Vec<Order>| {
                let mut next = canonical.clone();
                sort_newest_first(&mut next);
                Some(next)
            },
        )
    }

    /// Move an order to `status`, showing the change immediately.
    ///
    /// The transition is checked against the order lifecycle first; if the
    /// server rejects it anyway, the previous status is restored.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::UnknownOrder`] if the order is not loaded,
    /// [`DomainError::InvalidTransition`] for an illegal move, or
    /// [`SyncError::Closed`] if the lane is closed.
    pub fn set_order_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<Pending<Order>, SyncError> {
        let backend = Arc::clone(&self.backend);
        let target = id.clone();
        self.orders.submit(
            "update order status",
            move |orders| {
                let order = orders
                    .iter_mut()
                    .find(|o| o.id() == &target)
                    .ok_or_else(|| DomainError::UnknownOrder(target.clone()))?;
                order.set_status(status)?;
                Ok(target.clone())
            },
            move |id| async move { backend.admin_update_order_status(&id, status).await },
            |orders, updated: &Order| {
                Some(
                    orders
                        .iter()
                        .map(|o| if o.id() == updated.id() { updated.clone() } else { o.clone() })
                        .collect(),
                )
            },
        )
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_users(&self) -> Result<Vec<UserSummary>, SyncError> {
        Ok(self.backend.admin_list_users().await?)
    }
}
