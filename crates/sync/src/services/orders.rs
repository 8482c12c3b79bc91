use std::sync::Arc;

use pantry_core::{Order, OrderId, OrderRequest, sort_newest_first};
use tokio::sync::watch;
use tracing::instrument;

use super::keys;
use crate::api::Backend;
use crate::controller::{Pending, SyncController};
use crate::error::SyncError;
use crate::notify::{Notifier, Severity};
use crate::persist::Storage;
use crate::session::SessionStore;
use crate::store::LocalStore;

/// The shopper's order history, newest first.
///
/// Orders only appear once the server has accepted them; nothing is added
/// optimistically.
#[derive(Clone)]
pub struct OrderService {
    sync: SyncController<Vec<Order>>,
    backend: Arc<dyn Backend>,
    session: SessionStore,
}

impl OrderService {
    #[must_use]
    pub fn new(
        storage: Arc<dyn Storage>,
        backend: Arc<dyn Backend>,
        session: SessionStore,
        notifier: Notifier,
    ) -> Self {
        let store = LocalStore::new(keys::ORDERS, storage);
        Self {
            sync: SyncController::new(store, notifier, Severity::Error),
            backend,
            session,
        }
    }

    pub(crate) const fn sync(&self) -> &SyncController<Vec<Order>> {
        &self.sync
    }

    #[must_use]
    pub fn list(&self) -> Vec<Order> {
        self.sync.store().get()
    }

    #[must_use]
    pub fn get(&self, id: &OrderId) -> Option<Order> {
        self.sync
            .store()
            .with(|orders| orders.iter().find(|o| o.id() == id).cloned())
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Vec<Order>> {
        self.sync.store().subscribe()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.sync.store().is_loading()
    }

    /// Submit an order. The returned order is inserted into the history
    /// when the server accepts it.
    ///
    /// # Errors
    ///
    /// Fails without a session or if the lane is closed.
    #[instrument(skip(self, request), fields(items = request.items.len(), total = %request.total_amount))]
    pub fn place(&self, request: OrderRequest) -> Result<Pending<Order>, SyncError> {
        let phone = self.session.phone()?;
        let backend = Arc::clone(&self.backend);
        self.sync.submit(
            "place order",
            move |_| Ok(request.clone()),
            move |request| async move { backend.place_order(&phone, &request).await },
            |orders, placed: &Order| {
                let mut next: Vec<Order> = orders
                    .iter()
                    .filter(|o| o.id() != placed.id())
                    .cloned()
                    .collect();
                next.push(placed.clone());
                sort_newest_first(&mut next);
                Some(next)
            },
        )
    }

    /// Replace the history with the server's copy.
    ///
    /// # Errors
    ///
    /// Fails without a session or if the lane is closed.
    pub fn refresh(&self) -> Result<Pending<Vec<Order>>, SyncError> {
        let phone = self.session.phone()?;
        let backend = Arc::clone(&self.backend);
        self.sync.submit(
            "refresh orders",
            |_| Ok(()),
            move |()| async move { backend.list_orders(&phone).await },
            |_, canonical: &Vec<Order>| {
                let mut next = canonical.clone();
                sort_newest_first(&mut next);
                Some(next)
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use pantry_core::{Cart, OrderStatus, PaymentMethod, ProductId};
    use rust_decimal::Decimal;

    use super::*;
    use crate::api::ApiError;
    use crate::api::mock::{MockBackend, product};
    use crate::services::fixtures::{Harness, address, harness};

    fn service(h: &Harness) -> OrderService {
        let orders = OrderService::new(
            Arc::clone(&h.storage),
            Arc::clone(&h.backend),
            h.session.clone(),
            h.notifier.clone(),
        );
        orders.sync().start();
        orders
    }

    fn request() -> OrderRequest {
        let cart = Cart::from_items([product("p1", 100, 0).to_cart_item(2)]);
        OrderRequest::from_cart(&cart, Decimal::from(245), address("Home"), PaymentMethod::Cod)
            .expect("non-empty")
    }

    #[tokio::test]
    async fn test_place_appends_server_order() {
        let h = harness(MockBackend::default());
        let orders = service(&h);

        let order = orders.place(request()).expect("submitted").await.expect("ok");
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(orders.list(), vec![order.clone()]);
        assert_eq!(orders.get(order.id()), Some(order));
    }

    #[tokio::test]
    async fn test_failed_place_leaves_history() {
        let h = harness(MockBackend::default());
        let orders = service(&h);

        h.mock.fail_next(ApiError::Server {
            status: 502,
            message: "bad gateway".to_string(),
        });
        let result = orders.place(request()).expect("submitted").await;
        assert!(result.is_err());
        assert!(orders.list().is_empty());
        assert_eq!(h.mock.calls("place_order"), 1);
    }

    #[tokio::test]
    async fn test_refresh_sorts_newest_first() {
        let mock = MockBackend::default();
        mock.seed_order("old", request(), 10);
        mock.seed_order("new", request(), 1);
        mock.seed_order("mid", request(), 5);
        let h = harness(mock);
        let orders = service(&h);

        let list = orders.refresh().expect("submitted").await.expect("ok");
        let ids: Vec<&str> = list.iter().map(|o| o.id().as_str()).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
        assert_eq!(orders.list(), list);
    }

    #[tokio::test]
    async fn test_snapshot_survives_price_change() {
        let h = harness(MockBackend::with_products([product("p1", 100, 0)]));
        let orders = service(&h);
        let order = orders.place(request()).expect("submitted").await.expect("ok");

        let mut repriced = product("p1", 500, 0);
        repriced.name = "Renamed".to_string();
        h.catalog.seed(repriced);

        let stored = orders.get(order.id()).expect("stored");
        let line = stored
            .items()
            .iter()
            .find(|i| i.product_id == ProductId::new("p1"))
            .expect("line");
        assert_eq!(line.price, Decimal::from(100));
        assert_eq!(line.name, "Product p1");
    }
}
