use std::sync::Arc;

use pantry_core::{Cart, CartItem, CartTotals, DomainError, OrderItem, ProductId};
use tokio::sync::watch;
use tracing::instrument;

use super::{adopt, keys};
use crate::api::Backend;
use crate::catalog::Catalog;
use crate::controller::{Pending, SyncController};
use crate::error::SyncError;
use crate::notify::{Notifier, Severity};
use crate::persist::Storage;
use crate::session::SessionStore;
use crate::store::LocalStore;

/// The shopper's cart.
///
/// Every change is sent as the line's absolute quantity, so replaying or
/// reordering requests cannot double-count units.
#[derive(Clone)]
pub struct CartService {
    sync: SyncController<Cart>,
    backend: Arc<dyn Backend>,
    session: SessionStore,
    catalog: Catalog,
}

impl CartService {
    #[must_use]
    pub fn new(
        storage: Arc<dyn Storage>,
        backend: Arc<dyn Backend>,
        session: SessionStore,
        catalog: Catalog,
        notifier: Notifier,
    ) -> Self {
        let store = LocalStore::new(keys::CART, storage);
        Self {
            sync: SyncController::new(store, notifier, Severity::Quiet),
            backend,
            session,
            catalog,
        }
    }

    pub(crate) const fn sync(&self) -> &SyncController<Cart> {
        &self.sync
    }

    /// Current lines.
    #[must_use]
    pub fn items(&self) -> Cart {
        self.sync.store().get()
    }

    /// Subtotal, shipping, tax and total for the current lines, using the
    /// catalog's known tax rates. A line whose rate has not been loaded yet
    /// counts as untaxed; see [`CartService::load_rates`].
    #[must_use]
    pub fn totals(&self) -> CartTotals {
        self.sync.store().with(|cart| {
            cart.totals(|id| self.catalog.tax_percent(id).unwrap_or_default())
        })
    }

    /// Totals with every line's tax rate confirmed by the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if a line's product cannot be fetched.
    pub async fn priced_totals(&self) -> Result<CartTotals, SyncError> {
        let cart = self.items();
        Ok(self.catalog.price_cart(&cart).await?)
    }

    /// Fetch tax rates for lines the catalog does not know yet.
    ///
    /// # Errors
    ///
    /// Returns an error if a line's product cannot be fetched.
    pub async fn load_rates(&self) -> Result<(), SyncError> {
        let ids: Vec<ProductId> = self
            .sync
            .store()
            .with(|cart| cart.items().iter().map(|i| i.product_id.clone()).collect());
        Ok(self.catalog.warm(&ids).await?)
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Cart> {
        self.sync.store().subscribe()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.sync.store().is_loading()
    }

    /// Add a product by id, fetching it from the catalog if needed.
    ///
    /// # Errors
    ///
    /// Fails if the product cannot be fetched or is not purchasable, or for
    /// any reason [`CartService::add`] fails.
    #[instrument(skip(self), fields(product_id = %product_id))]
    pub async fn add_product(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Pending<Cart>, SyncError> {
        let product = self.catalog.product(product_id).await?;
        if !product.is_purchasable() {
            return Err(DomainError::Unavailable(product.id).into());
        }
        self.add(product.to_cart_item(quantity))
    }

    /// Add units of a line, merging with an existing line for the product.
    ///
    /// # Errors
    ///
    /// Fails without a session, for zero quantity, or if the lane is closed.
    pub fn add(&self, item: CartItem) -> Result<Pending<Cart>, SyncError> {
        let phone = self.session.phone()?;
        if item.quantity == 0 {
            return Err(DomainError::ZeroQuantity.into());
        }

        let backend = Arc::clone(&self.backend);
        self.sync.submit(
            "add to cart",
            move |cart| {
                let id = item.product_id.clone();
                cart.add(item.clone());
                cart.get(&id).cloned().ok_or(DomainError::NotInCart(id))
            },
            move |line| async move { backend.upsert_cart_item(&phone, &line).await },
            adopt,
        )
    }

    /// Set a line's quantity; zero removes the line.
    ///
    /// # Errors
    ///
    /// Fails without a session, if the product is not in the cart, or if the
    /// lane is closed.
    pub fn set_quantity(
        &self,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<Pending<Cart>, SyncError> {
        if quantity == 0 {
            return self.remove(product_id);
        }
        let phone = self.session.phone()?;
        let backend = Arc::clone(&self.backend);
        let id = product_id.clone();
        self.sync.submit(
            "update cart",
            move |cart| {
                cart.set_quantity(&id, quantity)?;
                cart.get(&id)
                    .cloned()
                    .ok_or_else(|| DomainError::NotInCart(id.clone()))
            },
            move |line| async move { backend.upsert_cart_item(&phone, &line).await },
            adopt,
        )
    }

    /// Remove a line.
    ///
    /// # Errors
    ///
    /// Fails without a session, if the product is not in the cart, or if the
    /// lane is closed.
    pub fn remove(&self, product_id: &ProductId) -> Result<Pending<Cart>, SyncError> {
        let phone = self.session.phone()?;
        let backend = Arc::clone(&self.backend);
        let id = product_id.clone();
        self.sync.submit(
            "remove from cart",
            move |cart| cart.remove(&id).map(|line| line.product_id),
            move |id| async move { backend.remove_cart_item(&phone, &id).await },
            adopt,
        )
    }

    /// Remove every line.
    ///
    /// # Errors
    ///
    /// Fails without a session or if the lane is closed.
    pub fn clear(&self) -> Result<Pending<Cart>, SyncError> {
        let phone = self.session.phone()?;
        let backend = Arc::clone(&self.backend);
        self.sync.submit(
            "clear cart",
            |cart| {
                cart.clear();
                Ok(())
            },
            move |()| async move { backend.clear_cart(&phone).await },
            adopt,
        )
    }

    /// Take the units of a placed order out of the cart. Lines added, or
    /// units added to a line, after the order was submitted stay.
    ///
    /// Resolves with the server's cart, or `None` if no line changed.
    ///
    /// # Errors
    ///
    /// Fails without a session or if the lane is closed.
    pub fn remove_ordered(&self, ordered: &[OrderItem]) -> Result<Pending<Option<Cart>>, SyncError> {
        let phone = self.session.phone()?;
        let backend = Arc::clone(&self.backend);
        let ordered: Vec<(ProductId, u32)> = ordered
            .iter()
            .map(|item| (item.product_id.clone(), item.quantity))
            .collect();

        self.sync.submit(
            "remove ordered items",
            move |cart| {
                let mut changes = Vec::new();
                for (id, quantity) in &ordered {
                    let Some(current) = cart.get(id).map(|line| line.quantity) else {
                        continue;
                    };
                    let remaining = current.saturating_sub(*quantity);
                    if remaining == 0 {
                        cart.remove(id)?;
                        changes.push(LineChange::Remove(id.clone()));
                    } else {
                        cart.set_quantity(id, remaining)?;
                        let line = cart
                            .get(id)
                            .cloned()
                            .ok_or_else(|| DomainError::NotInCart(id.clone()))?;
                        changes.push(LineChange::Set(line));
                    }
                }
                Ok(if cart.is_empty() {
                    None
                } else {
                    Some(changes)
                })
            },
            move |changes| async move {
                let Some(changes) = changes else {
                    return backend.clear_cart(&phone).await.map(Some);
                };
                let mut canonical = None;
                for change in changes {
                    canonical = Some(match change {
                        LineChange::Set(line) => backend.upsert_cart_item(&phone, &line).await?,
                        LineChange::Remove(id) => backend.remove_cart_item(&phone, &id).await?,
                    });
                }
                Ok(canonical)
            },
            |_, canonical: &Option<Cart>| canonical.clone(),
        )
    }
}

/// One line's remote update after an order.
enum LineChange {
    Set(CartItem),
    Remove(ProductId),
}

#[cfg(test)]
mod tests {
    use pantry_core::Product;
    use rust_decimal::Decimal;

    use super::*;
    use crate::api::ApiError;
    use crate::api::mock::{MockBackend, product};
    use crate::services::fixtures::{Harness, harness};

    fn service(h: &Harness) -> CartService {
        let cart = CartService::new(
            Arc::clone(&h.storage),
            Arc::clone(&h.backend),
            h.session.clone(),
            h.catalog.clone(),
            h.notifier.clone(),
        );
        cart.sync().start();
        cart
    }

    fn catalog() -> MockBackend {
        MockBackend::with_products([product("p1", 100, 18), product("p2", 50, 5)])
    }

    fn id(s: &str) -> ProductId {
        ProductId::new(s)
    }

    #[tokio::test]
    async fn test_add_is_visible_before_server_answers() {
        let h = harness(catalog());
        let cart = service(&h);

        let hold = h.mock.hold().await;
        let pending = cart.add(product("p1", 100, 18).to_cart_item(2)).expect("submitted");
        assert_eq!(cart.items().item_count(), 2);
        assert!(cart.is_loading());
        assert_eq!(h.mock.calls("upsert_cart_item"), 0);

        drop(hold);
        let canonical = pending.await.expect("server ok");
        assert_eq!(canonical, cart.items());
        assert_eq!(h.mock.server_cart(), cart.items());
        assert!(!cart.is_loading());
    }

    #[tokio::test]
    async fn test_checkout_scenario_totals() {
        let h = harness(MockBackend::with_products([
            product("p1", 100, 0),
            product("p2", 50, 0),
        ]));
        let cart = service(&h);

        cart.add_product(&id("p1"), 2).await.expect("p1").await.expect("ok");
        cart.add_product(&id("p2"), 1).await.expect("p2").await.expect("ok");

        let totals = cart.totals();
        assert_eq!(totals.subtotal, Decimal::from(250));
        assert_eq!(totals.shipping, Decimal::from(65));
        assert_eq!(totals.total, Decimal::from(315));
    }

    #[tokio::test]
    async fn test_totals_use_current_tax_rates() {
        let h = harness(catalog());
        let cart = service(&h);

        cart.add_product(&id("p1"), 1).await.expect("p1").await.expect("ok");
        // 100 * 18%
        assert_eq!(cart.totals().tax, Decimal::from(18));

        let mut repriced: Product = product("p1", 100, 5);
        repriced.price = Decimal::from(999);
        h.catalog.seed(repriced);
        // Tax rate follows the catalog; the captured line price does not.
        assert_eq!(cart.totals().tax, Decimal::from(5));
        assert_eq!(cart.totals().subtotal, Decimal::from(100));
    }

    #[tokio::test]
    async fn test_failed_add_restores_lines_and_totals() {
        let h = harness(catalog());
        let cart = service(&h);
        cart.add_product(&id("p2"), 1).await.expect("p2").await.expect("ok");
        let lines_before = cart.items();
        let totals_before = cart.totals();

        h.mock.fail_next(ApiError::Server {
            status: 500,
            message: "boom".to_string(),
        });
        let result = cart.add(product("p1", 100, 18).to_cart_item(3)).expect("submitted").await;

        assert!(matches!(result, Err(SyncError::Remote(ApiError::Server { .. }))));
        assert_eq!(cart.items(), lines_before);
        assert_eq!(cart.totals(), totals_before);
        assert_eq!(h.mock.calls("upsert_cart_item"), 2);
    }

    #[tokio::test]
    async fn test_set_quantity_zero_removes() {
        let h = harness(catalog());
        let cart = service(&h);
        cart.add_product(&id("p1"), 2).await.expect("p1").await.expect("ok");

        cart.set_quantity(&id("p1"), 0).expect("submitted").await.expect("ok");
        assert!(cart.items().is_empty());
        assert_eq!(h.mock.calls("remove_cart_item"), 1);
    }

    #[tokio::test]
    async fn test_set_quantity_sends_absolute_line() {
        let h = harness(catalog());
        let cart = service(&h);
        cart.add_product(&id("p1"), 2).await.expect("p1").await.expect("ok");

        cart.set_quantity(&id("p1"), 5).expect("submitted").await.expect("ok");
        assert_eq!(h.mock.server_cart().get(&id("p1")).map(|l| l.quantity), Some(5));
    }

    #[tokio::test]
    async fn test_local_rejections() {
        let h = harness(catalog());
        let cart = service(&h);

        assert!(matches!(
            cart.remove(&id("p1")),
            Err(SyncError::Domain(DomainError::NotInCart(_)))
        ));
        assert!(matches!(
            cart.add(product("p1", 100, 0).to_cart_item(0)),
            Err(SyncError::Domain(DomainError::ZeroQuantity))
        ));
        assert_eq!(h.mock.calls("remove_cart_item"), 0);
    }

    #[tokio::test]
    async fn test_unavailable_product() {
        let mut sold_out = product("p3", 10, 0);
        sold_out.stock = 0;
        let h = harness(MockBackend::with_products([sold_out]));
        let cart = service(&h);

        assert!(matches!(
            cart.add_product(&id("p3"), 1).await,
            Err(SyncError::Domain(DomainError::Unavailable(_)))
        ));
        assert!(cart.items().is_empty());
    }

    #[tokio::test]
    async fn test_requires_session() {
        let h = harness(catalog());
        h.session.clear();
        let cart = service(&h);
        assert!(matches!(cart.clear(), Err(SyncError::NotSignedIn)));
    }

    #[tokio::test]
    async fn test_clear() {
        let h = harness(catalog());
        let cart = service(&h);
        cart.add_product(&id("p1"), 1).await.expect("p1").await.expect("ok");
        cart.clear().expect("submitted").await.expect("ok");
        assert!(cart.items().is_empty());
        assert!(h.mock.server_cart().is_empty());
    }

    #[tokio::test]
    async fn test_remove_ordered_keeps_later_units() {
        let h = harness(catalog());
        let cart = service(&h);
        cart.add_product(&id("p1"), 2).await.expect("p1").await.expect("ok");
        let ordered: Vec<OrderItem> = cart.items().items().iter().map(OrderItem::from).collect();

        cart.add_product(&id("p1"), 1).await.expect("p1").await.expect("ok");
        cart.add_product(&id("p2"), 1).await.expect("p2").await.expect("ok");

        let canonical = cart.remove_ordered(&ordered).expect("submitted").await.expect("ok");
        assert_eq!(canonical.as_ref(), Some(&cart.items()));
        assert_eq!(cart.items().get(&id("p1")).map(|l| l.quantity), Some(1));
        assert_eq!(cart.items().get(&id("p2")).map(|l| l.quantity), Some(1));
        assert_eq!(h.mock.server_cart(), cart.items());
        assert_eq!(h.mock.calls("clear_cart"), 0);
    }

    #[tokio::test]
    async fn test_remove_ordered_empties_cart() {
        let h = harness(catalog());
        let cart = service(&h);
        cart.add_product(&id("p1"), 2).await.expect("p1").await.expect("ok");
        let ordered: Vec<OrderItem> = cart.items().items().iter().map(OrderItem::from).collect();

        cart.remove_ordered(&ordered).expect("submitted").await.expect("ok");
        assert!(cart.items().is_empty());
        assert!(h.mock.server_cart().is_empty());
        assert_eq!(h.mock.calls("clear_cart"), 1);
    }

    #[tokio::test]
    async fn test_totals_wait_for_rates_after_restart() {
        let h = harness(catalog());
        let cart = service(&h);
        cart.add_product(&id("p1"), 1).await.expect("p1").await.expect("ok");
        h.catalog.invalidate_all();

        // Unknown rate counts as untaxed until loaded.
        assert_eq!(cart.totals().tax, Decimal::ZERO);
        assert_eq!(cart.priced_totals().await.expect("priced").tax, Decimal::from(18));

        cart.load_rates().await.expect("rates");
        assert_eq!(cart.totals().tax, Decimal::from(18));
    }
}
