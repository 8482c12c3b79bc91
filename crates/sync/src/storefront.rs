//! Composition root.
//!
//! [`Storefront`] wires the backend, storage, session, catalog, notifier and
//! the collection services together. Construct one per data directory, call
//! [`Storefront::init`] once, and [`Storefront::teardown`] before exiting so
//! queued remote calls finish.

use std::sync::Arc;
use std::time::Duration;

use pantry_core::{
    AddressId, DomainError, Order, OrderRequest, PaymentMethod, Phone, Profile, Role,
    sort_newest_first,
};
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use crate::admin::AdminConsole;
use crate::api::{AuthSession, Backend, HttpBackend, LoginRequest};
use crate::catalog::Catalog;
use crate::config::SyncConfig;
use crate::controller::SyncController;
use crate::error::SyncError;
use crate::notify::{self, Notification, Notifier, Severity};
use crate::persist::{FileStorage, Storage};
use crate::services::{AddressService, CartService, OrderService, WishlistService, keys};
use crate::session::SessionStore;
use crate::store::LocalStore;

/// Tunables that are not part of the backend connection.
#[derive(Debug, Clone)]
pub struct StorefrontOptions {
    /// Product cache lifetime
    pub catalog_ttl: Duration,
    /// Buffered notifications per subscriber
    pub notification_capacity: usize,
}

impl Default for StorefrontOptions {
    fn default() -> Self {
        Self {
            catalog_ttl: Duration::from_secs(300),
            notification_capacity: 64,
        }
    }
}

impl From<&SyncConfig> for StorefrontOptions {
    fn from(config: &SyncConfig) -> Self {
        Self {
            catalog_ttl: config.catalog_ttl,
            ..Self::default()
        }
    }
}

/// The storefront client.
///
/// Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Storefront {
    inner: Arc<StorefrontInner>,
}

struct StorefrontInner {
    backend: Arc<dyn Backend>,
    session: SessionStore,
    catalog: Catalog,
    notifier: Notifier,
    cart: CartService,
    wishlist: WishlistService,
    addresses: AddressService,
    orders: OrderService,
    admin_orders: SyncController<Vec<Order>>,
}

impl Storefront {
    /// Assemble a storefront from its parts.
    #[must_use]
    pub fn new(
        backend: Arc<dyn Backend>,
        storage: Arc<dyn Storage>,
        session: SessionStore,
        options: &StorefrontOptions,
    ) -> Self {
        let notifier = Notifier::new(options.notification_capacity);
        let catalog = Catalog::new(Arc::clone(&backend), options.catalog_ttl);

        let cart = CartService::new(
            Arc::clone(&storage),
            Arc::clone(&backend),
            session.clone(),
            catalog.clone(),
            notifier.clone(),
        );
        let wishlist = WishlistService::new(
            Arc::clone(&storage),
            Arc::clone(&backend),
            session.clone(),
            notifier.clone(),
        );
        let addresses = AddressService::new(
            Arc::clone(&storage),
            Arc::clone(&backend),
            session.clone(),
            notifier.clone(),
        );
        let orders = OrderService::new(
            Arc::clone(&storage),
            Arc::clone(&backend),
            session.clone(),
            notifier.clone(),
        );
        let admin_orders = SyncController::new(
            LocalStore::new(keys::ADMIN_ORDERS, storage),
            notifier.clone(),
            Severity::Error,
        );

        Self {
            inner: Arc::new(StorefrontInner {
                backend,
                session,
                catalog,
                notifier,
                cart,
                wishlist,
                addresses,
                orders,
                admin_orders,
            }),
        }
    }

    /// Build the production stack: file storage under the configured data
    /// directory and the HTTP backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory or HTTP client cannot be
    /// created.
    pub fn from_config(config: &SyncConfig) -> Result<Self, SyncError> {
        let storage: Arc<dyn Storage> =
            Arc::new(FileStorage::new(config.data_dir.clone(), &config.namespace)?);
        let session = SessionStore::new(Arc::clone(&storage));
        let backend: Arc<dyn Backend> = Arc::new(HttpBackend::new(config, session.clone())?);
        Ok(Self::new(
            backend,
            storage,
            session,
            &StorefrontOptions::from(config),
        ))
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Load persisted state, start the command lanes, and reconcile with the
    /// server if a session exists.
    ///
    /// Reconciliation failures are logged; the persisted state stays usable.
    #[instrument(skip(self))]
    pub async fn init(&self) {
        self.inner.session.init();
        self.inner.cart.sync().start();
        self.inner.wishlist.sync().start();
        self.inner.addresses.sync().start();
        self.inner.orders.sync().start();
        self.inner.admin_orders.start();

        if let Ok(phone) = self.inner.session.phone() {
            notify::set_sentry_user(&phone);
            if let Err(err) = self.sync_from_server().await {
                warn!(error = %err, "Could not reconcile with server, using local state");
                self.load_cart_rates().await;
            }
        }
        info!(signed_in = self.is_signed_in(), "Storefront initialized");
    }

    /// Wait for queued remote calls and stop the command lanes.
    #[instrument(skip(self))]
    pub async fn teardown(&self) {
        self.inner.cart.sync().shutdown().await;
        self.inner.wishlist.sync().shutdown().await;
        self.inner.addresses.sync().shutdown().await;
        self.inner.orders.sync().shutdown().await;
        self.inner.admin_orders.shutdown().await;
        info!("Storefront torn down");
    }

    /// Adopt the server's copy of every collection from the profile.
    /// Changes still waiting on the server are kept on top.
    ///
    /// # Errors
    ///
    /// Fails without a session or if the profile cannot be fetched.
    pub async fn sync_from_server(&self) -> Result<Profile, SyncError> {
        let phone = self.inner.session.phone()?;
        let profile = self.inner.backend.get_profile(&phone).await?;
        self.apply_profile(&profile);
        self.load_cart_rates().await;
        Ok(profile)
    }

    fn apply_profile(&self, profile: &Profile) {
        self.inner.cart.sync().rebase(profile.cart.clone());
        self.inner.wishlist.sync().rebase(profile.wishlist.clone());
        self.inner.addresses.sync().rebase(profile.addresses.clone());
        let mut orders = profile.orders.clone();
        sort_newest_first(&mut orders);
        self.inner.orders.sync().rebase(orders);
    }

    /// Empty every collection. Results of remote calls still queued are
    /// ignored from here on.
    fn forget_collections(&self) {
        self.inner.cart.sync().clear();
        self.inner.wishlist.sync().clear();
        self.inner.addresses.sync().clear();
        self.inner.orders.sync().clear();
        self.inner.admin_orders.clear();
    }

    async fn load_cart_rates(&self) {
        if let Err(err) = self.inner.cart.load_rates().await {
            warn!(error = %err, "Could not load tax rates for cart lines");
        }
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// Exchange an identity-provider token for a session and load the
    /// user's collections.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the credential.
    #[instrument(skip(self, id_token), fields(phone = %phone))]
    pub async fn login(&self, phone: Phone, id_token: String) -> Result<Profile, SyncError> {
        let request = LoginRequest { phone, id_token };
        let response = self.inner.backend.login(&request).await?;

        self.forget_collections();
        self.inner.session.set(AuthSession::from_login(&response));
        self.apply_profile(&response.profile);
        self.load_cart_rates().await;
        notify::set_sentry_user(&response.profile.phone);
        self.inner
            .notifier
            .info("session", format!("Signed in as {}", response.profile.phone));
        info!(role = %response.profile.role, "Signed in");
        Ok(response.profile)
    }

    /// Forget the session and every local collection. Remote calls already
    /// queued still run but no longer change local state.
    #[instrument(skip(self))]
    pub fn logout(&self) {
        self.inner.session.clear();
        self.forget_collections();
        notify::clear_sentry_user();
        info!("Signed out");
    }

    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        self.inner.session.is_signed_in()
    }

    /// Role claim of the signed-in user.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.inner.session.role()
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.inner.session
    }

    // =========================================================================
    // Collections
    // =========================================================================

    #[must_use]
    pub fn cart(&self) -> &CartService {
        &self.inner.cart
    }

    #[must_use]
    pub fn wishlist(&self) -> &WishlistService {
        &self.inner.wishlist
    }

    #[must_use]
    pub fn addresses(&self) -> &AddressService {
        &self.inner.addresses
    }

    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.inner.orders
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    #[must_use]
    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.inner.notifier.subscribe()
    }

    /// Admin operations, for users with the admin role.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotSignedIn`] or [`SyncError::Forbidden`].
    pub fn admin(&self) -> Result<AdminConsole, SyncError> {
        match self.role() {
            None => Err(SyncError::NotSignedIn),
            Some(Role::Admin) => Ok(AdminConsole::new(
                Arc::clone(&self.inner.backend),
                self.inner.catalog.clone(),
                self.inner.admin_orders.clone(),
            )),
            Some(Role::Customer) => Err(SyncError::Forbidden),
        }
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Place an order for the current cart, then take the ordered units out
    /// of the cart. Lines added while the order is in flight stay.
    ///
    /// The order total is computed from the cart and the catalog's current
    /// tax rates, fetched if needed; the returned order carries whatever
    /// total the server recorded.
    ///
    /// # Errors
    ///
    /// Fails without a session, for an empty cart, an unknown or unsaved
    /// address, if a line's tax rate cannot be fetched, or if the server
    /// rejects the order. The cart is untouched unless the order was
    /// accepted.
    #[instrument(skip(self), fields(address_id = %address_id, payment_method = %payment_method))]
    pub async fn checkout(
        &self,
        address_id: &AddressId,
        payment_method: PaymentMethod,
    ) -> Result<Order, SyncError> {
        self.inner.session.phone()?;

        let cart = self.inner.cart.items();
        if cart.is_empty() {
            return Err(DomainError::EmptyCart.into());
        }
        if address_id.is_temporary() {
            return Err(DomainError::UnconfirmedAddress(address_id.clone()).into());
        }
        let address = self
            .inner
            .addresses
            .get(address_id)
            .ok_or_else(|| DomainError::UnknownAddress(address_id.clone()))?;

        let totals = self.inner.catalog.price_cart(&cart).await?;
        let request = OrderRequest::from_cart(&cart, totals.total, address.fields, payment_method)?;
        let order = self.inner.orders.place(request)?.await?;
        info!(order_id = %order.id(), total = %order.total_amount(), "Order placed");

        match self.inner.cart.remove_ordered(order.items()) {
            Ok(pending) => {
                if let Err(err) = pending.await {
                    warn!(error = %err, "Order placed but cart was not updated on the server");
                }
            }
            Err(err) => warn!(error = %err, "Order placed but cart could not be updated"),
        }
        self.inner
            .notifier
            .info("orders", format!("Order {} placed", order.id()));
        Ok(order)
    }
}
