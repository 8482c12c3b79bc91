//! Product catalog with a read-through cache.
//!
//! Products enter the cache whenever they are listed, fetched, or added to
//! the cart. Tax rates are also kept apart from the product entries so a
//! lapsed entry does not make a cart line look untaxed. Checkout prices the
//! cart with [`Catalog::price_cart`], which fetches any rate it lacks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;
use pantry_core::{Cart, CartTotals, Product, ProductId};
use rust_decimal::Decimal;
use tracing::{debug, instrument};

use crate::api::{ApiResult, Backend};

/// Maximum number of cached products.
const MAX_CACHED_PRODUCTS: u64 = 5_000;

/// Cached view of `GET /products`.
#[derive(Clone)]
pub struct Catalog {
    backend: Arc<dyn Backend>,
    cache: Cache<ProductId, Product>,
    /// Last known tax rate per product. Not subject to the TTL.
    rates: Cache<ProductId, Decimal>,
}

impl Catalog {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_CACHED_PRODUCTS)
            .time_to_live(ttl)
            .build();
        let rates = Cache::new(MAX_CACHED_PRODUCTS);
        Self {
            backend,
            cache,
            rates,
        }
    }

    /// Fetch every product and refresh the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails after retries.
    #[instrument(skip(self))]
    pub async fn list(&self) -> ApiResult<Vec<Product>> {
        let products = self.backend.list_products().await?;
        for product in &products {
            self.seed(product.clone());
        }
        debug!(count = products.len(), "Catalog refreshed");
        Ok(products)
    }

    /// One product, from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns an error if the product is not cached and the request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn product(&self, id: &ProductId) -> ApiResult<Product> {
        if let Some(product) = self.cache.get(id) {
            debug!("Catalog cache hit");
            return Ok(product);
        }
        let product = self.backend.get_product(id).await?;
        self.seed(product.clone());
        Ok(product)
    }

    /// Fetch every product in `ids` that has no known tax rate.
    ///
    /// # Errors
    ///
    /// Returns the first failed fetch.
    pub async fn warm(&self, ids: &[ProductId]) -> ApiResult<()> {
        for id in ids {
            if !self.rates.contains_key(id) {
                self.product(id).await?;
            }
        }
        Ok(())
    }

    /// Totals for `cart` with the current tax rate of every line, fetching
    /// products that are not cached.
    ///
    /// # Errors
    ///
    /// Returns an error if a line's product cannot be fetched.
    #[instrument(skip(self, cart), fields(lines = cart.items().len()))]
    pub async fn price_cart(&self, cart: &Cart) -> ApiResult<CartTotals> {
        let mut rates = HashMap::with_capacity(cart.items().len());
        for item in cart.items() {
            let product = self.product(&item.product_id).await?;
            rates.insert(item.product_id.clone(), product.tax_percent);
        }
        Ok(cart.totals(|id| rates.get(id).copied().unwrap_or_default()))
    }

    /// Cached product, without touching the network.
    #[must_use]
    pub fn cached(&self, id: &ProductId) -> Option<Product> {
        self.cache.get(id)
    }

    /// Last known tax rate for a product, without touching the network.
    #[must_use]
    pub fn tax_percent(&self, id: &ProductId) -> Option<Decimal> {
        self.rates.get(id)
    }

    /// Insert or replace a product (after an admin write).
    pub fn seed(&self, product: Product) {
        self.rates.insert(product.id.clone(), product.tax_percent);
        self.cache.insert(product.id.clone(), product);
    }

    pub fn invalidate(&self, id: &ProductId) {
        self.cache.invalidate(id);
        self.rates.invalidate(id);
    }

    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
        self.rates.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::api::mock::{MockBackend, product};

    fn catalog(mock: &Arc<MockBackend>) -> Catalog {
        Catalog::new(Arc::clone(mock) as Arc<dyn Backend>, Duration::from_secs(300))
    }

    #[tokio::test]
    async fn test_product_reads_through_once() {
        let mock = Arc::new(MockBackend::with_products([product("p1", 100, 18)]));
        let catalog = catalog(&mock);

        let first = catalog.product(&ProductId::new("p1")).await.expect("product");
        let second = catalog.product(&ProductId::new("p1")).await.expect("product");
        assert_eq!(first, second);
        assert_eq!(mock.calls("get_product"), 1);
    }

    #[tokio::test]
    async fn test_tax_percent_from_cache() {
        let mock = Arc::new(MockBackend::with_products([product("p1", 100, 18)]));
        let catalog = catalog(&mock);

        assert_eq!(catalog.tax_percent(&ProductId::new("p1")), None);
        catalog.list().await.expect("list");
        assert_eq!(catalog.tax_percent(&ProductId::new("p1")), Some(Decimal::from(18)));

        catalog.invalidate(&ProductId::new("p1"));
        assert_eq!(catalog.tax_percent(&ProductId::new("p1")), None);
    }

    #[tokio::test]
    async fn test_rate_outlives_product_entry() {
        let mock = Arc::new(MockBackend::with_products([product("p1", 100, 18)]));
        let catalog = Catalog::new(
            Arc::clone(&mock) as Arc<dyn Backend>,
            Duration::from_millis(20),
        );
        catalog.product(&ProductId::new("p1")).await.expect("product");

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(catalog.cached(&ProductId::new("p1")).is_none());
        assert_eq!(catalog.tax_percent(&ProductId::new("p1")), Some(Decimal::from(18)));
    }

    #[tokio::test]
    async fn test_price_cart_fetches_missing_rates() {
        let mock = Arc::new(MockBackend::with_products([
            product("p1", 100, 18),
            product("p2", 50, 0),
        ]));
        let catalog = catalog(&mock);
        let cart = Cart::from_items([
            product("p1", 100, 18).to_cart_item(1),
            product("p2", 50, 0).to_cart_item(2),
        ]);

        let totals = catalog.price_cart(&cart).await.expect("priced");
        assert_eq!(totals.tax, Decimal::from(18));
        assert_eq!(totals.total, Decimal::from(283));
        assert_eq!(mock.calls("get_product"), 2);
    }

    #[tokio::test]
    async fn test_price_cart_fails_for_unknown_product() {
        let mock = Arc::new(MockBackend::default());
        let catalog = catalog(&mock);
        let cart = Cart::from_items([product("gone", 100, 18).to_cart_item(1)]);
        assert_eq!(catalog.price_cart(&cart).await, Err(ApiError::NotFound));
    }

    #[tokio::test]
    async fn test_warm_skips_known_rates() {
        let mock = Arc::new(MockBackend::with_products([product("p1", 100, 18)]));
        let catalog = catalog(&mock);
        catalog.list().await.expect("list");

        catalog.warm(&[ProductId::new("p1")]).await.expect("warm");
        assert_eq!(mock.calls("get_product"), 0);
    }

    #[tokio::test]
    async fn test_unknown_product() {
        let mock = Arc::new(MockBackend::default());
        let catalog = catalog(&mock);
        assert!(catalog.product(&ProductId::new("nope")).await.is_err());
        assert!(catalog.cached(&ProductId::new("nope")).is_none());
    }
}
