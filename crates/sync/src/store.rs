//! Observable, persisted in-memory collections.
//!
//! A [`LocalStore`] owns one collection value. Every change is written to
//! [`Storage`] and published on a `watch` channel before the call that made
//! it returns, so observers and the on-disk snapshot never lag behind memory.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use pantry_core::DomainError;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::persist::{Storage, StorageError, load_json, save_json};

/// Values a [`LocalStore`] can hold.
pub trait Snapshot: Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Snapshot for T where T: Clone + Default + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// A persisted collection with a loading indicator.
///
/// Cloning is cheap and every clone shares the same state.
pub struct LocalStore<T> {
    inner: Arc<StoreInner<T>>,
}

struct StoreInner<T> {
    key: &'static str,
    storage: Arc<dyn Storage>,
    state: watch::Sender<T>,
    /// Serializes read-modify-write cycles so no update is lost.
    write_lock: Mutex<()>,
    loading: Arc<watch::Sender<usize>>,
    initialized: AtomicBool,
}

impl<T> Clone for LocalStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Snapshot> LocalStore<T> {
    /// Create an empty store persisted under `key`.
    #[must_use]
    pub fn new(key: &'static str, storage: Arc<dyn Storage>) -> Self {
        let (state, _) = watch::channel(T::default());
        let (loading, _) = watch::channel(0);
        Self {
            inner: Arc::new(StoreInner {
                key,
                storage,
                state,
                write_lock: Mutex::new(()),
                loading: Arc::new(loading),
                initialized: AtomicBool::new(false),
            }),
        }
    }

    #[must_use]
    pub fn key(&self) -> &'static str {
        self.inner.key
    }

    /// Load the persisted snapshot. Only the first call has any effect.
    ///
    /// A snapshot that cannot be read or decoded is discarded and the store
    /// starts empty.
    pub fn init(&self) {
        if self.inner.initialized.swap(true, Ordering::SeqCst) {
            return;
        }

        let _lock = self.inner.write_lock.lock();
        match load_json::<T>(self.inner.storage.as_ref(), self.inner.key) {
            Ok(Some(value)) => {
                debug!(key = self.inner.key, "Loaded persisted snapshot");
                self.inner.state.send_replace(value);
            }
            Ok(None) => {}
            Err(err) => {
                warn!(key = self.inner.key, error = %err, "Discarding unreadable snapshot");
                if matches!(err, StorageError::Serialization(_))
                    && let Err(err) = self.inner.storage.remove(self.inner.key)
                {
                    warn!(key = self.inner.key, error = %err, "Failed to remove corrupt snapshot");
                }
                self.inner.state.send_replace(T::default());
            }
        }
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.state.borrow().clone()
    }

    /// Run `f` against the current value without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.state.borrow())
    }

    /// Receiver that observes every committed value.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.inner.state.subscribe()
    }

    /// Apply `f` to a copy of the current value and commit it if `f`
    /// succeeds. Returns the value as it was before the change.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `f`; nothing is committed in that case.
    pub fn mutate<R>(
        &self,
        f: impl FnOnce(&mut T) -> Result<R, DomainError>,
    ) -> Result<(T, R), DomainError> {
        let _lock = self.inner.write_lock.lock();
        let mut next = self.inner.state.borrow().clone();
        let out = f(&mut next)?;
        self.persist(&next);
        let previous = self.inner.state.send_replace(next);
        Ok((previous, out))
    }

    /// Replace the value if `f` produces a new one.
    pub fn reconcile(&self, f: impl FnOnce(&T) -> Option<T>) {
        let _lock = self.inner.write_lock.lock();
        let next = f(&self.inner.state.borrow());
        if let Some(next) = next {
            self.persist(&next);
            self.inner.state.send_replace(next);
        }
    }

    /// Replace the value unconditionally.
    pub fn replace(&self, value: T) {
        let _lock = self.inner.write_lock.lock();
        self.persist(&value);
        self.inner.state.send_replace(value);
    }

    /// Reset to the empty value and drop the persisted snapshot.
    pub fn clear(&self) {
        let _lock = self.inner.write_lock.lock();
        if let Err(err) = self.inner.storage.remove(self.inner.key) {
            warn!(key = self.inner.key, error = %err, "Failed to remove snapshot");
        }
        self.inner.state.send_replace(T::default());
    }

    /// Mark an operation in flight until the guard is dropped.
    #[must_use]
    pub fn loading(&self) -> LoadingGuard {
        LoadingGuard::new(Arc::clone(&self.inner.loading))
    }

    /// Whether any operation on this store is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        *self.inner.loading.borrow() > 0
    }

    /// Receiver for the number of in-flight operations.
    #[must_use]
    pub fn subscribe_loading(&self) -> watch::Receiver<usize> {
        self.inner.loading.subscribe()
    }

    fn persist(&self, value: &T) {
        if let Err(err) = save_json(self.inner.storage.as_ref(), self.inner.key, value) {
            warn!(key = self.inner.key, error = %err, "Failed to persist snapshot");
        }
    }
}

/// Keeps a store's loading indicator raised while alive.
#[must_use = "the loading flag drops as soon as the guard does"]
pub struct LoadingGuard {
    counter: Arc<watch::Sender<usize>>,
}

impl LoadingGuard {
    fn new(counter: Arc<watch::Sender<usize>>) -> Self {
        counter.send_modify(|n| *n += 1);
        Self { counter }
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.counter.send_modify(|n| *n = n.saturating_sub(1));
    }
}

#[cfg(test)]
mod tests {
    use pantry_core::{Cart, CartItem, ProductId};
    use rust_decimal::Decimal;

    use super::*;
    use crate::persist::MemoryStorage;

    fn item(id: &str, quantity: u32) -> CartItem {
        CartItem {
            product_id: ProductId::new(id),
            name: id.to_uppercase(),
            image: None,
            quantity,
            price: Decimal::from(100),
        }
    }

    fn store(storage: &Arc<MemoryStorage>) -> LocalStore<Cart> {
        LocalStore::new("cart", Arc::clone(storage) as Arc<dyn Storage>)
    }

    #[test]
    fn test_mutate_writes_through() {
        let storage = Arc::new(MemoryStorage::default());
        let cart = store(&storage);

        let (previous, ()) = cart
            .mutate(|c| {
                c.add(item("p1", 2));
                Ok(())
            })
            .expect("mutate");

        assert!(previous.is_empty());
        assert_eq!(cart.get().item_count(), 2);

        let persisted: Option<Cart> = load_json(storage.as_ref(), "cart").expect("load");
        assert_eq!(persisted, Some(cart.get()));
    }

    #[test]
    fn test_failed_mutation_commits_nothing() {
        let storage = Arc::new(MemoryStorage::default());
        let cart = store(&storage);

        let result = cart.mutate(|c| c.remove(&ProductId::new("missing")));
        assert!(result.is_err());
        assert!(cart.get().is_empty());
        assert!(storage.is_empty());
    }

    #[test]
    fn test_init_loads_snapshot_once() {
        let storage = Arc::new(MemoryStorage::default());
        save_json(storage.as_ref(), "cart", &Cart::from_items([item("p1", 1)])).expect("save");

        let cart = store(&storage);
        cart.init();
        assert_eq!(cart.get().item_count(), 1);

        // A second init does not clobber in-memory changes.
        cart.replace(Cart::default());
        cart.init();
        assert!(cart.get().is_empty());
    }

    #[test]
    fn test_init_discards_corrupt_snapshot() {
        let storage = Arc::new(MemoryStorage::default());
        storage.write("cart", "{oops").expect("write");

        let cart = store(&storage);
        cart.init();
        assert!(cart.get().is_empty());
        assert!(storage.read("cart").expect("read").is_none());
    }

    #[test]
    fn test_subscribers_see_changes() {
        let storage = Arc::new(MemoryStorage::default());
        let cart = store(&storage);
        let mut rx = cart.subscribe();

        cart.replace(Cart::from_items([item("p1", 3)]));
        assert!(rx.has_changed().expect("open"));
        assert_eq!(rx.borrow_and_update().item_count(), 3);
    }

    #[test]
    fn test_loading_guard_scopes_flag() {
        let storage = Arc::new(MemoryStorage::default());
        let cart = store(&storage);
        assert!(!cart.is_loading());

        let outer = cart.loading();
        {
            let _inner = cart.loading();
            assert!(cart.is_loading());
        }
        assert!(cart.is_loading());
        drop(outer);
        assert!(!cart.is_loading());
    }

    #[test]
    fn test_clear_removes_snapshot() {
        let storage = Arc::new(MemoryStorage::default());
        let cart = store(&storage);
        cart.replace(Cart::from_items([item("p1", 1)]));
        cart.clear();
        assert!(cart.get().is_empty());
        assert!(storage.read("cart").expect("read").is_none());
    }
}
