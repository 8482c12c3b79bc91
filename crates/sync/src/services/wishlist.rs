use std::sync::Arc;

use pantry_core::{ProductId, Wishlist};
use tokio::sync::watch;

use super::{adopt, keys};
use crate::api::Backend;
use crate::controller::{Pending, SyncController};
use crate::error::SyncError;
use crate::notify::{Notifier, Severity};
use crate::persist::Storage;
use crate::session::SessionStore;
use crate::store::LocalStore;

/// Liked products.
#[derive(Clone)]
pub struct WishlistService {
    sync: SyncController<Wishlist>,
    backend: Arc<dyn Backend>,
    session: SessionStore,
}

impl WishlistService {
    #[must_use]
    pub fn new(
        storage: Arc<dyn Storage>,
        backend: Arc<dyn Backend>,
        session: SessionStore,
        notifier: Notifier,
    ) -> Self {
        let store = LocalStore::new(keys::WISHLIST, storage);
        Self {
            sync: SyncController::new(store, notifier, Severity::Quiet),
            backend,
            session,
        }
    }

    pub(crate) const fn sync(&self) -> &SyncController<Wishlist> {
        &self.sync
    }

    #[must_use]
    pub fn items(&self) -> Wishlist {
        self.sync.store().get()
    }

    #[must_use]
    pub fn contains(&self, id: &ProductId) -> bool {
        self.sync.store().with(|w| w.contains(id))
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Wishlist> {
        self.sync.store().subscribe()
    }

    /// Flip membership. Returns the new membership and the pending sync.
    ///
    /// # Errors
    ///
    /// Fails without a session or if the lane is closed.
    pub fn toggle(&self, id: &ProductId) -> Result<(bool, Pending<Wishlist>), SyncError> {
        let phone = self.session.phone()?;
        let backend = Arc::clone(&self.backend);
        let liked = !self.contains(id);
        let target = id.clone();
        let pending = self.sync.submit(
            "update wishlist",
            move |wishlist| {
                if liked {
                    wishlist.insert(target.clone());
                } else {
                    wishlist.remove(&target);
                }
                Ok((target.clone(), liked))
            },
            move |(id, liked)| async move {
                if liked {
                    backend.add_to_wishlist(&phone, &id).await
                } else {
                    backend.remove_from_wishlist(&phone, &id).await
                }
            },
            adopt,
        )?;
        Ok((liked, pending))
    }

    /// Like a product. Already-liked products are sent anyway so the server
    /// converges.
    ///
    /// # Errors
    ///
    /// Fails without a session or if the lane is closed.
    pub fn add(&self, id: &ProductId) -> Result<Pending<Wishlist>, SyncError> {
        let phone = self.session.phone()?;
        let backend = Arc::clone(&self.backend);
        let target = id.clone();
        self.sync.submit(
            "add to wishlist",
            move |wishlist| {
                wishlist.insert(target.clone());
                Ok(target.clone())
            },
            move |id| async move { backend.add_to_wishlist(&phone, &id).await },
            adopt,
        )
    }

    /// Unlike a product.
    ///
    /// # Errors
    ///
    /// Fails without a session or if the lane is closed.
    pub fn remove(&self, id: &ProductId) -> Result<Pending<Wishlist>, SyncError> {
        let phone = self.session.phone()?;
        let backend = Arc::clone(&self.backend);
        let target = id.clone();
        self.sync.submit(
            "remove from wishlist",
            move |wishlist| {
                wishlist.remove(&target);
                Ok(target.clone())
            },
            move |id| async move { backend.remove_from_wishlist(&phone, &id).await },
            adopt,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::api::mock::MockBackend;
    use crate::services::fixtures::{Harness, harness};

    fn service(h: &Harness) -> WishlistService {
        let wishlist = WishlistService::new(
            Arc::clone(&h.storage),
            Arc::clone(&h.backend),
            h.session.clone(),
            h.notifier.clone(),
        );
        wishlist.sync().start();
        wishlist
    }

    #[tokio::test]
    async fn test_toggle_twice_restores_membership() {
        let h = harness(MockBackend::default());
        let wishlist = service(&h);
        let id = ProductId::new("p1");

        let (liked, first) = wishlist.toggle(&id).expect("submitted");
        assert!(liked);
        let (liked, second) = wishlist.toggle(&id).expect("submitted");
        assert!(!liked);

        first.await.expect("ok");
        second.await.expect("ok");
        assert!(wishlist.items().is_empty());
        assert!(h.mock.server_wishlist().is_empty());
        assert_eq!(h.mock.calls("add_to_wishlist"), 1);
        assert_eq!(h.mock.calls("remove_from_wishlist"), 1);
    }

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let h = harness(MockBackend::default());
        let wishlist = service(&h);
        let id = ProductId::new("p1");

        wishlist.add(&id).expect("submitted").await.expect("ok");
        wishlist.add(&id).expect("submitted").await.expect("ok");
        assert_eq!(wishlist.items().len(), 1);
        assert!(wishlist.contains(&id));
    }

    #[tokio::test]
    async fn test_failed_toggle_rolls_back_quietly() {
        let h = harness(MockBackend::default());
        let wishlist = service(&h);
        let mut notes = h.notifier.subscribe();

        h.mock.fail_next(ApiError::Timeout);
        let (liked, pending) = wishlist.toggle(&ProductId::new("p1")).expect("submitted");
        assert!(liked);
        assert!(pending.await.is_err());
        assert!(wishlist.items().is_empty());

        let note = notes.recv().await.expect("notification");
        assert_eq!(note.severity, Severity::Quiet);
        assert_eq!(note.source, "wishlist");
    }
}
