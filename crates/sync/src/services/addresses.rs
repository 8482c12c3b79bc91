use std::sync::Arc;

use pantry_core::{Address, AddressBook, AddressFields, AddressId, DomainError};
use tokio::sync::watch;

use super::{adopt, keys};
use crate::api::Backend;
use crate::controller::{Pending, SyncController};
use crate::error::SyncError;
use crate::notify::{Notifier, Severity};
use crate::persist::Storage;
use crate::session::SessionStore;
use crate::store::LocalStore;

/// Saved shipping addresses.
///
/// New addresses get a temporary id until the server answers with the
/// canonical book. Edits to an address that still has a temporary id are
/// rejected, since the server has no record of it yet.
#[derive(Clone)]
pub struct AddressService {
    sync: SyncController<AddressBook>,
    backend: Arc<dyn Backend>,
    session: SessionStore,
}

impl AddressService {
    #[must_use]
    pub fn new(
        storage: Arc<dyn Storage>,
        backend: Arc<dyn Backend>,
        session: SessionStore,
        notifier: Notifier,
    ) -> Self {
        let store = LocalStore::new(keys::ADDRESSES, storage);
        Self {
            sync: SyncController::new(store, notifier, Severity::Error),
            backend,
            session,
        }
    }

    pub(crate) const fn sync(&self) -> &SyncController<AddressBook> {
        &self.sync
    }

    #[must_use]
    pub fn list(&self) -> AddressBook {
        self.sync.store().get()
    }

    #[must_use]
    pub fn get(&self, id: &AddressId) -> Option<Address> {
        self.sync.store().with(|book| book.get(id).cloned())
    }

    #[must_use]
    pub fn default_address(&self) -> Option<Address> {
        self.sync.store().with(|book| book.default_address().cloned())
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AddressBook> {
        self.sync.store().subscribe()
    }

    /// Save a new address. Returns its temporary id and the pending sync.
    ///
    /// The first address is always the default; `make_default` moves the
    /// default flag to the new address.
    ///
    /// # Errors
    ///
    /// Fails without a session, if the fields are invalid, or if the lane is
    /// closed.
    pub fn add(
        &self,
        fields: AddressFields,
        make_default: bool,
    ) -> Result<(AddressId, Pending<AddressBook>), SyncError> {
        let phone = self.session.phone()?;
        let backend = Arc::clone(&self.backend);
        let id = AddressId::temporary();
        let temporary = id.clone();

        let pending = self.sync.submit(
            "save address",
            move |book| {
                let default = book.insert(temporary.clone(), fields.clone(), make_default)?;
                Ok((fields.clone(), default))
            },
            move |(fields, default)| async move {
                backend.create_address(&phone, &fields, default).await
            },
            adopt,
        )?;
        Ok((id, pending))
    }

    /// Replace an address's fields.
    ///
    /// # Errors
    ///
    /// Fails without a session, for unknown or unconfirmed ids, invalid
    /// fields, or if the lane is closed.
    pub fn update(
        &self,
        id: &AddressId,
        fields: AddressFields,
    ) -> Result<Pending<AddressBook>, SyncError> {
        let phone = self.session.phone()?;
        Self::require_confirmed(id)?;
        let backend = Arc::clone(&self.backend);
        let target = id.clone();

        self.sync.submit(
            "update address",
            move |book| {
                book.update(&target, fields.clone())?;
                let default = book.get(&target).is_some_and(|a| a.default);
                Ok((target.clone(), fields.clone(), default))
            },
            move |(id, fields, default)| async move {
                backend.update_address(&phone, &id, &fields, default).await
            },
            adopt,
        )
    }

    /// Delete an address. If it was the default, the oldest remaining
    /// address becomes the default.
    ///
    /// # Errors
    ///
    /// Fails without a session, for unknown or unconfirmed ids, or if the
    /// lane is closed.
    pub fn remove(&self, id: &AddressId) -> Result<Pending<AddressBook>, SyncError> {
        let phone = self.session.phone()?;
        Self::require_confirmed(id)?;
        let backend = Arc::clone(&self.backend);
        let target = id.clone();

        self.sync.submit(
            "delete address",
            move |book| book.remove(&target).map(|removed| removed.id),
            move |id| async move { backend.delete_address(&phone, &id).await },
            adopt,
        )
    }

    /// Make an address the default, unsetting the previous default.
    ///
    /// # Errors
    ///
    /// Fails without a session, for unknown or unconfirmed ids, or if the
    /// lane is closed.
    pub fn set_default(&self, id: &AddressId) -> Result<Pending<AddressBook>, SyncError> {
        let phone = self.session.phone()?;
        Self::require_confirmed(id)?;
        let backend = Arc::clone(&self.backend);
        let target = id.clone();

        self.sync.submit(
            "set default address",
            move |book| {
                book.set_default(&target)?;
                let fields = book
                    .get(&target)
                    .map(|a| a.fields.clone())
                    .ok_or_else(|| DomainError::UnknownAddress(target.clone()))?;
                Ok((target.clone(), fields))
            },
            move |(id, fields)| async move {
                backend.update_address(&phone, &id, &fields, true).await
            },
            adopt,
        )
    }

    fn require_confirmed(id: &AddressId) -> Result<(), SyncError> {
        if id.is_temporary() {
            return Err(DomainError::UnconfirmedAddress(id.clone()).into());
        }
        Ok(())
    }
}
