//! Saved shipping addresses.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::types::{AddressId, Email, Phone};

/// Contact and postal fields of an address, without identity.
///
/// Also used as the shipping snapshot stored on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressFields {
    pub name: String,
    pub phone: Phone,
    #[serde(default)]
    pub email: Option<Email>,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
    #[serde(default)]
    pub landmark: Option<String>,
}

impl AddressFields {
    /// Check required fields and the pincode format.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), DomainError> {
        let required = [
            ("name", &self.name),
            ("line1", &self.line1),
            ("city", &self.city),
            ("state", &self.state),
            ("pincode", &self.pincode),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(DomainError::MissingField(field));
            }
        }

        let pincode = self.pincode.trim();
        if pincode.len() != 6 || !pincode.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::InvalidPincode(self.pincode.clone()));
        }
        Ok(())
    }
}

/// A saved address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(alias = "_id")]
    pub id: AddressId,
    #[serde(flatten)]
    pub fields: AddressFields,
    #[serde(default)]
    pub default: bool,
}

/// A user's addresses. At most one is marked default; the first address
/// added to an empty book becomes the default.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Address>", into = "Vec<Address>")]
pub struct AddressBook {
    addresses: Vec<Address>,
}

impl AddressBook {
    #[must_use]
    pub fn addresses(&self) -> &[Address] {
        &self.addresses
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &AddressId) -> Option<&Address> {
        self.addresses.iter().find(|a| &a.id == id)
    }

    /// The default address, if any.
    #[must_use]
    pub fn default_address(&self) -> Option<&Address> {
        self.addresses.iter().find(|a| a.default)
    }

    /// Append a new address under a temporary id.
    ///
    /// # Errors
    ///
    /// Returns an error if the fields fail validation.
    pub fn add(&mut self, fields: AddressFields, make_default: bool) -> Result<AddressId, DomainError> {
        let id = AddressId::temporary();
        self.insert(id.clone(), fields, make_default)?;
        Ok(id)
    }

    /// Append a new address under a caller-chosen id. Returns whether it
    /// became the default.
    ///
    /// # Errors
    ///
    /// Returns an error if the fields fail validation.
    pub fn insert(
        &mut self,
        id: AddressId,
        fields: AddressFields,
        make_default: bool,
    ) -> Result<bool, DomainError> {
        fields.validate()?;
        let default = make_default || self.addresses.is_empty();
        if default {
            self.clear_default();
        }
        self.addresses.push(Address {
            id,
            fields,
            default,
        });
        Ok(default)
    }

    /// Replace the fields of an existing address.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is unknown or the fields fail validation.
    pub fn update(&mut self, id: &AddressId, fields: AddressFields) -> Result<(), DomainError> {
        fields.validate()?;
        let address = self.get_mut(id)?;
        address.fields = fields;
        Ok(())
    }

    /// Remove an address. If it was the default, the oldest remaining
    /// address is promoted.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::UnknownAddress`] if the id is unknown.
    pub fn remove(&mut self, id: &AddressId) -> Result<Address, DomainError> {
        let idx = self
            .addresses
            .iter()
            .position(|a| &a.id == id)
            .ok_or_else(|| DomainError::UnknownAddress(id.clone()))?;
        let removed = self.addresses.remove(idx);
        if removed.default
            && let Some(first) = self.addresses.first_mut()
        {
            first.default = true;
        }
        Ok(removed)
    }

    /// Mark one address as default, unsetting the previous one.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::UnknownAddress`] if the id is unknown.
    pub fn set_default(&mut self, id: &AddressId) -> Result<(), DomainError> {
        self.get_mut(id)?;
        for address in &mut self.addresses {
            address.default = &address.id == id;
        }
        Ok(())
    }

    /// Swap a temporary id for the one assigned by the server.
    pub fn confirm_id(&mut self, temporary: &AddressId, confirmed: AddressId) -> bool {
        match self.addresses.iter_mut().find(|a| &a.id == temporary) {
            Some(address) => {
                address.id = confirmed;
                true
            }
            None => false,
        }
    }

    fn get_mut(&mut self, id: &AddressId) -> Result<&mut Address, DomainError> {
        self.addresses
            .iter_mut()
            .find(|a| &a.id == id)
            .ok_or_else(|| DomainError::UnknownAddress(id.clone()))
    }

    fn clear_default(&mut self) {
        for address in &mut self.addresses {
            address.default = false;
        }
    }
}

impl From<Vec<Address>> for AddressBook {
    /// Keeps only the first address flagged default.
    fn from(mut addresses: Vec<Address>) -> Self {
        let mut seen_default = false;
        for address in &mut addresses {
            if address.default {
                address.default = !seen_default;
                seen_default = true;
            }
        }
        Self { addresses }
    }
}

impl From<AddressBook> for Vec<Address> {
    fn from(book: AddressBook) -> Self {
        book.addresses
    }
}
