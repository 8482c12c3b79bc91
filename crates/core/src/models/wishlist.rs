//! Liked products.

use serde::{Deserialize, Serialize};

use crate::types::ProductId;

/// Set of liked product ids, kept in the order they were liked.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<ProductId>", into = "Vec<ProductId>")]
pub struct Wishlist {
    ids: Vec<ProductId>,
}

impl Wishlist {
    #[must_use]
    pub fn contains(&self, id: &ProductId) -> bool {
        self.ids.contains(id)
    }

    #[must_use]
    pub fn ids(&self) -> &[ProductId] {
        &self.ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Insert if absent. Returns `true` if the id was added.
    pub fn insert(&mut self, id: ProductId) -> bool {
        if self.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Remove if present. Returns `true` if the id was removed.
    pub fn remove(&mut self, id: &ProductId) -> bool {
        let before = self.ids.len();
        self.ids.retain(|existing| existing != id);
        self.ids.len() != before
    }

    /// Flip membership. Returns the new membership state.
    pub fn toggle(&mut self, id: ProductId) -> bool {
        if self.remove(&id) {
            false
        } else {
            self.ids.push(id);
            true
        }
    }
}

impl From<Vec<ProductId>> for Wishlist {
    fn from(ids: Vec<ProductId>) -> Self {
        let mut wishlist = Self::default();
        for id in ids {
            wishlist.insert(id);
        }
        wishlist
    }
}

impl From<Wishlist> for Vec<ProductId> {
    fn from(wishlist: Wishlist) -> Self {
        wishlist.ids
    }
}
