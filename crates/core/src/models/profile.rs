//! User profile and the collections the server keeps for it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{AddressBook, Cart, Order, Wishlist};
use crate::types::{Email, Phone, Role, UserId};

/// `GET /auth/profile/:phone`: identity plus the canonical copy of every
/// collection, used to reconcile local state at session start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default, alias = "_id")]
    pub id: Option<UserId>,
    pub phone: Phone,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<Email>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub cart: Cart,
    #[serde(default)]
    pub wishlist: Wishlist,
    #[serde(default)]
    pub addresses: AddressBook,
    #[serde(default)]
    pub orders: Vec<Order>,
}

/// Body of `PUT /auth/profile/:phone`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<Email>,
}

/// A row in the admin user list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    #[serde(alias = "_id")]
    pub id: UserId,
    pub phone: Phone,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<Email>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}
