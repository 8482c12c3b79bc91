//! Newtype IDs for type-safe entity references.
//!
//! The storefront backend hands out opaque string identifiers (document ids),
//! so every ID wraps a `String`. Use the `define_id!` macro to create wrappers
//! that prevent accidentally mixing IDs from different entity types.

/// Prefix carried by client-assigned IDs that the server has not confirmed yet.
pub const TEMPORARY_ID_PREFIX: &str = "tmp-";

/// Macro to define a type-safe string ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize`/`Deserialize` with `#[serde(transparent)]`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - `new()`, `as_str()`, `into_inner()`
/// - `Display`, `From<String>` and `From<&str>`
///
/// # Example
///
/// ```rust
/// # use pantry_core::define_id;
/// define_id!(ReviewId);
/// define_id!(CouponId);
///
/// let review = ReviewId::new("65f0c2");
/// let coupon = CouponId::new("65f0c2");
///
/// // These are different types, so this won't compile:
/// // let _: ReviewId = coupon;
/// assert_eq!(review.as_str(), coupon.as_str());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }
    };
}

define_id!(UserId);
define_id!(ProductId);
define_id!(OrderId);
define_id!(AddressId);

impl AddressId {
    /// Generate a client-side placeholder ID for an address that has not been
    /// persisted by the server yet.
    #[must_use]
    pub fn temporary() -> Self {
        Self(format!("{TEMPORARY_ID_PREFIX}{}", uuid::Uuid::new_v4().simple()))
    }

    /// Whether this ID was assigned locally and is still awaiting confirmation.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMPORARY_ID_PREFIX)
    }
}
