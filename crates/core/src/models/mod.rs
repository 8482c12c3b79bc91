//! Storefront collections and the records they hold.

pub mod address;
pub mod cart;
pub mod order;
pub mod product;
pub mod profile;
pub mod wishlist;

pub use address::{Address, AddressBook, AddressFields};
pub use cart::{Cart, CartItem};
pub use order::{Order, OrderItem, OrderRequest, sort_newest_first};
pub use product::{Product, ProductInput};
pub use profile::{Profile, ProfileUpdate, UserSummary};
pub use wishlist::Wishlist;
