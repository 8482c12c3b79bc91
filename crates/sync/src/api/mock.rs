//! In-memory [`Backend`] for unit tests.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use pantry_core::{
    AddressBook, AddressFields, AddressId, Cart, CartItem, Order, OrderId, OrderRequest,
    OrderStatus, Phone, Product, ProductId, ProductInput, Profile, ProfileUpdate, Role,
    UserSummary, UserId, Wishlist,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tokio::sync::{RwLock, RwLockWriteGuard};

use super::{ApiError, ApiResult, Backend, LoginRequest, LoginResponse};

/// A purchasable product.
pub fn product(id: &str, price: i64, tax_percent: i64) -> Product {
    Product {
        id: ProductId::new(id),
        name: format!("Product {id}"),
        description: String::new(),
        price: Decimal::from(price),
        tax_percent: Decimal::from(tax_percent),
        category: None,
        images: vec![format!("https://cdn.example.in/{id}.jpg")],
        stock: 10,
        active: true,
    }
}

#[derive(Default)]
struct MockState {
    products: Vec<Product>,
    role: Role,
    cart: Cart,
    wishlist: Wishlist,
    addresses: AddressBook,
    orders: Vec<Order>,
    next_id: u32,
    failures: VecDeque<Option<ApiError>>,
    calls: HashMap<&'static str, usize>,
}

/// Server stand-in with failure injection.
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
    gate: RwLock<()>,
}

impl MockBackend {
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let mock = Self::default();
        mock.state.lock().products = products.into_iter().collect();
        mock
    }

    pub fn set_role(&self, role: Role) {
        self.state.lock().role = role;
    }

    /// Make the next call fail with `err`.
    pub fn fail_next(&self, err: ApiError) {
        self.state.lock().failures.push_back(Some(err));
    }

    /// Let the next call through before any failure queued after it.
    pub fn pass_next(&self) {
        self.state.lock().failures.push_back(None);
    }

    /// Number of times `method` was called.
    pub fn calls(&self, method: &str) -> usize {
        self.state.lock().calls.get(method).copied().unwrap_or(0)
    }

    /// Block every call until the guard is dropped.
    pub async fn hold(&self) -> RwLockWriteGuard<'_, ()> {
        self.gate.write().await
    }

    pub fn server_cart(&self) -> Cart {
        self.state.lock().cart.clone()
    }

    pub fn server_wishlist(&self) -> Wishlist {
        self.state.lock().wishlist.clone()
    }

    pub fn server_addresses(&self) -> AddressBook {
        self.state.lock().addresses.clone()
    }

    pub fn server_orders(&self) -> Vec<Order> {
        self.state.lock().orders.clone()
    }

    /// Seed an order placed `days_ago` days before a fixed date.
    pub fn seed_order(&self, id: &str, request: OrderRequest, days_ago: i64) {
        let base = Utc
            .with_ymd_and_hms(2026, 3, 1, 10, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        let order = Order::new(OrderId::new(id), request, base - Duration::days(days_ago));
        self.state.lock().orders.push(order);
    }

    async fn enter(&self, method: &'static str) -> ApiResult<()> {
        drop(self.gate.read().await);
        let mut state = self.state.lock();
        *state.calls.entry(method).or_insert(0) += 1;
        state.failures.pop_front().flatten().map_or(Ok(()), Err)
    }

    fn profile(state: &MockState, phone: &Phone) -> Profile {
        Profile {
            id: Some(UserId::new("user-1")),
            phone: phone.clone(),
            name: "Asha".to_string(),
            email: None,
            role: state.role,
            cart: state.cart.clone(),
            wishlist: state.wishlist.clone(),
            addresses: state.addresses.clone(),
            orders: state.orders.clone(),
        }
    }

    fn next_id(state: &mut MockState, prefix: &str) -> String {
        state.next_id += 1;
        format!("{prefix}-{}", state.next_id)
    }
}

fn invalid(err: &pantry_core::DomainError) -> ApiError {
    ApiError::Validation(err.to_string())
}

#[async_trait]
impl Backend for MockBackend {
    async fn list_products(&self) -> ApiResult<Vec<Product>> {
        self.enter("list_products").await?;
        Ok(self.state.lock().products.clone())
    }

    async fn get_product(&self, id: &ProductId) -> ApiResult<Product> {
        self.enter("get_product").await?;
        self.state
            .lock()
            .products
            .iter()
            .find(|p| &p.id == id)
            .cloned()
            .ok_or(ApiError::NotFound)
    }

    async fn login(&self, request: &LoginRequest) -> ApiResult<LoginResponse> {
        self.enter("login").await?;
        let state = self.state.lock();
        Ok(LoginResponse {
            token: "access-1".to_string(),
            refresh_token: Some("refresh-1".to_string()),
            expires_at: None,
            profile: Self::profile(&state, &request.phone),
        })
    }

    async fn get_profile(&self, phone: &Phone) -> ApiResult<Profile> {
        self.enter("get_profile").await?;
        Ok(Self::profile(&self.state.lock(), phone))
    }

    async fn update_profile(&self, phone: &Phone, update: &ProfileUpdate) -> ApiResult<Profile> {
        self.enter("update_profile").await?;
        let mut profile = Self::profile(&self.state.lock(), phone);
        if let Some(name) = &update.name {
            profile.name.clone_from(name);
        }
        if update.email.is_some() {
            profile.email.clone_from(&update.email);
        }
        Ok(profile)
    }

    async fn list_addresses(&self, _phone: &Phone) -> ApiResult<AddressBook> {
        self.enter("list_addresses").await?;
        Ok(self.state.lock().addresses.clone())
    }

    async fn create_address(
        &self,
        _phone: &Phone,
        fields: &AddressFields,
        default: bool,
    ) -> ApiResult<AddressBook> {
        self.enter("create_address").await?;
        let mut state = self.state.lock();
        let confirmed = AddressId::new(Self::next_id(&mut state, "addr"));
        let tmp = state
            .addresses
            .add(fields.clone(), default)
            .map_err(|e| invalid(&e))?;
        state.addresses.confirm_id(&tmp, confirmed);
        Ok(state.addresses.clone())
    }

    async fn update_address(
        &self,
        _phone: &Phone,
        id: &AddressId,
        fields: &AddressFields,
        default: bool,
    ) -> ApiResult<AddressBook> {
        self.enter("update_address").await?;
        let mut state = self.state.lock();
        state
            .addresses
            .update(id, fields.clone())
            .map_err(|_| ApiError::NotFound)?;
        if default {
            state
                .addresses
                .set_default(id)
                .map_err(|_| ApiError::NotFound)?;
        }
        Ok(state.addresses.clone())
    }

    async fn delete_address(&self, _phone: &Phone, id: &AddressId) -> ApiResult<AddressBook> {
        self.enter("delete_address").await?;
        let mut state = self.state.lock();
        state
            .addresses
            .remove(id)
            .map_err(|_| ApiError::NotFound)?;
        Ok(state.addresses.clone())
    }

    async fn upsert_cart_item(&self, _phone: &Phone, item: &CartItem) -> ApiResult<Cart> {
        self.enter("upsert_cart_item").await?;
        let mut state = self.state.lock();
        if state
            .cart
            .set_quantity(&item.product_id, item.quantity)
            .is_err()
        {
            state.cart.add(item.clone());
        }
        Ok(state.cart.clone())
    }

    async fn remove_cart_item(&self, _phone: &Phone, id: &ProductId) -> ApiResult<Cart> {
        self.enter("remove_cart_item").await?;
        let mut state = self.state.lock();
        // Removing a missing line is idempotent server-side.
        let _ = state.cart.remove(id);
        Ok(state.cart.clone())
    }

    async fn clear_cart(&self, _phone: &Phone) -> ApiResult<Cart> {
        self.enter("clear_cart").await?;
        let mut state = self.state.lock();
        state.cart.clear();
        Ok(state.cart.clone())
    }

    async fn add_to_wishlist(&self, _phone: &Phone, id: &ProductId) -> ApiResult<Wishlist> {
        self.enter("add_to_wishlist").await?;
        let mut state = self.state.lock();
        state.wishlist.insert(id.clone());
        Ok(state.wishlist.clone())
    }

    async fn remove_from_wishlist(&self, _phone: &Phone, id: &ProductId) -> ApiResult<Wishlist> {
        self.enter("remove_from_wishlist").await?;
        let mut state = self.state.lock();
        state.wishlist.remove(id);
        Ok(state.wishlist.clone())
    }

    async fn place_order(&self, _phone: &Phone, request: &OrderRequest) -> ApiResult<Order> {
        self.enter("place_order").await?;
        let mut state = self.state.lock();
        let id = OrderId::new(Self::next_id(&mut state, "ord"));
        let order = Order::new(id, request.clone(), Utc::now());
        state.orders.push(order.clone());
        Ok(order)
    }

    async fn list_orders(&self, _phone: &Phone) -> ApiResult<Vec<Order>> {
        self.enter("list_orders").await?;
        Ok(self.state.lock().orders.clone())
    }

    async fn admin_create_product(&self, input: &ProductInput) -> ApiResult<Product> {
        self.enter("admin_create_product").await?;
        let mut state = self.state.lock();
        let id = ProductId::new(Self::next_id(&mut state, "prod"));
        let product = Product {
            id,
            name: input.name.clone(),
            description: input.description.clone(),
            price: input.price,
            tax_percent: input.tax_percent,
            category: input.category.clone(),
            images: input.images.clone(),
            stock: input.stock,
            active: input.active,
        };
        state.products.push(product.clone());
        Ok(product)
    }

    async fn admin_update_product(
        &self,
        id: &ProductId,
        input: &ProductInput,
    ) -> ApiResult<Product> {
        self.enter("admin_update_product").await?;
        let mut state = self.state.lock();
        let product = state
            .products
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or(ApiError::NotFound)?;
        product.name.clone_from(&input.name);
        product.price = input.price;
        product.tax_percent = input.tax_percent;
        product.stock = input.stock;
        product.active = input.active;
        Ok(product.clone())
    }

    async fn admin_delete_product(&self, id: &ProductId) -> ApiResult<()> {
        self.enter("admin_delete_product").await?;
        self.state.lock().products.retain(|p| &p.id != id);
        Ok(())
    }

    async fn admin_list_orders(&self) -> ApiResult<Vec<Order>> {
        self.enter("admin_list_orders").await?;
        Ok(self.state.lock().orders.clone())
    }

    async fn admin_update_order_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
    ) -> ApiResult<Order> {
        self.enter("admin_update_order_status").await?;
        let mut state = self.state.lock();
        let order = state
            .orders
            .iter_mut()
            .find(|o| o.id() == id)
            .ok_or(ApiError::NotFound)?;
        order.set_status(status).map_err(|e| invalid(&e))?;
        Ok(order.clone())
    }

    async fn admin_list_users(&self) -> ApiResult<Vec<UserSummary>> {
        self.enter("admin_list_users").await?;
        Ok(vec![UserSummary {
            id: UserId::new("user-1"),
            phone: Phone::parse("9876543210").map_err(|e| ApiError::Parse(e.to_string()))?,
            name: "Asha".to_string(),
            email: None,
            role: self.state.lock().role,
            created_at: None,
        }])
    }
}
