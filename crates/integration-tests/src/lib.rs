//! Integration tests for Pantry.
//!
//! The tests drive a real [`Storefront`](pantry_sync::Storefront) over HTTP
//! against [`FakeServer`], an in-process axum implementation of the
//! storefront REST API with failure injection.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p pantry-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `shopping` - Cart, wishlist, addresses and checkout over HTTP
//! - `resilience` - Read retries, write rollback, token refresh
//! - `persistence` - File-backed state across restarts
//! - `admin` - Admin key and order status changes

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path as UrlPath, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use pantry_core::{
    AddressFields, AddressId, CartItem, Order, OrderId, OrderRequest, OrderStatus, Phone, Product,
    ProductId, ProductInput, Profile, ProfileUpdate, Role, UserId, UserSummary,
};
use pantry_sync::{ApiResponse, Storefront, SyncConfig};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

/// Admin key the fake server accepts.
pub const ADMIN_KEY: &str = "Kx7#mQ2$vN9@pL4&wR8!tZ3^";

/// ID token the fake identity check accepts.
pub const VALID_ID_TOKEN: &str = "valid-id-token";

/// Phone number used by most tests.
pub const SHOPPER_PHONE: &str = "9876543210";

// =============================================================================
// Server
// =============================================================================

/// In-process storefront API.
///
/// Routes are mounted under `/api/` to exercise base-path handling.
pub struct FakeServer {
    addr: SocketAddr,
    state: Arc<FakeState>,
    handle: JoinHandle<()>,
}

impl FakeServer {
    /// Bind to an ephemeral port and start serving.
    ///
    /// # Panics
    ///
    /// Panics if the listener cannot be bound.
    pub async fn start() -> Self {
        let state = Arc::new(FakeState::default());
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake server");
        let addr = listener.local_addr().expect("local addr");

        let app = Router::new().nest("/api", routes()).with_state(Arc::clone(&state));
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// API base URL, with a trailing slash.
    ///
    /// # Panics
    ///
    /// Never; the address always forms a valid URL.
    #[must_use]
    pub fn base_url(&self) -> Url {
        Url::parse(&format!("http://{}/api/", self.addr)).expect("base url")
    }

    /// Client configuration pointing at this server, storing state in
    /// `data_dir`. Retries are fast so tests stay quick.
    #[must_use]
    pub fn config(&self, data_dir: &Path) -> SyncConfig {
        let mut config = SyncConfig::with_api_url(self.base_url());
        config.admin_key = Some(SecretString::from(ADMIN_KEY));
        config.data_dir = data_dir.to_path_buf();
        config.request_timeout = Duration::from_secs(5);
        config.retry_base = Duration::from_millis(10);
        config
    }

    /// Add products to the catalog.
    pub fn with_products(self, products: impl IntoIterator<Item = Product>) -> Self {
        self.state.db.lock().products.extend(products);
        self
    }

    /// Give `phone` the admin role.
    pub fn grant_admin(&self, phone: &str) {
        self.state.db.lock().user(phone).role = Role::Admin;
    }

    /// Fail the next `times` requests to `route` with `status`.
    ///
    /// Route names match handler names (`list_products`, `upsert_cart`,
    /// `place_order`, `admin_order_status`, ...).
    pub fn fail(&self, route: &'static str, status: StatusCode, times: usize) {
        let mut failures = self.state.failures.lock();
        let queue = failures.entry(route).or_default();
        queue.extend(std::iter::repeat_n(Some(status), times));
    }

    /// Let the next `times` requests to `route` through ahead of failures
    /// queued after this call.
    pub fn pass(&self, route: &'static str, times: usize) {
        let mut failures = self.state.failures.lock();
        let queue = failures.entry(route).or_default();
        queue.extend(std::iter::repeat_n(None, times));
    }

    /// Requests received by `route`, including failed ones.
    #[must_use]
    pub fn hits(&self, route: &str) -> usize {
        self.state.hits.lock().get(route).copied().unwrap_or(0)
    }

    /// Invalidate every access token; refresh tokens stay valid.
    pub fn expire_access_tokens(&self) {
        self.state.db.lock().access_tokens.clear();
    }

    /// Invalidate every refresh token.
    pub fn revoke_refresh_tokens(&self) {
        self.state.db.lock().refresh_tokens.clear();
    }

    /// Delay every response by `delay`.
    pub fn set_latency(&self, delay: Duration) {
        *self.state.latency.lock() = delay;
    }

    /// The server's copy of a user's profile.
    #[must_use]
    pub fn profile(&self, phone: &str) -> Option<Profile> {
        let mut db = self.state.db.lock();
        db.users.contains_key(phone).then(|| db.profile(phone))
    }

    /// Insert an order directly, bypassing the API.
    pub fn seed_order(&self, phone: &str, request: OrderRequest) -> OrderId {
        let mut db = self.state.db.lock();
        let id = OrderId::new(db.next_id("ord"));
        let order = Order::new(id.clone(), request, Utc::now());
        db.user(phone).orders.push(order);
        id
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// An active product with ten units in stock.
#[must_use]
pub fn product(id: &str, price: i64, tax_percent: i64) -> Product {
    Product {
        id: ProductId::new(id),
        name: format!("Product {id}"),
        description: String::new(),
        price: Decimal::from(price),
        tax_percent: Decimal::from(tax_percent),
        category: Some("kitchen".to_string()),
        images: vec![format!("https://cdn.example.in/{id}.jpg")],
        stock: 10,
        active: true,
    }
}

/// A valid shipping address for the test shopper.
///
/// # Panics
///
/// Never; the phone constant is valid.
#[must_use]
pub fn address(name: &str) -> AddressFields {
    AddressFields {
        name: name.to_string(),
        phone: shopper(),
        email: None,
        line1: "12 MG Road".to_string(),
        line2: None,
        city: "Bengaluru".to_string(),
        state: "Karnataka".to_string(),
        pincode: "560001".to_string(),
        landmark: Some("Near the metro".to_string()),
    }
}

/// Start a storefront against `server`, storing state in `data_dir`.
///
/// # Panics
///
/// Panics if the storefront cannot be built.
pub async fn storefront(server: &FakeServer, data_dir: &Path) -> Storefront {
    let shop = Storefront::from_config(&server.config(data_dir)).expect("storefront");
    shop.init().await;
    shop
}

/// Start a storefront and sign in as the test shopper.
///
/// # Panics
///
/// Panics if sign-in fails.
pub async fn signed_in(server: &FakeServer, data_dir: &Path) -> Storefront {
    let shop = storefront(server, data_dir).await;
    shop.login(shopper(), VALID_ID_TOKEN.to_string())
        .await
        .expect("login");
    shop
}

/// The test shopper's phone.
///
/// # Panics
///
/// Never; the constant is valid.
#[must_use]
pub fn shopper() -> Phone {
    Phone::parse(SHOPPER_PHONE).expect("valid phone")
}

// =============================================================================
// State
// =============================================================================

#[derive(Default)]
struct FakeState {
    db: Mutex<Db>,
    failures: Mutex<HashMap<&'static str, VecDeque<Option<StatusCode>>>>,
    hits: Mutex<HashMap<&'static str, usize>>,
    latency: Mutex<Duration>,
}

#[derive(Default)]
struct UserRecord {
    role: Role,
    name: String,
    email: Option<pantry_core::Email>,
    cart: pantry_core::Cart,
    wishlist: pantry_core::Wishlist,
    addresses: pantry_core::AddressBook,
    orders: Vec<Order>,
}

#[derive(Default)]
struct Db {
    products: Vec<Product>,
    users: HashMap<String, UserRecord>,
    /// access token -> phone
    access_tokens: HashMap<String, String>,
    /// refresh token -> phone
    refresh_tokens: HashMap<String, String>,
    next_id: u32,
}

impl Db {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}", self.next_id)
    }

    fn user(&mut self, phone: &str) -> &mut UserRecord {
        self.users.entry(phone.to_string()).or_default()
    }

    fn profile(&mut self, phone: &str) -> Profile {
        let user = self.user(phone);
        Profile {
            id: Some(UserId::new(format!("user-{phone}"))),
            phone: Phone::parse(phone).unwrap_or_else(|_| shopper()),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            cart: user.cart.clone(),
            wishlist: user.wishlist.clone(),
            addresses: user.addresses.clone(),
            orders: user.orders.clone(),
        }
    }

    fn issue_tokens(&mut self, phone: &str) -> Tokens {
        let token = self.next_id("access");
        let refresh_token = self.next_id("refresh");
        self.access_tokens.insert(token.clone(), phone.to_string());
        self.refresh_tokens
            .insert(refresh_token.clone(), phone.to_string());
        Tokens {
            token,
            refresh_token: Some(refresh_token),
            expires_at: None,
        }
    }

    fn product_mut(&mut self, id: &str) -> Result<&mut Product, Rejection> {
        self.products
            .iter_mut()
            .find(|p| p.id.as_str() == id)
            .ok_or_else(|| not_found("product not found"))
    }
}

/// Who may call a route.
enum Access<'a> {
    Public,
    /// Bearer token issued to this phone.
    User(&'a str),
    /// Admin key header.
    Admin,
}

type Rejection = (StatusCode, String);

fn not_found(message: &str) -> Rejection {
    (StatusCode::NOT_FOUND, message.to_string())
}

fn invalid(message: impl ToString) -> Rejection {
    (StatusCode::BAD_REQUEST, message.to_string())
}

fn reply<T: Serialize>(status: StatusCode, body: ApiResponse<T>) -> Response {
    (status, Json(body)).into_response()
}

impl FakeState {
    /// Run a handler body: count the hit, apply latency and injected
    /// failures, check credentials, then wrap the result in an envelope.
    async fn handle<T: Serialize>(
        &self,
        route: &'static str,
        headers: &HeaderMap,
        access: Access<'_>,
        body: impl FnOnce(&mut Db) -> Result<T, Rejection>,
    ) -> Response {
        *self.hits.lock().entry(route).or_insert(0) += 1;

        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let injected = self
            .failures
            .lock()
            .get_mut(route)
            .and_then(VecDeque::pop_front)
            .flatten();
        if let Some(status) = injected {
            return reply(status, ApiResponse::<()>::failure("injected failure"));
        }

        let mut db = self.db.lock();
        if let Err((status, message)) = authorize(&db, headers, &access) {
            return reply(status, ApiResponse::<()>::failure(message));
        }
        match body(&mut db) {
            Ok(data) => reply(StatusCode::OK, ApiResponse::ok(data)),
            Err((status, message)) => reply(status, ApiResponse::<()>::failure(message)),
        }
    }
}

fn authorize(db: &Db, headers: &HeaderMap, access: &Access<'_>) -> Result<(), Rejection> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match access {
        Access::Public => Ok(()),
        Access::User(phone) => match bearer.and_then(|t| db.access_tokens.get(t)) {
            Some(owner) if owner == phone => Ok(()),
            Some(_) => Err((StatusCode::FORBIDDEN, "not your account".to_string())),
            None => Err((StatusCode::UNAUTHORIZED, "token expired".to_string())),
        },
        Access::Admin => {
            let key = headers.get("x-admin-key").and_then(|v| v.to_str().ok());
            if key != Some(ADMIN_KEY) {
                return Err((StatusCode::FORBIDDEN, "admin key required".to_string()));
            }
            // A bearer token, when sent, must still be live.
            match bearer {
                Some(token) if !db.access_tokens.contains_key(token) => {
                    Err((StatusCode::UNAUTHORIZED, "token expired".to_string()))
                }
                _ => Ok(()),
            }
        }
    }
}

// =============================================================================
// Routes
// =============================================================================

type Shared = State<Arc<FakeState>>;

fn routes() -> Router<Arc<FakeState>> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/{id}", get(get_product))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
        .route("/auth/profile/{phone}", get(get_profile).put(update_profile))
        .route(
            "/auth/addresses/{phone}",
            get(list_addresses).post(create_address),
        )
        .route(
            "/auth/addresses/{phone}/{id}",
            put(update_address).delete(delete_address),
        )
        .route("/auth/cart/{phone}", post(upsert_cart).delete(clear_cart))
        .route(
            "/auth/cart/{phone}/{product}",
            delete(remove_cart_item),
        )
        .route("/auth/wishlist/{phone}", post(add_wishlist))
        .route(
            "/auth/wishlist/{phone}/{product}",
            delete(remove_wishlist),
        )
        .route("/auth/orders/{phone}", get(list_orders).post(place_order))
        .route("/admin/products", post(admin_create_product))
        .route(
            "/admin/products/{id}",
            put(admin_update_product).delete(admin_delete_product),
        )
        .route("/admin/orders", get(admin_list_orders))
        .route("/admin/orders/{id}/status", put(admin_order_status))
        .route("/admin/users", get(admin_list_users))
}

// --- Catalog -----------------------------------------------------------------

async fn list_products(State(s): Shared, headers: HeaderMap) -> Response {
    s.handle("list_products", &headers, Access::Public, |db| {
        Ok(db.products.clone())
    })
    .await
}

async fn get_product(State(s): Shared, headers: HeaderMap, UrlPath(id): UrlPath<String>) -> Response {
    s.handle("get_product", &headers, Access::Public, |db| {
        db.product_mut(&id).map(|p| p.clone())
    })
    .await
}

// --- Session -----------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginBody {
    phone: String,
    id_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Tokens {
    token: String,
    refresh_token: Option<String>,
    expires_at: Option<chrono::DateTime<Utc>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginReply {
    #[serde(flatten)]
    tokens: Tokens,
    user: Profile,
}

async fn login(State(s): Shared, headers: HeaderMap, Json(body): Json<LoginBody>) -> Response {
    s.handle("login", &headers, Access::Public, |db| {
        if body.id_token != VALID_ID_TOKEN {
            return Err((StatusCode::UNAUTHORIZED, "invalid id token".to_string()));
        }
        let tokens = db.issue_tokens(&body.phone);
        Ok(LoginReply {
            tokens,
            user: db.profile(&body.phone),
        })
    })
    .await
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody {
    refresh_token: String,
}

async fn refresh(State(s): Shared, headers: HeaderMap, Json(body): Json<RefreshBody>) -> Response {
    s.handle("refresh", &headers, Access::Public, |db| {
        let phone = db
            .refresh_tokens
            .remove(&body.refresh_token)
            .ok_or_else(|| (StatusCode::UNAUTHORIZED, "refresh token revoked".to_string()))?;
        Ok(db.issue_tokens(&phone))
    })
    .await
}

async fn get_profile(State(s): Shared, headers: HeaderMap, UrlPath(phone): UrlPath<String>) -> Response {
    s.handle("get_profile", &headers, Access::User(&phone), |db| {
        Ok(db.profile(&phone))
    })
    .await
}

async fn update_profile(
    State(s): Shared,
    headers: HeaderMap,
    UrlPath(phone): UrlPath<String>,
    Json(update): Json<ProfileUpdate>,
) -> Response {
    s.handle("update_profile", &headers, Access::User(&phone), |db| {
        let user = db.user(&phone);
        if let Some(name) = update.name {
            user.name = name;
        }
        if update.email.is_some() {
            user.email = update.email;
        }
        Ok(db.profile(&phone))
    })
    .await
}

// --- Addresses ---------------------------------------------------------------

#[derive(Deserialize)]
struct AddressBody {
    #[serde(flatten)]
    fields: AddressFields,
    #[serde(default)]
    default: bool,
}

async fn list_addresses(State(s): Shared, headers: HeaderMap, UrlPath(phone): UrlPath<String>) -> Response {
    s.handle("list_addresses", &headers, Access::User(&phone), |db| {
        Ok(db.user(&phone).addresses.clone())
    })
    .await
}

async fn create_address(
    State(s): Shared,
    headers: HeaderMap,
    UrlPath(phone): UrlPath<String>,
    Json(body): Json<AddressBody>,
) -> Response {
    s.handle("create_address", &headers, Access::User(&phone), |db| {
        let id = AddressId::new(db.next_id("addr"));
        let book = &mut db.user(&phone).addresses;
        book.insert(id, body.fields, body.default).map_err(invalid)?;
        Ok(book.clone())
    })
    .await
}

async fn update_address(
    State(s): Shared,
    headers: HeaderMap,
    UrlPath((phone, id)): UrlPath<(String, String)>,
    Json(body): Json<AddressBody>,
) -> Response {
    s.handle("update_address", &headers, Access::User(&phone), |db| {
        let id = AddressId::new(id);
        let book = &mut db.user(&phone).addresses;
        book.update(&id, body.fields)
            .map_err(|_| not_found("address not found"))?;
        if body.default {
            book.set_default(&id).map_err(invalid)?;
        }
        Ok(book.clone())
    })
    .await
}

async fn delete_address(
    State(s): Shared,
    headers: HeaderMap,
    UrlPath((phone, id)): UrlPath<(String, String)>,
) -> Response {
    s.handle("delete_address", &headers, Access::User(&phone), |db| {
        let book = &mut db.user(&phone).addresses;
        book.remove(&AddressId::new(id))
            .map_err(|_| not_found("address not found"))?;
        Ok(book.clone())
    })
    .await
}

// --- Cart --------------------------------------------------------------------

async fn upsert_cart(
    State(s): Shared,
    headers: HeaderMap,
    UrlPath(phone): UrlPath<String>,
    Json(item): Json<CartItem>,
) -> Response {
    s.handle("upsert_cart", &headers, Access::User(&phone), |db| {
        let in_stock = db
            .products
            .iter()
            .find(|p| p.id == item.product_id)
            .map_or(0, |p| p.stock);
        if item.quantity > in_stock {
            return Err(invalid(format!("Only {in_stock} left in stock")));
        }
        let cart = &mut db.user(&phone).cart;
        if cart.get(&item.product_id).is_some() {
            cart.set_quantity(&item.product_id, item.quantity)
                .map_err(invalid)?;
        } else {
            cart.add(item);
        }
        Ok(cart.clone())
    })
    .await
}

async fn remove_cart_item(
    State(s): Shared,
    headers: HeaderMap,
    UrlPath((phone, product)): UrlPath<(String, String)>,
) -> Response {
    s.handle("remove_cart_item", &headers, Access::User(&phone), |db| {
        let cart = &mut db.user(&phone).cart;
        let _ = cart.remove(&ProductId::new(product));
        Ok(cart.clone())
    })
    .await
}

async fn clear_cart(State(s): Shared, headers: HeaderMap, UrlPath(phone): UrlPath<String>) -> Response {
    s.handle("clear_cart", &headers, Access::User(&phone), |db| {
        let cart = &mut db.user(&phone).cart;
        cart.clear();
        Ok(cart.clone())
    })
    .await
}

// --- Wishlist ----------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WishlistBody {
    product_id: ProductId,
}

async fn add_wishlist(
    State(s): Shared,
    headers: HeaderMap,
    UrlPath(phone): UrlPath<String>,
    Json(body): Json<WishlistBody>,
) -> Response {
    s.handle("add_wishlist", &headers, Access::User(&phone), |db| {
        let wishlist = &mut db.user(&phone).wishlist;
        wishlist.insert(body.product_id);
        Ok(wishlist.clone())
    })
    .await
}

async fn remove_wishlist(
    State(s): Shared,
    headers: HeaderMap,
    UrlPath((phone, product)): UrlPath<(String, String)>,
) -> Response {
    s.handle("remove_wishlist", &headers, Access::User(&phone), |db| {
        let wishlist = &mut db.user(&phone).wishlist;
        wishlist.remove(&ProductId::new(product));
        Ok(wishlist.clone())
    })
    .await
}

// --- Orders ------------------------------------------------------------------

async fn list_orders(State(s): Shared, headers: HeaderMap, UrlPath(phone): UrlPath<String>) -> Response {
    s.handle("list_orders", &headers, Access::User(&phone), |db| {
        Ok(db.user(&phone).orders.clone())
    })
    .await
}

async fn place_order(
    State(s): Shared,
    headers: HeaderMap,
    UrlPath(phone): UrlPath<String>,
    Json(request): Json<OrderRequest>,
) -> Response {
    s.handle("place_order", &headers, Access::User(&phone), |db| {
        if request.items.is_empty() {
            return Err(invalid("Order has no items"));
        }
        let id = OrderId::new(db.next_id("ord"));
        let order = Order::new(id, request, Utc::now());
        db.user(&phone).orders.push(order.clone());
        Ok(order)
    })
    .await
}

// --- Admin -------------------------------------------------------------------

fn product_from_input(id: ProductId, input: ProductInput) -> Product {
    Product {
        id,
        name: input.name,
        description: input.description,
        price: input.price,
        tax_percent: input.tax_percent,
        category: input.category,
        images: input.images,
        stock: input.stock,
        active: input.active,
    }
}

async fn admin_create_product(
    State(s): Shared,
    headers: HeaderMap,
    Json(input): Json<ProductInput>,
) -> Response {
    s.handle("admin_create_product", &headers, Access::Admin, |db| {
        let product = product_from_input(ProductId::new(db.next_id("prod")), input);
        db.products.push(product.clone());
        Ok(product)
    })
    .await
}

async fn admin_update_product(
    State(s): Shared,
    headers: HeaderMap,
    UrlPath(id): UrlPath<String>,
    Json(input): Json<ProductInput>,
) -> Response {
    s.handle("admin_update_product", &headers, Access::Admin, |db| {
        let product = db.product_mut(&id)?;
        *product = product_from_input(product.id.clone(), input);
        Ok(product.clone())
    })
    .await
}

async fn admin_delete_product(
    State(s): Shared,
    headers: HeaderMap,
    UrlPath(id): UrlPath<String>,
) -> Response {
    s.handle("admin_delete_product", &headers, Access::Admin, |db| {
        let before = db.products.len();
        db.products.retain(|p| p.id.as_str() != id);
        if db.products.len() == before {
            return Err(not_found("product not found"));
        }
        Ok(())
    })
    .await
}

async fn admin_list_orders(State(s): Shared, headers: HeaderMap) -> Response {
    s.handle("admin_list_orders", &headers, Access::Admin, |db| {
        Ok(db
            .users
            .values()
            .flat_map(|u| u.orders.iter().cloned())
            .collect::<Vec<_>>())
    })
    .await
}

#[derive(Deserialize)]
struct StatusBody {
    status: OrderStatus,
}

async fn admin_order_status(
    State(s): Shared,
    headers: HeaderMap,
    UrlPath(id): UrlPath<String>,
    Json(body): Json<StatusBody>,
) -> Response {
    s.handle("admin_order_status", &headers, Access::Admin, |db| {
        let order = db
            .users
            .values_mut()
            .flat_map(|u| u.orders.iter_mut())
            .find(|o| o.id().as_str() == id)
            .ok_or_else(|| not_found("order not found"))?;
        order.set_status(body.status).map_err(invalid)?;
        Ok(order.clone())
    })
    .await
}

async fn admin_list_users(State(s): Shared, headers: HeaderMap) -> Response {
    s.handle("admin_list_users", &headers, Access::Admin, |db| {
        Ok(db
            .users
            .iter()
            .filter_map(|(phone, user)| {
                Some(UserSummary {
                    id: UserId::new(format!("user-{phone}")),
                    phone: Phone::parse(phone).ok()?,
                    name: user.name.clone(),
                    email: user.email.clone(),
                    role: user.role,
                    created_at: None,
                })
            })
            .collect::<Vec<_>>())
    })
    .await
}
