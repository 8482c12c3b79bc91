//! `reqwest` implementation of [`Backend`].

use std::sync::Arc;

use async_trait::async_trait;
use pantry_core::{
    AddressBook, AddressFields, AddressId, Cart, CartItem, Order, OrderId, OrderRequest,
    OrderStatus, Phone, Product, ProductId, ProductInput, Profile, ProfileUpdate, UserSummary,
    Wishlist,
};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::error::{ApiError, ApiResult};
use super::retry::RetryPolicy;
use super::types::{
    AddressPayload, ApiResponse, LoginRequest, LoginResponse, RefreshRequest, RefreshResponse,
    StatusPayload, WishlistPayload,
};
use super::Backend;
use crate::config::SyncConfig;
use crate::session::SessionStore;

/// Header carrying the admin key on `/admin` routes.
const ADMIN_KEY_HEADER: &str = "x-admin-key";

/// Default `Retry-After` when a 429 does not include one.
const DEFAULT_RETRY_AFTER_SECS: u64 = 1;

/// Which credentials a request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Auth {
    /// No credentials (catalog, login, refresh).
    Public,
    /// Bearer token; a 401 triggers one refresh and replay.
    User,
    /// Admin key plus the bearer token if signed in. A 401 on a request
    /// that carried a token is handled like [`Auth::User`].
    Admin,
}

impl Auth {
    const fn refreshes(self, token: Option<&str>) -> bool {
        match self {
            Self::Public => false,
            Self::User => true,
            Self::Admin => token.is_some(),
        }
    }
}

/// HTTP client for the storefront API.
///
/// Cheap to clone; clones share the connection pool and session.
#[derive(Clone)]
pub struct HttpBackend {
    inner: Arc<HttpBackendInner>,
}

struct HttpBackendInner {
    client: reqwest::Client,
    base_url: Url,
    admin_key: Option<SecretString>,
    session: SessionStore,
    retry: RetryPolicy,
    /// Held while refreshing so concurrent 401s trigger a single refresh.
    refresh_lock: Mutex<()>,
}

impl HttpBackend {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new(config: &SyncConfig, session: SessionStore) -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("pantry/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(HttpBackendInner {
                client,
                base_url: config.api_url.clone(),
                admin_key: config.admin_key.clone(),
                session,
                retry: RetryPolicy::new(config.read_attempts, config.retry_base),
                refresh_lock: Mutex::new(()),
            }),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    /// Join path segments onto the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::Transport("API URL cannot have a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `GET` with retries.
    async fn get<T: DeserializeOwned>(&self, url: Url, auth: Auth) -> ApiResult<T> {
        self.inner
            .retry
            .run(url.path(), || self.send(Method::GET, url.clone(), None, auth))
            .await
    }

    /// Any other method, never retried.
    async fn write<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&(impl Serialize + Sync)>,
        auth: Auth,
    ) -> ApiResult<T> {
        let body = body.map(serde_json::to_value).transpose()?;
        self.send(method, url, body, auth).await
    }

    /// Send once, refreshing and replaying a single time on 401.
    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
        auth: Auth,
    ) -> ApiResult<T> {
        let token = self.token_for(auth)?;
        let response = self
            .execute(&method, &url, body.as_ref(), auth, token.as_deref())
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED && auth.refreshes(token.as_deref()) {
            debug!(path = url.path(), "Access token rejected");
            self.refresh_session(token.as_deref()).await?;
            let token = self.token_for(auth)?;
            let replay = self
                .execute(&method, &url, body.as_ref(), auth, token.as_deref())
                .await?;
            return Self::decode(replay).await;
        }

        Self::decode(response).await
    }

    fn token_for(&self, auth: Auth) -> ApiResult<Option<String>> {
        match auth {
            Auth::Public => Ok(None),
            Auth::User => self.inner.session.token().map(Some).ok_or(ApiError::NotSignedIn),
            Auth::Admin => Ok(self.inner.session.token()),
        }
    }

    async fn execute(
        &self,
        method: &Method,
        url: &Url,
        body: Option<&serde_json::Value>,
        auth: Auth,
        token: Option<&str>,
    ) -> ApiResult<reqwest::Response> {
        let mut request = self.inner.client.request(method.clone(), url.clone());
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if auth == Auth::Admin {
            let key = self
                .inner
                .admin_key
                .as_ref()
                .ok_or(ApiError::MissingAdminKey)?;
            request = request.header(ADMIN_KEY_HEADER, key.expose_secret());
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        Ok(request.send().await?)
    }

    /// Map status and envelope to a typed result.
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> ApiResult<T> {
        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let bytes = response.bytes().await?;

        if status.is_success() {
            let envelope: ApiResponse<T> = serde_json::from_slice(&bytes)?;
            return envelope.into_result();
        }

        let message = serde_json::from_slice::<ApiResponse<serde_json::Value>>(&bytes)
            .ok()
            .and_then(|envelope| envelope.message)
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });

        Err(match status.as_u16() {
            401 | 403 => ApiError::Unauthorized,
            404 => ApiError::NotFound,
            429 => ApiError::RateLimited(retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS)),
            400..=499 => ApiError::Validation(message),
            code => ApiError::Server {
                status: code,
                message,
            },
        })
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// `stale` is the token that was rejected; if the session already holds
    /// a different one, another request refreshed first and nothing is sent.
    /// A failed refresh clears the session.
    async fn refresh_session(&self, stale: Option<&str>) -> ApiResult<()> {
        let _lock = self.inner.refresh_lock.lock().await;

        let Some(session) = self.inner.session.get() else {
            return Err(ApiError::Unauthorized);
        };
        if stale.is_some_and(|stale| stale != session.token) {
            return Ok(());
        }
        let Some(refresh_token) = session.refresh_token else {
            warn!("Session has no refresh token, signing out");
            self.inner.session.clear();
            return Err(ApiError::Unauthorized);
        };

        let url = self.url(&["auth", "refresh"])?;
        let body = serde_json::to_value(RefreshRequest {
            refresh_token: &refresh_token,
        })?;
        let result = match self
            .execute(&Method::POST, &url, Some(&body), Auth::Public, None)
            .await
        {
            Ok(response) => Self::decode::<RefreshResponse>(response).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(refreshed) => {
                self.inner.session.apply_refresh(refreshed);
                info!("Access token refreshed");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Token refresh failed, signing out");
                self.inner.session.clear();
                Err(ApiError::Unauthorized)
            }
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    #[instrument(skip(self))]
    async fn list_products(&self) -> ApiResult<Vec<Product>> {
        let url = self.url(&["products"])?;
        self.get(url, Auth::Public).await
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn get_product(&self, id: &ProductId) -> ApiResult<Product> {
        let url = self.url(&["products", id.as_str()])?;
        self.get(url, Auth::Public).await
    }

    #[instrument(skip(self, request), fields(phone = %request.phone))]
    async fn login(&self, request: &LoginRequest) -> ApiResult<LoginResponse> {
        let url = self.url(&["auth", "login"])?;
        self.write(Method::POST, url, Some(request), Auth::Public)
            .await
    }

    #[instrument(skip(self), fields(phone = %phone))]
    async fn get_profile(&self, phone: &Phone) -> ApiResult<Profile> {
        let url = self.url(&["auth", "profile", phone.as_str()])?;
        self.get(url, Auth::User).await
    }

    #[instrument(skip(self, update), fields(phone = %phone))]
    async fn update_profile(&self, phone: &Phone, update: &ProfileUpdate) -> ApiResult<Profile> {
        let url = self.url(&["auth", "profile", phone.as_str()])?;
        self.write(Method::PUT, url, Some(update), Auth::User).await
    }

    #[instrument(skip(self), fields(phone = %phone))]
    async fn list_addresses(&self, phone: &Phone) -> ApiResult<AddressBook> {
        let url = self.url(&["auth", "addresses", phone.as_str()])?;
        self.get(url, Auth::User).await
    }

    #[instrument(skip(self, fields), fields(phone = %phone))]
    async fn create_address(
        &self,
        phone: &Phone,
        fields: &AddressFields,
        default: bool,
    ) -> ApiResult<AddressBook> {
        let url = self.url(&["auth", "addresses", phone.as_str()])?;
        let body = AddressPayload { fields, default };
        self.write(Method::POST, url, Some(&body), Auth::User).await
    }

    #[instrument(skip(self, fields), fields(phone = %phone, address_id = %id))]
    async fn update_address(
        &self,
        phone: &Phone,
        id: &AddressId,
        fields: &AddressFields,
        default: bool,
    ) -> ApiResult<AddressBook> {
        let url = self.url(&["auth", "addresses", phone.as_str(), id.as_str()])?;
        let body = AddressPayload { fields, default };
        self.write(Method::PUT, url, Some(&body), Auth::User).await
    }

    #[instrument(skip(self), fields(phone = %phone, address_id = %id))]
    async fn delete_address(&self, phone: &Phone, id: &AddressId) -> ApiResult<AddressBook> {
        let url = self.url(&["auth", "addresses", phone.as_str(), id.as_str()])?;
        self.write(Method::DELETE, url, None::<&()>, Auth::User)
            .await
    }

    #[instrument(skip(self, item), fields(phone = %phone, product_id = %item.product_id, quantity = item.quantity))]
    async fn upsert_cart_item(&self, phone: &Phone, item: &CartItem) -> ApiResult<Cart> {
        let url = self.url(&["auth", "cart", phone.as_str()])?;
        self.write(Method::POST, url, Some(item), Auth::User).await
    }

    #[instrument(skip(self), fields(phone = %phone, product_id = %id))]
    async fn remove_cart_item(&self, phone: &Phone, id: &ProductId) -> ApiResult<Cart> {
        let url = self.url(&["auth", "cart", phone.as_str(), id.as_str()])?;
        self.write(Method::DELETE, url, None::<&()>, Auth::User)
            .await
    }

    #[instrument(skip(self), fields(phone = %phone))]
    async fn clear_cart(&self, phone: &Phone) -> ApiResult<Cart> {
        let url = self.url(&["auth", "cart", phone.as_str()])?;
        self.write(Method::DELETE, url, None::<&()>, Auth::User)
            .await
    }

    #[instrument(skip(self), fields(phone = %phone, product_id = %id))]
    async fn add_to_wishlist(&self, phone: &Phone, id: &ProductId) -> ApiResult<Wishlist> {
        let url = self.url(&["auth", "wishlist", phone.as_str()])?;
        let body = WishlistPayload { product_id: id };
        self.write(Method::POST, url, Some(&body), Auth::User).await
    }

    #[instrument(skip(self), fields(phone = %phone, product_id = %id))]
    async fn remove_from_wishlist(&self, phone: &Phone, id: &ProductId) -> ApiResult<Wishlist> {
        let url = self.url(&["auth", "wishlist", phone.as_str(), id.as_str()])?;
        self.write(Method::DELETE, url, None::<&()>, Auth::User)
            .await
    }

    #[instrument(skip(self, request), fields(phone = %phone, items = request.items.len()))]
    async fn place_order(&self, phone: &Phone, request: &OrderRequest) -> ApiResult<Order> {
        let url = self.url(&["auth", "orders", phone.as_str()])?;
        self.write(Method::POST, url, Some(request), Auth::User)
            .await
    }

    #[instrument(skip(self), fields(phone = %phone))]
    async fn list_orders(&self, phone: &Phone) -> ApiResult<Vec<Order>> {
        let url = self.url(&["auth", "orders", phone.as_str()])?;
        self.get(url, Auth::User).await
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    async fn admin_create_product(&self, input: &ProductInput) -> ApiResult<Product> {
        let url = self.url(&["admin", "products"])?;
        self.write(Method::POST, url, Some(input), Auth::Admin)
            .await
    }

    #[instrument(skip(self, input), fields(product_id = %id))]
    async fn admin_update_product(
        &self,
        id: &ProductId,
        input: &ProductInput,
    ) -> ApiResult<Product> {
        let url = self.url(&["admin", "products", id.as_str()])?;
        self.write(Method::PUT, url, Some(input), Auth::Admin)
            .await
    }

    #[instrument(skip(self), fields(product_id = %id))]
    async fn admin_delete_product(&self, id: &ProductId) -> ApiResult<()> {
        let url = self.url(&["admin", "products", id.as_str()])?;
        self.write(Method::DELETE, url, None::<&()>, Auth::Admin)
            .await
    }

    #[instrument(skip(self))]
    async fn admin_list_orders(&self) -> ApiResult<Vec<Order>> {
        let url = self.url(&["admin", "orders"])?;
        self.get(url, Auth::Admin).await
    }

    #[instrument(skip(self), fields(order_id = %id, status = %status))]
    async fn admin_update_order_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
    ) -> ApiResult<Order> {
        let url = self.url(&["admin", "orders", id.as_str(), "status"])?;
        self.write(Method::PUT, url, Some(&StatusPayload { status }), Auth::Admin)
            .await
    }

    #[instrument(skip(self))]
    async fn admin_list_users(&self) -> ApiResult<Vec<UserSummary>> {
        let url = self.url(&["admin", "users"])?;
        self.get(url, Auth::Admin).await
    }
}
