//! Wire types for the storefront REST API.

use chrono::{DateTime, Utc};
use pantry_core::{AddressFields, OrderStatus, Phone, ProductId, Profile, Role};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::error::{ApiError, ApiResult};

// =============================================================================
// Envelope
// =============================================================================

/// Uniform `{ success, data, message }` result.
///
/// The server wraps every body in this shape, and the client converts every
/// [`ApiResult`] back into it at its outer boundary (CLI output, logs).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    #[must_use]
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

impl<T: DeserializeOwned> ApiResponse<T> {
    /// Unwrap a server envelope into a typed result.
    ///
    /// A successful envelope without `data` is accepted only when `T` can be
    /// built from `null` (e.g. `()` or `Option<_>`).
    ///
    /// # Errors
    ///
    /// `success: false` becomes [`ApiError::Validation`] with the server's
    /// message; a missing payload becomes [`ApiError::Parse`].
    pub fn into_result(self) -> ApiResult<T> {
        if !self.success {
            return Err(ApiError::Validation(
                self.message
                    .unwrap_or_else(|| "request was rejected".to_string()),
            ));
        }
        match self.data {
            Some(data) => Ok(data),
            None => serde_json::from_value(serde_json::Value::Null)
                .map_err(|_| ApiError::Parse("response has no data".to_string())),
        }
    }
}

impl<T> From<ApiResult<T>> for ApiResponse<T> {
    fn from(result: ApiResult<T>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::failure(err.user_message()),
        }
    }
}

// =============================================================================
// Authentication
// =============================================================================

/// Credential exchanged for a session at `POST /auth/login`.
///
/// `id_token` is the identity provider's proof of phone ownership.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub phone: Phone,
    pub id_token: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("phone", &self.phone)
            .field("id_token", &"[REDACTED]")
            .finish()
    }
}

/// `POST /auth/login` payload.
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(alias = "user")]
    pub profile: Profile,
}

impl std::fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginResponse")
            .field("token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_at", &self.expires_at)
            .field("profile", &self.profile.phone)
            .finish()
    }
}

/// Body of `POST /auth/refresh`.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

/// `POST /auth/refresh` payload.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// The signed-in session, persisted under `auth-session`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub phone: Phone,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    /// Build a session from a login response.
    #[must_use]
    pub fn from_login(response: &LoginResponse) -> Self {
        Self {
            token: response.token.clone(),
            refresh_token: response.refresh_token.clone(),
            phone: response.profile.phone.clone(),
            role: response.profile.role,
            expires_at: response.expires_at,
        }
    }

    /// Apply a refreshed token pair.
    pub fn refresh(&mut self, response: RefreshResponse) {
        self.token = response.token;
        if response.refresh_token.is_some() {
            self.refresh_token = response.refresh_token;
        }
        self.expires_at = response.expires_at;
    }

    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("phone", &self.phone)
            .field("role", &self.role)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

// =============================================================================
// Request bodies
// =============================================================================

/// Body of `POST /auth/addresses/:phone` and `PUT /auth/addresses/:phone/:id`.
#[derive(Debug, Clone, Serialize)]
pub struct AddressPayload<'a> {
    #[serde(flatten)]
    pub fields: &'a AddressFields,
    pub default: bool,
}

/// Body of `POST /auth/wishlist/:phone`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistPayload<'a> {
    pub product_id: &'a ProductId,
}

/// Body of `PUT /admin/orders/:id/status`.
#[derive(Debug, Serialize)]
pub struct StatusPayload {
    pub status: OrderStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_success() {
        let envelope: ApiResponse<Vec<u32>> =
            serde_json::from_str(r#"{"success": true, "data": [1, 2]}"#).expect("deserialize");
        assert_eq!(envelope.into_result(), Ok(vec![1, 2]));
    }

    #[test]
    fn test_envelope_failure_keeps_message() {
        let envelope: ApiResponse<Vec<u32>> =
            serde_json::from_str(r#"{"success": false, "message": "Out of stock"}"#)
                .expect("deserialize");
        assert_eq!(
            envelope.into_result(),
            Err(ApiError::Validation("Out of stock".to_string()))
        );
    }

    #[test]
    fn test_envelope_unit_without_data() {
        let envelope: ApiResponse<()> =
            serde_json::from_str(r#"{"success": true, "message": "deleted"}"#).expect("deserialize");
        assert_eq!(envelope.into_result(), Ok(()));
    }

    #[test]
    fn test_envelope_missing_data_is_parse_error() {
        let envelope: ApiResponse<Vec<u32>> =
            serde_json::from_str(r#"{"success": true}"#).expect("deserialize");
        assert!(matches!(envelope.into_result(), Err(ApiError::Parse(_))));
    }

    #[test]
    fn test_result_to_envelope() {
        let ok: ApiResponse<u32> = Ok::<u32, ApiError>(7).into();
        assert_eq!(
            serde_json::to_value(&ok).expect("serialize"),
            serde_json::json!({"success": true, "data": 7})
        );

        let err: ApiResponse<u32> = Err::<u32, _>(ApiError::Validation("bad pincode".into())).into();
        assert_eq!(
            serde_json::to_value(&err).expect("serialize"),
            serde_json::json!({"success": false, "message": "bad pincode"})
        );
    }

    #[test]
    fn test_session_debug_redacts_tokens() {
        let session = AuthSession {
            token: "secret-access".to_string(),
            refresh_token: Some("secret-refresh".to_string()),
            phone: Phone::parse("9876543210").expect("phone"),
            role: Role::Customer,
            expires_at: None,
        };
        let debug_output = format!("{session:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("secret-access"));
        assert!(!debug_output.contains("secret-refresh"));
    }

    #[test]
    fn test_refresh_keeps_refresh_token_when_absent() {
        let mut session = AuthSession {
            token: "old".to_string(),
            refresh_token: Some("r1".to_string()),
            phone: Phone::parse("9876543210").expect("phone"),
            role: Role::Admin,
            expires_at: None,
        };
        session.refresh(RefreshResponse {
            token: "new".to_string(),
            refresh_token: None,
            expires_at: None,
        });
        assert_eq!(session.token, "new");
        assert_eq!(session.refresh_token.as_deref(), Some("r1"));
        assert!(session.is_admin());
    }
}
