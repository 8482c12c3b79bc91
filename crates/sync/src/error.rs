//! Errors surfaced by the sync layer.

use pantry_core::DomainError;
use thiserror::Error;

use crate::api::{ApiError, ApiResponse};
use crate::config::ConfigError;
use crate::persist::StorageError;

/// Why a storefront operation did not complete.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Rejected locally before any state changed.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The remote call failed; local state has been rolled back.
    #[error(transparent)]
    Remote(#[from] ApiError),

    /// Operation needs a signed-in user.
    #[error("not signed in")]
    NotSignedIn,

    /// Operation needs the admin role.
    #[error("admin role required")]
    Forbidden,

    /// The collection's command lane is not running (not initialized, or
    /// already torn down).
    #[error("{0} sync is not running")]
    Closed(&'static str),

    /// The command was dropped before it produced a result.
    #[error("operation was abandoned before completing")]
    Cancelled,

    /// Local persistence failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SyncError {
    /// Text suitable for showing to a shopper.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Remote(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}

impl<T> From<Result<T, SyncError>> for ApiResponse<T> {
    fn from(result: Result<T, SyncError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::failure(err.user_message()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_hides_server_detail() {
        let result: Result<(), SyncError> = Err(SyncError::Remote(ApiError::Server {
            status: 500,
            message: "stack trace".to_string(),
        }));
        let response = ApiResponse::from(result);
        assert!(!response.success);
        assert!(!response.message.unwrap_or_default().contains("stack trace"));
    }

    #[test]
    fn test_envelope_keeps_local_reason() {
        let result: Result<(), SyncError> = Err(DomainError::EmptyCart.into());
        assert_eq!(
            ApiResponse::from(result).message.as_deref(),
            Some("cart is empty")
        );
        assert_eq!(ApiResponse::from(Ok::<_, SyncError>(3)).data, Some(3));
    }
}
