//! Remote call failures.

use thiserror::Error;

/// Errors that can occur when talking to the storefront API.
///
/// Every failure mode of a remote call ends up here: transport problems,
/// non-2xx statuses, `success: false` envelopes and bodies that do not
/// parse. The enum is `Clone` so a single failure can be handed to the
/// caller and to the notifier.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Request exceeded the configured timeout.
    #[error("request timed out")]
    Timeout,

    /// Connection-level failure (DNS, refused, reset, TLS).
    #[error("network error: {0}")]
    Transport(String),

    /// Session missing, expired or rejected after a refresh attempt.
    #[error("sign-in required")]
    Unauthorized,

    /// Client-side rejection with the server's message (other 4xx, or a
    /// `success: false` envelope).
    #[error("{0}")]
    Validation(String),

    /// Server-side failure (5xx).
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Rate limited by the server.
    #[error("rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Resource not found.
    #[error("not found")]
    NotFound,

    /// Response body was not the expected JSON.
    #[error("malformed response: {0}")]
    Parse(String),

    /// Admin route called without a configured admin key.
    #[error("admin key not configured")]
    MissingAdminKey,

    /// A per-user route was called with no session.
    #[error("not signed in")]
    NotSignedIn,
}

impl ApiError {
    /// Whether a read may be retried after this error.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::Transport(_) | Self::Server { .. } | Self::RateLimited(_)
        )
    }

    /// Whether this failure should be reported to error tracking.
    #[must_use]
    pub const fn is_server_fault(&self) -> bool {
        matches!(self, Self::Server { .. } | Self::Parse(_))
    }

    /// Text suitable for showing to a shopper.
    ///
    /// Validation messages are shown verbatim; server faults are generic.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Server { .. } | Self::Parse(_) => {
                "Something went wrong. Please try again.".to_string()
            }
            Self::Timeout | Self::Transport(_) => {
                "Could not reach the store. Check your connection.".to_string()
            }
            Self::Unauthorized | Self::NotSignedIn => "Please sign in again.".to_string(),
            Self::RateLimited(_) => "Too many requests. Please wait a moment.".to_string(),
            Self::NotFound => "Not found.".to_string(),
            Self::MissingAdminKey => "Admin access is not configured.".to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Result of a remote call.
pub type ApiResult<T> = Result<T, ApiError>;
