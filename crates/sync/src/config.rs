//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `PANTRY_API_URL` - Base URL of the storefront REST API
//!
//! ## Optional
//! - `PANTRY_ADMIN_KEY` - Key sent in the `x-admin-key` header on admin routes
//! - `PANTRY_DATA_DIR` - Directory for persisted collections (default: .pantry)
//! - `PANTRY_STORAGE_NAMESPACE` - Prefix for persisted keys (default: pantry)
//! - `PANTRY_REQUEST_TIMEOUT_SECS` - Per-request timeout (default: 10)
//! - `PANTRY_READ_ATTEMPTS` - Attempts for idempotent reads (default: 3)
//! - `PANTRY_RETRY_BASE_MS` - First backoff delay (default: 200)
//! - `PANTRY_CATALOG_TTL_SECS` - Product cache lifetime (default: 300)
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_ADMIN_KEY_LENGTH: usize = 24;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront client configuration.
#[derive(Clone)]
pub struct SyncConfig {
    /// API base URL, always ending in `/`
    pub api_url: Url,
    /// Admin route key
    pub admin_key: Option<SecretString>,
    /// Where `FileStorage` keeps collection snapshots
    pub data_dir: PathBuf,
    /// Prefix for persisted keys
    pub namespace: String,
    /// Timeout applied to every request
    pub request_timeout: Duration,
    /// Total attempts for idempotent reads (1 disables retries)
    pub read_attempts: u32,
    /// Delay before the first retry; doubled for each further attempt
    pub retry_base: Duration,
    /// Product cache time-to-live
    pub catalog_ttl: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("api_url", &self.api_url.as_str())
            .field("admin_key", &self.admin_key.as_ref().map(|_| "[REDACTED]"))
            .field("data_dir", &self.data_dir)
            .field("namespace", &self.namespace)
            .field("request_timeout", &self.request_timeout)
            .field("read_attempts", &self.read_attempts)
            .field("retry_base", &self.retry_base)
            .field("catalog_ttl", &self.catalog_ttl)
            .field("sentry_dsn", &self.sentry_dsn)
            .finish()
    }
}

impl SyncConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the admin key fails validation (length, placeholder, entropy).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`SyncConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let api_url = parse_base_url(&env.required("PANTRY_API_URL")?)?;
        let admin_key = env
            .optional("PANTRY_ADMIN_KEY")
            .map(|key| validate_admin_key(key, "PANTRY_ADMIN_KEY"))
            .transpose()?;

        Ok(Self {
            api_url,
            admin_key,
            data_dir: PathBuf::from(env.or_default("PANTRY_DATA_DIR", ".pantry")),
            namespace: env.or_default("PANTRY_STORAGE_NAMESPACE", "pantry"),
            request_timeout: Duration::from_secs(env.parsed("PANTRY_REQUEST_TIMEOUT_SECS", 10)?),
            read_attempts: env.parsed::<u32>("PANTRY_READ_ATTEMPTS", 3)?.max(1),
            retry_base: Duration::from_millis(env.parsed("PANTRY_RETRY_BASE_MS", 200)?),
            catalog_ttl: Duration::from_secs(env.parsed("PANTRY_CATALOG_TTL_SECS", 300)?),
            sentry_dsn: env.optional("SENTRY_DSN"),
        })
    }

    /// Configuration with defaults for everything but the API URL.
    #[must_use]
    pub fn with_api_url(api_url: Url) -> Self {
        Self {
            api_url: normalize_base_url(api_url),
            admin_key: None,
            data_dir: PathBuf::from(".pantry"),
            namespace: "pantry".to_string(),
            request_timeout: Duration::from_secs(10),
            read_attempts: 3,
            retry_base: Duration::from_millis(200),
            catalog_ttl: Duration::from_secs(300),
            sentry_dsn: None,
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

struct Env<'a, F: Fn(&str) -> Option<String>>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get an optional variable, treating blank values as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parsed<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }
}

/// Parse the API base URL, ensuring a trailing slash so relative joins keep
/// any path prefix (e.g. `/api/`).
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidEnvVar("PANTRY_API_URL".to_string(), e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "PANTRY_API_URL".to_string(),
            format!("unsupported scheme {}", url.scheme()),
        ));
    }
    Ok(normalize_base_url(url))
}

fn normalize_base_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Reject short, placeholder or low-entropy admin keys.
fn validate_admin_key(key: String, var_name: &str) -> Result<SecretString, ConfigError> {
    let secret = SecretString::from(key);
    let value = secret.expose_secret();

    if value.len() < MIN_ADMIN_KEY_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {MIN_ADMIN_KEY_LENGTH} characters (got {})",
                value.len()
            ),
        ));
    }

    let lower = value.to_lowercase();
    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(value);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated key."
            ),
        ));
    }

    Ok(secret)
}
