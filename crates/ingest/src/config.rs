//! Ingestion configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ORDERHUB_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `SHOPEE_BASE_URL` / `SHOPEE_API_TOKEN` - Shopee order API endpoint and token
//! - `LAZADA_BASE_URL` / `LAZADA_API_TOKEN` - Lazada order API endpoint and token
//! - `TIKTOK_BASE_URL` / `TIKTOK_API_TOKEN` - TikTok Shop order API endpoint and token
//!
//! ## Optional (per platform, `SHOPEE_`/`LAZADA_`/`TIKTOK_` prefix)
//! - `{P}_PAGE_SIZE` - Records requested per page (default: 100)
//! - `{P}_MAX_ATTEMPTS` - Attempts per page fetch before giving up (default: 3)
//! - `{P}_RETRY_BASE_MS` - Base backoff between attempts, doubled each retry (default: 500)
//! - `{P}_TIMEOUT_SECS` - Per-request timeout (default: 30)
//! - `{P}_SOURCE` - Sales channel tag stamped on ingested orders
//!
//! ## Optional (global)
//! - `INGEST_BUFFER_CAPACITY` - Records buffered per platform before a flush (default: 500)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Sentry error sample rate (default: 1.0)
//!
//! The remaining platform differences (auth header, success code, date query
//! parameter) are API dialect, not deployment choices, so they are fixed per
//! platform here rather than read from the environment.

use std::time::Duration;

use orderhub_core::Platform;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_PAGE_SIZE: &str = "100";
const DEFAULT_MAX_ATTEMPTS: &str = "3";
const DEFAULT_RETRY_BASE_MS: &str = "500";
const DEFAULT_TIMEOUT_SECS: &str = "30";
const DEFAULT_BUFFER_CAPACITY: &str = "500";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// How the API token is presented to a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
    /// `Authorization: Bearer <token>`-style header value.
    Bearer,
    /// The raw token is the header value.
    Raw,
}

/// Everything the client needs to talk to one platform.
///
/// One client implementation serves all platforms; the differences live
/// entirely in this profile. Implements `Debug` manually to redact the token.
#[derive(Clone)]
pub struct PlatformProfile {
    pub platform: Platform,
    /// Order API endpoint, e.g. `https://partner.shopeemobile.com/api/orders`.
    pub base_url: Url,
    /// Header the token is sent in.
    pub auth_header: &'static str,
    pub auth_scheme: AuthScheme,
    pub api_token: SecretString,
    /// Envelope code the platform uses for success (`0` on TikTok Shop,
    /// `200` elsewhere).
    pub success_code: i64,
    /// Query parameter carrying the order date (`filter-date` on Lazada,
    /// `date` elsewhere).
    pub date_param: &'static str,
    pub page_size: u32,
    /// Attempts per page fetch, including the first.
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub request_timeout: Duration,
    /// Sales channel tag stamped on every ingested order, when set.
    pub source: Option<String>,
}

impl std::fmt::Debug for PlatformProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformProfile")
            .field("platform", &self.platform)
            .field("base_url", &self.base_url.as_str())
            .field("auth_header", &self.auth_header)
            .field("api_token", &"[REDACTED]")
            .field("success_code", &self.success_code)
            .field("date_param", &self.date_param)
            .field("page_size", &self.page_size)
            .field("max_attempts", &self.max_attempts)
            .field("backoff_base", &self.backoff_base)
            .field("request_timeout", &self.request_timeout)
            .field("source", &self.source)
            .finish()
    }
}

/// Fixed API dialect of one platform.
struct Dialect {
    auth_header: &'static str,
    auth_scheme: AuthScheme,
    success_code: i64,
    date_param: &'static str,
}

const fn dialect(platform: Platform) -> Dialect {
    match platform {
        Platform::Shopee => Dialect {
            auth_header: "authorization",
            auth_scheme: AuthScheme::Bearer,
            success_code: 200,
            date_param: "date",
        },
        Platform::Lazada => Dialect {
            auth_header: "x-api-key",
            auth_scheme: AuthScheme::Raw,
            success_code: 200,
            date_param: "filter-date",
        },
        Platform::TiktokShop => Dialect {
            auth_header: "authorization",
            auth_scheme: AuthScheme::Bearer,
            success_code: 0,
            date_param: "date",
        },
    }
}

impl PlatformProfile {
    /// Load the profile for one platform from `{PREFIX}_*` variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a required variable is missing, the base URL
    /// does not parse, or a numeric variable is zero or malformed.
    pub fn from_env(platform: Platform) -> Result<Self, ConfigError> {
        let prefix = platform.env_prefix();
        let base_url_key = format!("{prefix}_BASE_URL");
        let base_url = Url::parse(&get_required_env(&base_url_key)?)
            .map_err(|e| ConfigError::InvalidEnvVar(base_url_key, e.to_string()))?;
        let api_token = get_required_secret(&format!("{prefix}_API_TOKEN"))?;

        let page_size_key = format!("{prefix}_PAGE_SIZE");
        let page_size = parse_positive(
            &page_size_key,
            &get_env_or_default(&page_size_key, DEFAULT_PAGE_SIZE),
        )?;
        let max_attempts_key = format!("{prefix}_MAX_ATTEMPTS");
        let max_attempts = parse_positive(
            &max_attempts_key,
            &get_env_or_default(&max_attempts_key, DEFAULT_MAX_ATTEMPTS),
        )?;
        let backoff_key = format!("{prefix}_RETRY_BASE_MS");
        let backoff_base = Duration::from_millis(parse_positive(
            &backoff_key,
            &get_env_or_default(&backoff_key, DEFAULT_RETRY_BASE_MS),
        )?);
        let timeout_key = format!("{prefix}_TIMEOUT_SECS");
        let request_timeout = Duration::from_secs(parse_positive(
            &timeout_key,
            &get_env_or_default(&timeout_key, DEFAULT_TIMEOUT_SECS),
        )?);
        let source = get_optional_env(&format!("{prefix}_SOURCE"));

        let dialect = dialect(platform);
        Ok(Self {
            platform,
            base_url,
            auth_header: dialect.auth_header,
            auth_scheme: dialect.auth_scheme,
            api_token,
            success_code: dialect.success_code,
            date_param: dialect.date_param,
            page_size: u32::try_from(page_size)
                .map_err(|e| ConfigError::InvalidEnvVar(page_size_key, e.to_string()))?,
            max_attempts: u32::try_from(max_attempts)
                .map_err(|e| ConfigError::InvalidEnvVar(max_attempts_key, e.to_string()))?,
            backoff_base,
            request_timeout,
            source,
        })
    }
}

/// Ingestion pipeline configuration.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// Records buffered per platform before a flush is triggered
    pub buffer_capacity: usize,
    pub shopee: PlatformProfile,
    pub lazada: PlatformProfile,
    pub tiktok: PlatformProfile,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
}

impl IngestConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("ORDERHUB_DATABASE_URL")?;
        let buffer_capacity = usize::try_from(parse_positive(
            "INGEST_BUFFER_CAPACITY",
            &get_env_or_default("INGEST_BUFFER_CAPACITY", DEFAULT_BUFFER_CAPACITY),
        )?)
        .map_err(|e| {
            ConfigError::InvalidEnvVar("INGEST_BUFFER_CAPACITY".to_owned(), e.to_string())
        })?;

        let shopee = PlatformProfile::from_env(Platform::Shopee)?;
        let lazada = PlatformProfile::from_env(Platform::Lazada)?;
        let tiktok = PlatformProfile::from_env(Platform::TiktokShop)?;

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            database_url,
            buffer_capacity,
            shopee,
            lazada,
            tiktok,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
        })
    }

    /// The profile for one platform.
    #[must_use]
    pub const fn profile(&self, platform: Platform) -> &PlatformProfile {
        match platform {
            Platform::Shopee => &self.shopee,
            Platform::Lazada => &self.lazada,
            Platform::TiktokShop => &self.tiktok,
        }
    }

    /// All profiles, in pipeline launch order.
    #[must_use]
    pub const fn profiles(&self) -> [&PlatformProfile; 3] {
        [&self.shopee, &self.lazada, &self.tiktok]
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_owned()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL` (set by managed
/// postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_owned()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Parse a numeric variable that must be at least one.
fn parse_positive(key: &str, value: &str) -> Result<u64, ConfigError> {
    let parsed: u64 = value
        .parse()
        .map_err(|_| ConfigError::InvalidEnvVar(key.to_owned(), format!("not a number: {value}")))?;
    if parsed == 0 {
        return Err(ConfigError::InvalidEnvVar(
            key.to_owned(),
            "must be at least 1".to_owned(),
        ));
    }
    Ok(parsed)
}
