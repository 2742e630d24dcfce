//! Messaging configuration: key fetch limits, clock leeway and token lifetime.
//!
//! Values come from [`MessagingConfig::default`], the `EGENDATA_*` environment
//! variables read by [`MessagingConfig::from_env`], or the `with_*` builders.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default cap on a fetched key document (64 KiB).
const DEFAULT_MAX_KEY_BYTES: u64 = 64 * 1024;

/// Default clock skew tolerated when checking `exp`.
const DEFAULT_CLOCK_LEEWAY_SECS: u64 = 60;

/// Validity window stamped on issued tokens (`exp = iat + ttl`).
const DEFAULT_TOKEN_TTL_SECS: u64 = 3600;

/// Messaging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagingConfig {
    /// Timeout for a single key fetch. `None` leaves cancellation to the caller.
    #[serde(default)]
    pub key_fetch_timeout_secs: Option<u64>,

    /// Maximum accepted size of a fetched key document.
    #[serde(default = "default_max_key_bytes")]
    pub max_key_bytes: u64,

    /// Clock skew tolerated when checking `exp`.
    #[serde(default = "default_clock_leeway")]
    pub clock_leeway_secs: u64,

    /// Validity window of issued tokens.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,

    /// User agent sent when fetching keys.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_max_key_bytes() -> u64 {
    DEFAULT_MAX_KEY_BYTES
}

fn default_clock_leeway() -> u64 {
    DEFAULT_CLOCK_LEEWAY_SECS
}

fn default_token_ttl() -> u64 {
    DEFAULT_TOKEN_TTL_SECS
}

fn default_user_agent() -> String {
    format!("egendata-messaging/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            key_fetch_timeout_secs: None,
            max_key_bytes: default_max_key_bytes(),
            clock_leeway_secs: default_clock_leeway(),
            token_ttl_secs: default_token_ttl(),
            user_agent: default_user_agent(),
        }
    }
}

impl MessagingConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `EGENDATA_KEY_FETCH_TIMEOUT_SECS` | Key fetch timeout (unset = none) |
    /// | `EGENDATA_MAX_KEY_BYTES` | Max key document size |
    /// | `EGENDATA_CLOCK_LEEWAY_SECS` | Clock skew for `exp` |
    /// | `EGENDATA_TOKEN_TTL_SECS` | Validity window of issued tokens |
    ///
    /// Unparseable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self {
            key_fetch_timeout_secs: env_u64("EGENDATA_KEY_FETCH_TIMEOUT_SECS"),
            max_key_bytes: env_u64("EGENDATA_MAX_KEY_BYTES").unwrap_or_else(default_max_key_bytes),
            clock_leeway_secs: env_u64("EGENDATA_CLOCK_LEEWAY_SECS")
                .unwrap_or_else(default_clock_leeway),
            token_ttl_secs: env_u64("EGENDATA_TOKEN_TTL_SECS").unwrap_or_else(default_token_ttl),
            user_agent: default_user_agent(),
        }
    }

    /// Set the key fetch timeout.
    pub fn with_key_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.key_fetch_timeout_secs = Some(timeout.as_secs());
        self
    }

    /// Set the maximum key document size.
    pub fn with_max_key_bytes(mut self, max: u64) -> Self {
        self.max_key_bytes = max;
        self
    }

    /// Set the clock leeway.
    pub fn with_clock_leeway(mut self, leeway: Duration) -> Self {
        self.clock_leeway_secs = leeway.as_secs();
        self
    }

    /// Set the validity window of issued tokens.
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl_secs = ttl.as_secs();
        self
    }

    pub fn key_fetch_timeout(&self) -> Option<Duration> {
        self.key_fetch_timeout_secs.map(Duration::from_secs)
    }

    pub fn clock_leeway(&self) -> Duration {
        Duration::from_secs(self.clock_leeway_secs)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::from_secs(self.token_ttl_secs)
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
