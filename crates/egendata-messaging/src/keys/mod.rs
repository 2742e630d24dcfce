//! Key resolution: turn a `kid` into the public key it names.
//!
//! The resolver owns the contract (validation, error normalization, bulk
//! keying). Fetching is delegated to a [`KeySource`]: [`HttpKeySource`] for
//! dereferenceable kids, [`StaticKeySource`] for pinned keys.
//!
//! Nothing here caches, retries or times out on its own. Wrap the source if
//! you need any of that.

mod http;
mod memory;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::MessagingConfig;
use crate::error::{MessagingError, MessagingResult};
use crate::jose::Jwk;
use crate::schema;

pub use http::HttpKeySource;
pub use memory::StaticKeySource;

/// Transport-level key fetch failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyFetchError {
    #[error("invalid key uri: {0}")]
    InvalidUri(String),

    #[error("request failed: {0}")]
    Transport(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("key document too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },

    #[error("invalid key document: {0}")]
    Body(String),

    #[error("unknown key")]
    NotFound,
}

/// Where key documents come from.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Fetch the JSON document published under `kid`.
    async fn fetch(&self, kid: &str) -> Result<Value, KeyFetchError>;
}

/// Resolves key identifiers through a [`KeySource`].
#[derive(Clone)]
pub struct KeyResolver {
    source: Arc<dyn KeySource>,
}

impl fmt::Debug for KeyResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyResolver").finish_non_exhaustive()
    }
}

impl KeyResolver {
    pub fn new(source: impl KeySource + 'static) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    pub fn from_source(source: Arc<dyn KeySource>) -> Self {
        Self { source }
    }

    /// Resolver fetching kids over HTTP.
    pub fn http(config: &MessagingConfig) -> MessagingResult<Self> {
        let source = HttpKeySource::new(config).map_err(|e| MessagingError::Config {
            message: format!("failed to create key client: {e}"),
        })?;
        Ok(Self::new(source))
    }

    /// Fetch and check the key behind `kid`.
    ///
    /// A `null` document yields `Ok(None)`. Transport failures and documents
    /// that are not a public RSA key yield [`MessagingError::KeyNotFound`].
    /// Members beyond the ones a message key carries, such as `alg`, are
    /// accepted and dropped.
    pub async fn lookup(&self, kid: &str) -> MessagingResult<Option<Jwk>> {
        let document = self.source.fetch(kid).await.map_err(|e| {
            warn!(kid = %kid, error = %e, "key fetch failed");
            not_found(kid, e.to_string())
        })?;

        if document.is_null() {
            debug!(kid = %kid, "empty key document");
            return Ok(None);
        }

        if let Err(violations) = schema::validate_published_jwk(&document) {
            let reason = violations
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            warn!(kid = %kid, reason = %reason, "malformed key document");
            return Err(not_found(kid, format!("malformed key: {reason}")));
        }

        serde_json::from_value(document)
            .map(Some)
            .map_err(|e| not_found(kid, format!("malformed key: {e}")))
    }

    /// Resolve `kid` to a key; an empty document is an error.
    pub async fn resolve(&self, kid: &str) -> MessagingResult<Jwk> {
        self.lookup(kid)
            .await?
            .ok_or_else(|| not_found(kid, "empty key document".to_string()))
    }

    /// Resolve every kid, in order, stopping at the first failure.
    ///
    /// The map is keyed by each returned key's own `kid`, which may differ
    /// from the identifier it was requested under. Keys published without a
    /// `kid` are keyed by the requested identifier.
    pub async fn resolve_many<I, S>(&self, kids: I) -> MessagingResult<HashMap<String, Jwk>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut keys = HashMap::new();
        for kid in kids {
            let requested = kid.as_ref();
            let key = self.resolve(requested).await?;
            let id = key.kid.clone().unwrap_or_else(|| requested.to_string());
            keys.insert(id, key);
        }
        Ok(keys)
    }
}

fn not_found(kid: &str, reason: String) -> MessagingError {
    MessagingError::KeyNotFound {
        kid: kid.to_string(),
        reason,
    }
}
