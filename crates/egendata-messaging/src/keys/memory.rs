//! In-memory key transport for pinned keys.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use super::{KeyFetchError, KeySource};
use crate::jose::{Jwk, Jwks};

/// Serves a fixed set of keys by kid.
#[derive(Debug, Clone, Default)]
pub struct StaticKeySource {
    keys: HashMap<String, Jwk>,
}

impl StaticKeySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin `key` under `kid`.
    pub fn insert(&mut self, kid: impl Into<String>, key: Jwk) {
        self.keys.insert(kid.into(), key);
    }

    /// Pin `key` under `kid`.
    pub fn with_key(mut self, kid: impl Into<String>, key: Jwk) -> Self {
        self.insert(kid, key);
        self
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl From<&Jwks> for StaticKeySource {
    /// Pin every key of the set under its own kid. Keys without one are skipped.
    fn from(jwks: &Jwks) -> Self {
        let keys = jwks
            .keys
            .iter()
            .filter_map(|key| key.kid.clone().map(|kid| (kid, key.clone())))
            .collect();
        Self { keys }
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn fetch(&self, kid: &str) -> Result<Value, KeyFetchError> {
        let key = self.keys.get(kid).ok_or(KeyFetchError::NotFound)?;
        serde_json::to_value(key).map_err(|e| KeyFetchError::Body(e.to_string()))
    }
}
