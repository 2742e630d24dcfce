//! Token authentication and issuing.

mod sign;
mod verify;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::codec::{JoseCodec, JwtCodec};
use crate::config::MessagingConfig;
use crate::error::MessagingResult;
use crate::jose::{JoseHeader, Jwk, PrivateJwk};
use crate::keys::KeyResolver;
use crate::message::Message;
use crate::schema::MessageType;

pub use sign::Issuer;
pub use verify::Authenticator;

/// Result of a successful authentication.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedToken {
    /// Header as sent. A header without `jwk` gets the fetched key.
    pub header: JoseHeader,
    /// Validated claims.
    pub payload: Map<String, Value>,
    pub message_type: MessageType,
    /// The key the signature verified against.
    pub signing_key: Jwk,
}

impl VerifiedToken {
    /// Typed view of the claims.
    pub fn message(&self) -> Result<Message, serde_json::Error> {
        serde_json::from_value(Value::Object(self.payload.clone()))
    }

    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }

    pub fn issuer(&self) -> Option<&str> {
        self.claim("iss").and_then(Value::as_str)
    }
}

/// Authenticator and issuer sharing one codec.
#[derive(Debug, Clone)]
pub struct TokenService {
    authenticator: Authenticator,
    issuer: Issuer,
}

impl TokenService {
    /// Service with the default validity window.
    pub fn new(codec: Arc<dyn JwtCodec>, keys: KeyResolver) -> Self {
        let ttl = MessagingConfig::default().token_ttl();
        Self {
            authenticator: Authenticator::new(codec.clone(), keys),
            issuer: Issuer::new(codec, ttl),
        }
    }

    /// Service with the stock codec and HTTP key resolution.
    pub fn from_config(config: &MessagingConfig) -> MessagingResult<Self> {
        let codec: Arc<dyn JwtCodec> = Arc::new(JoseCodec::from_config(config));
        let keys = KeyResolver::http(config)?;
        Ok(Self::new(codec, keys).with_token_ttl(config.token_ttl()))
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.issuer = self.issuer.with_ttl(ttl);
        self
    }

    /// Authenticate an inbound envelope.
    pub async fn verify(&self, token: &str) -> MessagingResult<VerifiedToken> {
        self.authenticator.verify(token).await
    }

    /// Issue an envelope for `claims`.
    pub fn sign<T>(&self, claims: &T, key: &PrivateJwk, header: &JoseHeader) -> MessagingResult<String>
    where
        T: Serialize + ?Sized,
    {
        self.issuer.sign(claims, key, header)
    }

    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    pub fn issuer(&self) -> &Issuer {
        &self.issuer
    }
}
