//! Outbound envelope issuing.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use crate::codec::JwtCodec;
use crate::error::{MessagingError, MessagingResult};
use crate::jose::{JoseHeader, PrivateJwk};
use crate::schema::{self, DeclaredType, MessageType};

/// Signs outbound envelopes.
///
/// Every envelope is decoded and validated again before it is returned, so
/// the issuer never emits something the authenticator would reject on shape.
#[derive(Clone)]
pub struct Issuer {
    codec: Arc<dyn JwtCodec>,
    ttl: Duration,
}

impl fmt::Debug for Issuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Issuer")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl Issuer {
    /// Issuer stamping `exp = iat + ttl`.
    pub fn new(codec: Arc<dyn JwtCodec>, ttl: Duration) -> Self {
        Self { codec, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Same codec, different validity window.
    pub fn with_ttl(&self, ttl: Duration) -> Self {
        Self::new(self.codec.clone(), ttl)
    }

    /// Sign `claims` with `key`.
    ///
    /// `claims` must serialize to an object with a registered `type`, and
    /// `header` must name the trust anchor (`kid` or `jwk`). `iat` and `exp`
    /// are overwritten.
    pub fn sign<T>(&self, claims: &T, key: &PrivateJwk, header: &JoseHeader) -> MessagingResult<String>
    where
        T: Serialize + ?Sized,
    {
        let mut claims = match serde_json::to_value(claims) {
            Ok(Value::Object(map)) => map,
            _ => return Err(MessagingError::MissingSchemaOnIssue),
        };

        let message_type = match schema::declared_type(&claims) {
            DeclaredType::Missing => return Err(MessagingError::MissingSchemaOnIssue),
            DeclaredType::Unknown(message_type) => {
                return Err(MessagingError::UnknownSchemaOnIssue { message_type })
            }
            DeclaredType::Known(message_type) => message_type,
        };

        if !header.has_key_reference() {
            return Err(MessagingError::MissingSigningKeyReference);
        }

        self.stamp(&mut claims);

        let token = self
            .codec
            .sign(&claims, key, header)
            .map_err(|e| MessagingError::SigningFailed {
                reason: e.to_string(),
            })?;

        self.self_check(&token, message_type)?;
        Ok(token)
    }

    fn stamp(&self, claims: &mut Map<String, Value>) {
        let iat = Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        claims.insert("iat".to_string(), iat.into());
        claims.insert("exp".to_string(), iat.saturating_add(ttl).into());
    }

    fn self_check(&self, token: &str, message_type: MessageType) -> MessagingResult<()> {
        let envelope = self
            .codec
            .decode(token)
            .map_err(|e| MessagingError::MalformedEnvelope {
                reason: e.to_string(),
            })?;

        schema::validate_header(&Value::Object(envelope.header)).map_err(|violations| {
            warn!(message_type = %message_type, count = violations.len(), "issued header failed validation");
            MessagingError::InvalidHeader { violations }
        })?;

        schema::validate_claims(message_type, &Value::Object(envelope.claims)).map_err(
            |violations| {
                warn!(message_type = %message_type, count = violations.len(), "issued claims failed validation");
                MessagingError::InvalidClaims {
                    message_type,
                    violations,
                }
            },
        )
    }
}
