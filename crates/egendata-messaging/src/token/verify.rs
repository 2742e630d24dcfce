//! Inbound envelope authentication.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::VerifiedToken;
use crate::codec::{CodecError, JwtCodec};
use crate::error::{MessagingError, MessagingResult};
use crate::jose::{JoseHeader, Jwk};
use crate::keys::KeyResolver;
use crate::schema::{self, DeclaredType, IssuerClass, Violation};

/// Verifies inbound envelopes.
///
/// Checks run in a fixed order and the first failure wins:
/// decode, signature presence, `type`, issuer-class key reference, header
/// schema, claims schema, key acquisition, signature.
#[derive(Clone)]
pub struct Authenticator {
    codec: Arc<dyn JwtCodec>,
    keys: KeyResolver,
}

impl fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authenticator")
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

impl Authenticator {
    pub fn new(codec: Arc<dyn JwtCodec>, keys: KeyResolver) -> Self {
        Self { codec, keys }
    }

    /// Authenticate `token`.
    ///
    /// A header that arrived without `jwk` is given the key the signature was
    /// checked against. An embedded key is left as sent; the verifying key is
    /// always in [`VerifiedToken::signing_key`].
    pub async fn verify(&self, token: &str) -> MessagingResult<VerifiedToken> {
        match self.authenticate(token).await {
            Ok(verified) => {
                debug!(
                    message_type = %verified.message_type,
                    iss = verified.issuer().unwrap_or_default(),
                    "token verified"
                );
                Ok(verified)
            }
            Err(e) => {
                debug!(kind = %e.kind(), error = %e, "token rejected");
                Err(e)
            }
        }
    }

    async fn authenticate(&self, token: &str) -> MessagingResult<VerifiedToken> {
        let envelope = self
            .codec
            .decode(token)
            .map_err(|e| MessagingError::MalformedEnvelope {
                reason: e.to_string(),
            })?;

        if envelope.signature.is_empty() {
            return Err(MessagingError::MissingSignature);
        }

        let message_type = match schema::declared_type(&envelope.claims) {
            DeclaredType::Missing => return Err(MessagingError::MissingType),
            DeclaredType::Unknown(message_type) => {
                return Err(MessagingError::UnknownType { message_type })
            }
            DeclaredType::Known(message_type) => message_type,
        };

        let issuer_class = message_type.issuer_class();
        match issuer_class {
            IssuerClass::Device if envelope.header_member("jwk").is_none() => {
                return Err(MessagingError::NoSigningKeyJwk)
            }
            IssuerClass::ServiceOrOperator if envelope.header_member("kid").is_none() => {
                return Err(MessagingError::NoSigningKeyKid)
            }
            _ => {}
        }

        let header = Value::Object(envelope.header);
        schema::validate_header(&header)
            .map_err(|violations| MessagingError::InvalidHeader { violations })?;
        let claims = Value::Object(envelope.claims);
        schema::validate_claims(message_type, &claims).map_err(|violations| {
            MessagingError::InvalidClaims {
                message_type,
                violations,
            }
        })?;

        let mut header: JoseHeader =
            serde_json::from_value(header).map_err(|e| MessagingError::InvalidHeader {
                violations: vec![Violation::new("", e.to_string())],
            })?;

        let key = self
            .acquire_key(issuer_class, &header)
            .await?
            .ok_or(MessagingError::NoSigningKey)?;

        let payload = self.codec.verify(token, &key).map_err(|e| match e {
            CodecError::Expired => MessagingError::Expired,
            other => MessagingError::SignatureInvalid {
                reason: other.to_string(),
            },
        })?;

        header.jwk.get_or_insert_with(|| key.clone());
        Ok(VerifiedToken {
            header,
            payload,
            message_type,
            signing_key: key,
        })
    }

    async fn acquire_key(
        &self,
        issuer_class: IssuerClass,
        header: &JoseHeader,
    ) -> MessagingResult<Option<Jwk>> {
        match (issuer_class, &header.kid) {
            (IssuerClass::Device, _) => Ok(header.jwk.clone()),
            (IssuerClass::ServiceOrOperator, Some(kid)) => self.keys.lookup(kid).await,
            (IssuerClass::ServiceOrOperator, None) => Ok(None),
        }
    }
}
