//! Envelope codec: sign, decode and verify compact signed envelopes.
//!
//! The authenticator and issuer only talk to [`JwtCodec`]. [`JoseCodec`] is
//! the stock implementation on top of `jsonwebtoken` and `rsa`.

use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::errors::ErrorKind as JwtErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use rsa::pkcs1::EncodeRsaPrivateKey;
use rsa::{BigUint, RsaPrivateKey};
use serde_json::{Map, Value};

use crate::config::MessagingConfig;
use crate::jose::{Algorithm, DecodedEnvelope, JoseHeader, Jwk, PrivateJwk};

/// Codec failures. Callers map these onto [`crate::MessagingError`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("malformed envelope: {0}")]
    Malformed(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("token expired")]
    Expired,

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

/// Signing capability handed to the authenticator and issuer.
pub trait JwtCodec: Send + Sync {
    /// Sign `claims` with `key`, using `header` as the protected header.
    fn sign(
        &self,
        claims: &Map<String, Value>,
        key: &PrivateJwk,
        header: &JoseHeader,
    ) -> Result<String, CodecError>;

    /// Split an envelope into its parts. No cryptographic checks.
    fn decode(&self, token: &str) -> Result<DecodedEnvelope, CodecError>;

    /// Verify the signature with `key` and return the claims.
    fn verify(&self, token: &str, key: &Jwk) -> Result<Map<String, Value>, CodecError>;
}

/// RSA codec backed by `jsonwebtoken`.
#[derive(Debug, Clone)]
pub struct JoseCodec {
    leeway: Duration,
}

impl Default for JoseCodec {
    fn default() -> Self {
        Self::from_config(&MessagingConfig::default())
    }
}

impl JoseCodec {
    /// Codec tolerating `leeway` of clock skew on `exp`.
    pub fn new(leeway: Duration) -> Self {
        Self { leeway }
    }

    pub fn from_config(config: &MessagingConfig) -> Self {
        Self::new(config.clock_leeway())
    }
}

impl JwtCodec for JoseCodec {
    fn sign(
        &self,
        claims: &Map<String, Value>,
        key: &PrivateJwk,
        header: &JoseHeader,
    ) -> Result<String, CodecError> {
        let encoding_key = encoding_key(key)?;
        let header = serde_json::to_value(header)
            .and_then(serde_json::from_value::<Header>)
            .map_err(|e| CodecError::Malformed(format!("header: {e}")))?;
        jsonwebtoken::encode(&header, claims, &encoding_key)
            .map_err(|e| CodecError::InvalidKey(e.to_string()))
    }

    fn decode(&self, token: &str) -> Result<DecodedEnvelope, CodecError> {
        let mut parts = token.split('.');
        let (Some(header), Some(claims), Some(signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(CodecError::Malformed(
                "expected three dot-separated segments".to_string(),
            ));
        };
        if !signature.bytes().all(is_base64url) {
            return Err(CodecError::Malformed("signature is not base64url".to_string()));
        }
        Ok(DecodedEnvelope {
            header: decode_segment("header", header)?,
            claims: decode_segment("claims", claims)?,
            signature: signature.to_string(),
        })
    }

    fn verify(&self, token: &str, key: &Jwk) -> Result<Map<String, Value>, CodecError> {
        let envelope = self.decode(token)?;
        let alg = match envelope.header_member("alg") {
            Some(Value::String(name)) => {
                Algorithm::parse(name).ok_or_else(|| CodecError::UnsupportedAlgorithm(name.clone()))?
            }
            other => {
                return Err(CodecError::UnsupportedAlgorithm(
                    other.map(Value::to_string).unwrap_or_default(),
                ))
            }
        };
        if key.kty != "RSA" {
            return Err(CodecError::InvalidKey(format!("unsupported key type {}", key.kty)));
        }

        let decoding_key = DecodingKey::from_rsa_components(&key.n, &key.e)
            .map_err(|e| CodecError::InvalidKey(e.to_string()))?;

        let mut validation = Validation::new(alg.to_jsonwebtoken());
        validation.leeway = self.leeway.as_secs();
        validation.validate_aud = false;

        let data = jsonwebtoken::decode::<Map<String, Value>>(token, &decoding_key, &validation)
            .map_err(|e| match e.kind() {
                JwtErrorKind::ExpiredSignature => CodecError::Expired,
                JwtErrorKind::InvalidAlgorithm => CodecError::UnsupportedAlgorithm(alg.to_string()),
                JwtErrorKind::InvalidRsaKey(reason) => CodecError::InvalidKey(reason.clone()),
                _ => CodecError::InvalidSignature(e.to_string()),
            })?;
        Ok(data.claims)
    }
}

fn is_base64url(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}

fn decode_segment(name: &str, segment: &str) -> Result<Map<String, Value>, CodecError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| CodecError::Malformed(format!("{name} is not base64url: {e}")))?;
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(CodecError::Malformed(format!("{name} is not a JSON object"))),
        Err(e) => Err(CodecError::Malformed(format!("{name} is not JSON: {e}"))),
    }
}

fn encoding_key(key: &PrivateJwk) -> Result<EncodingKey, CodecError> {
    let uint = |name: &str, value: &str| {
        URL_SAFE_NO_PAD
            .decode(value)
            .map(|bytes| BigUint::from_bytes_be(&bytes))
            .map_err(|e| CodecError::InvalidKey(format!("{name}: {e}")))
    };
    let private = RsaPrivateKey::from_components(
        uint("n", &key.public.n)?,
        uint("e", &key.public.e)?,
        uint("d", &key.d)?,
        vec![uint("p", &key.p)?, uint("q", &key.q)?],
    )
    .map_err(|e| CodecError::InvalidKey(e.to_string()))?;
    let der = private
        .to_pkcs1_der()
        .map_err(|e| CodecError::InvalidKey(e.to_string()))?;
    Ok(EncodingKey::from_rsa_der(der.as_bytes()))
}
