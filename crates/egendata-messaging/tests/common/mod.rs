//! Shared fixtures: transient RSA keys and claims builders.

#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use egendata_messaging::{
    JoseCodec, JoseHeader, JwtCodec, KeyResolver, KeyUse, PrivateJwk, StaticKeySource,
    TokenService,
};
use rsa::RsaPrivateKey;
use serde_json::{json, Value};

pub const SERVICE_KID: &str = "https://mycv.work/jwks/sig";
pub const SID: &str = "f0b5bef5-c137-4211-adaf-a0d6a37be8b1";
pub const SUB: &str = "baa949aa-fbb5-4aad-8351-d6ef219dd07b";

fn generate() -> PrivateJwk {
    let key = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).expect("failed to generate key");
    PrivateJwk::from_rsa(&key, KeyUse::Sig)
}

/// Key published by the service under [`SERVICE_KID`].
pub fn service_key() -> &'static PrivateJwk {
    static KEY: OnceLock<PrivateJwk> = OnceLock::new();
    KEY.get_or_init(|| generate().with_kid(SERVICE_KID))
}

/// Key a device embeds in its headers.
pub fn device_key() -> &'static PrivateJwk {
    static KEY: OnceLock<PrivateJwk> = OnceLock::new();
    KEY.get_or_init(generate)
}

/// Unrelated key, published under the same kid as the service key.
pub fn impostor_key() -> &'static PrivateJwk {
    static KEY: OnceLock<PrivateJwk> = OnceLock::new();
    KEY.get_or_init(|| generate().with_kid(SERVICE_KID))
}

pub fn codec() -> Arc<dyn JwtCodec> {
    Arc::new(JoseCodec::default())
}

pub fn service_with(keys: StaticKeySource) -> TokenService {
    TokenService::new(codec(), KeyResolver::new(keys))
}

/// Service resolving [`SERVICE_KID`] to the service key.
pub fn service() -> TokenService {
    service_with(StaticKeySource::new().with_key(SERVICE_KID, service_key().to_public()))
}

pub fn service_header() -> JoseHeader {
    JoseHeader::with_kid(SERVICE_KID)
}

pub fn device_header() -> JoseHeader {
    JoseHeader::with_jwk(device_key().to_public())
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Claims for `message_type` with the envelope defaults filled in.
pub fn claims(message_type: &str, body: Value) -> Value {
    let mut claims = json!({
        "type": message_type,
        "aud": "egendata://account",
        "iss": "https://mycv.work",
        "iat": now(),
        "exp": now() + 3600
    });
    if let (Some(target), Value::Object(body)) = (claims.as_object_mut(), body) {
        target.extend(body);
    }
    claims
}

pub fn authentication_request() -> Value {
    claims(
        "AUTHENTICATION_REQUEST",
        json!({ "sid": SID, "eventsURI": "https://mycv.work/events" }),
    )
}

pub fn connection_init() -> Value {
    let mut claims = claims("CONNECTION_INIT", json!({ "sid": SID }));
    claims["aud"] = json!("https://mycv.work");
    claims["iss"] = json!("egendata://account");
    claims
}

pub fn segment(value: &Value) -> String {
    URL_SAFE_NO_PAD.encode(value.to_string())
}

/// Envelope assembled by hand; `signature` is used verbatim.
pub fn raw_token(header: &Value, claims: &Value, signature: &str) -> String {
    format!("{}.{}.{}", segment(header), segment(claims), signature)
}

/// Sign with the codec directly, skipping the issuer's checks.
pub fn sign_unchecked(claims: &Value, key: &PrivateJwk, header: &JoseHeader) -> String {
    let claims = claims.as_object().expect("claims must be an object");
    JoseCodec::default()
        .sign(claims, key, header)
        .expect("failed to sign")
}
