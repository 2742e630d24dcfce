//! JOSE data model: signature algorithms, keys, headers and decoded envelopes.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Signature algorithms accepted on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Algorithm {
    #[default]
    RS256,
    RS384,
    RS512,
}

/// Allowed algorithms, default first.
pub const ALLOWED_ALGORITHMS: [Algorithm; 3] = [Algorithm::RS256, Algorithm::RS384, Algorithm::RS512];

/// Wire names of [`ALLOWED_ALGORITHMS`], same order.
pub const ALLOWED_ALGORITHM_NAMES: [&str; 3] = ["RS256", "RS384", "RS512"];

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        ALLOWED_ALGORITHMS.into_iter().find(|alg| alg.as_str() == name)
    }

    pub(crate) fn to_jsonwebtoken(self) -> jsonwebtoken::Algorithm {
        match self {
            Self::RS256 => jsonwebtoken::Algorithm::RS256,
            Self::RS384 => jsonwebtoken::Algorithm::RS384,
            Self::RS512 => jsonwebtoken::Algorithm::RS512,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Intended use of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyUse {
    Sig,
    Enc,
}

/// Public RSA key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    pub kty: String,
    #[serde(rename = "use")]
    pub key_use: KeyUse,
    pub e: String,
    pub n: String,
}

impl Jwk {
    /// RSA public key from base64url modulus and exponent.
    pub fn rsa(key_use: KeyUse, n: impl Into<String>, e: impl Into<String>) -> Self {
        Self {
            kid: None,
            kty: "RSA".to_string(),
            key_use,
            e: e.into(),
            n: n.into(),
        }
    }

    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.kid = Some(kid.into());
        self
    }
}

/// Private RSA key. Serializes flat, public members first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateJwk {
    #[serde(flatten)]
    pub public: Jwk,
    pub d: String,
    pub p: String,
    pub q: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dq: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qi: Option<String>,
}

impl PrivateJwk {
    /// Export an RSA private key. CRT parameters are left out.
    pub fn from_rsa(key: &RsaPrivateKey, key_use: KeyUse) -> Self {
        let [p, q] = match key.primes() {
            [p, q, ..] => [b64(p), b64(q)],
            _ => [String::new(), String::new()],
        };
        Self {
            public: Jwk::rsa(key_use, b64(key.n()), b64(key.e())),
            d: b64(key.d()),
            p,
            q,
            dp: None,
            dq: None,
            qi: None,
        }
    }

    pub fn with_kid(mut self, kid: impl Into<String>) -> Self {
        self.public.kid = Some(kid.into());
        self
    }

    pub fn kid(&self) -> Option<&str> {
        self.public.kid.as_deref()
    }

    pub fn to_public(&self) -> Jwk {
        self.public.clone()
    }
}

fn b64(n: &BigUint) -> String {
    URL_SAFE_NO_PAD.encode(n.to_bytes_be())
}

/// Ordered set of public keys, e.g. every reader approved for a write.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Jwks {
    pub keys: Vec<Jwk>,
}

impl Jwks {
    pub fn new(keys: Vec<Jwk>) -> Self {
        Self { keys }
    }

    pub fn get(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|key| key.kid.as_deref() == Some(kid))
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }
}

impl FromIterator<Jwk> for Jwks {
    fn from_iter<I: IntoIterator<Item = Jwk>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// JOSE header of a signed envelope.
///
/// `kid` points at a remotely published key, `jwk` embeds the key itself.
/// Which of the two a message needs depends on its issuer class.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JoseHeader {
    pub alg: Algorithm,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwk: Option<Jwk>,
}

impl JoseHeader {
    /// Header anchored on a remotely published key.
    pub fn with_kid(kid: impl Into<String>) -> Self {
        Self {
            kid: Some(kid.into()),
            ..Self::default()
        }
    }

    /// Header anchored on an embedded key.
    pub fn with_jwk(jwk: Jwk) -> Self {
        Self {
            jwk: Some(jwk),
            ..Self::default()
        }
    }

    pub fn alg(mut self, alg: Algorithm) -> Self {
        self.alg = alg;
        self
    }

    /// Whether the header names a trust anchor at all.
    pub fn has_key_reference(&self) -> bool {
        self.kid.is_some() || self.jwk.is_some()
    }
}

/// Envelope split into its parts, nothing verified.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEnvelope {
    pub header: Map<String, Value>,
    pub claims: Map<String, Value>,
    /// Raw signature segment; empty when the envelope is unsigned.
    pub signature: String,
}

impl DecodedEnvelope {
    /// Header member, treating an explicit `null` as absent.
    pub fn header_member(&self, name: &str) -> Option<&Value> {
        self.header.get(name).filter(|v| !v.is_null())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn algorithm_default_is_first_allowed() {
        assert_eq!(Algorithm::default(), ALLOWED_ALGORITHMS[0]);
        assert_eq!(Algorithm::parse("RS512"), Some(Algorithm::RS512));
        assert_eq!(Algorithm::parse("HS256"), None);
        assert_eq!(Algorithm::parse("none"), None);
        for (alg, name) in ALLOWED_ALGORITHMS.iter().zip(ALLOWED_ALGORITHM_NAMES) {
            assert_eq!(alg.as_str(), name);
        }
    }

    #[test]
    fn private_jwk_is_flat() {
        let key = PrivateJwk {
            public: Jwk::rsa(KeyUse::Sig, "bW9k", "AQAB").with_kid("egendata://account/jwks/k1"),
            d: "ZA".to_string(),
            p: "cA".to_string(),
            q: "cQ".to_string(),
            dp: None,
            dq: None,
            qi: None,
        };
        let value = serde_json::to_value(&key).unwrap();
        assert_eq!(
            value,
            json!({
                "kid": "egendata://account/jwks/k1",
                "kty": "RSA",
                "use": "sig",
                "e": "AQAB",
                "n": "bW9k",
                "d": "ZA",
                "p": "cA",
                "q": "cQ"
            })
        );
        assert_eq!(key.to_public().kid.as_deref(), key.kid());
    }

    #[test]
    fn header_skips_absent_members() {
        let header = JoseHeader::with_kid("https://mycv.work/jwks/abc");
        assert_eq!(
            serde_json::to_value(&header).unwrap(),
            json!({ "alg": "RS256", "kid": "https://mycv.work/jwks/abc" })
        );
        assert!(header.has_key_reference());
        assert!(!JoseHeader::default().has_key_reference());
    }

    #[test]
    fn jwks_lookup_by_kid() {
        let jwks: Jwks = vec![
            Jwk::rsa(KeyUse::Enc, "YQ", "AQAB").with_kid("a"),
            Jwk::rsa(KeyUse::Enc, "Yg", "AQAB").with_kid("b"),
        ]
        .into_iter()
        .collect();
        assert_eq!(jwks.len(), 2);
        assert_eq!(jwks.get("b").map(|k| k.n.as_str()), Some("Yg"));
        assert!(jwks.get("c").is_none());
    }
}
