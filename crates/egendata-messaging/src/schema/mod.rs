//! Schema registry: message types, issuer classes and structural validation.
//!
//! Every registered [`MessageType`] has exactly one claims schema and exactly
//! one [`IssuerClass`]. Schemas are compiled once into a process-wide
//! read-only [`Registry`] and shared by every caller.

mod fragments;
mod messages;
mod validate;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use validate::Violation;

use validate::CompiledSchema;

/// Who signs a message type, and therefore where its key comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssuerClass {
    /// Self-certified: the header embeds the signing key as `jwk`.
    Device,
    /// Certified by a dereferenceable `kid`.
    ServiceOrOperator,
}

/// Registered message types (wire names).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    ServiceRegistration,
    AccountRegistration,
    AuthenticationRequest,
    ConnectionInit,
    ConnectionRequest,
    Connection,
    ConnectionResponse,
    ConnectionEvent,
    PermissionRequest,
    Login,
    LoginResponse,
    LoginEvent,
    AccessToken,
    DataReadRequest,
    DataReadResponse,
    DataWrite,
}

impl MessageType {
    pub const ALL: [MessageType; 16] = [
        Self::ServiceRegistration,
        Self::AccountRegistration,
        Self::AuthenticationRequest,
        Self::ConnectionInit,
        Self::ConnectionRequest,
        Self::Connection,
        Self::ConnectionResponse,
        Self::ConnectionEvent,
        Self::PermissionRequest,
        Self::Login,
        Self::LoginResponse,
        Self::LoginEvent,
        Self::AccessToken,
        Self::DataReadRequest,
        Self::DataReadResponse,
        Self::DataWrite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceRegistration => "SERVICE_REGISTRATION",
            Self::AccountRegistration => "ACCOUNT_REGISTRATION",
            Self::AuthenticationRequest => "AUTHENTICATION_REQUEST",
            Self::ConnectionInit => "CONNECTION_INIT",
            Self::ConnectionRequest => "CONNECTION_REQUEST",
            Self::Connection => "CONNECTION",
            Self::ConnectionResponse => "CONNECTION_RESPONSE",
            Self::ConnectionEvent => "CONNECTION_EVENT",
            Self::PermissionRequest => "PERMISSION_REQUEST",
            Self::Login => "LOGIN",
            Self::LoginResponse => "LOGIN_RESPONSE",
            Self::LoginEvent => "LOGIN_EVENT",
            Self::AccessToken => "ACCESS_TOKEN",
            Self::DataReadRequest => "DATA_READ_REQUEST",
            Self::DataReadResponse => "DATA_READ_RESPONSE",
            Self::DataWrite => "DATA_WRITE",
        }
    }

    pub fn issuer_class(&self) -> IssuerClass {
        match self {
            Self::AccountRegistration
            | Self::ConnectionInit
            | Self::Connection
            | Self::ConnectionResponse
            | Self::Login
            | Self::LoginResponse => IssuerClass::Device,
            Self::ServiceRegistration
            | Self::AuthenticationRequest
            | Self::ConnectionRequest
            | Self::ConnectionEvent
            | Self::PermissionRequest
            | Self::LoginEvent
            | Self::AccessToken
            | Self::DataReadRequest
            | Self::DataReadResponse
            | Self::DataWrite => IssuerClass::ServiceOrOperator,
        }
    }

    pub fn is_device_issued(&self) -> bool {
        self.issuer_class() == IssuerClass::Device
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for names outside the catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown message type: {0}")]
pub struct UnknownMessageType(pub String);

impl FromStr for MessageType {
    type Err = UnknownMessageType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownMessageType(s.to_string()))
    }
}

/// What a claims object says about its own type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclaredType {
    /// No `type`, or a null or empty one.
    Missing,
    /// A `type` outside the catalog, rendered as found.
    Unknown(String),
    Known(MessageType),
}

/// Classify the `type` member of a claims object.
pub fn declared_type(claims: &Map<String, Value>) -> DeclaredType {
    match claims.get("type") {
        None | Some(Value::Null) => DeclaredType::Missing,
        Some(Value::String(s)) if s.is_empty() => DeclaredType::Missing,
        Some(Value::String(s)) => match s.parse() {
            Ok(t) => DeclaredType::Known(t),
            Err(_) => DeclaredType::Unknown(s.clone()),
        },
        Some(other) => DeclaredType::Unknown(other.to_string()),
    }
}

/// Compiled schemas.
#[derive(Debug)]
pub struct Registry {
    claims: HashMap<MessageType, CompiledSchema>,
    header: CompiledSchema,
    jwk: CompiledSchema,
    published_jwk: CompiledSchema,
}

impl Registry {
    fn build() -> Result<Self, String> {
        let claims: HashMap<MessageType, CompiledSchema> = MessageType::ALL
            .into_iter()
            .map(|t| {
                CompiledSchema::compile(messages::claims_schema(t).into_schema())
                    .map(|schema| (t, schema))
                    .map_err(|e| format!("{t}: {e}"))
            })
            .collect::<Result<_, String>>()?;
        Ok(Self {
            claims,
            header: CompiledSchema::compile(fragments::jose_header().into_schema())?,
            jwk: CompiledSchema::compile(fragments::jwk().into_schema())?,
            published_jwk: CompiledSchema::compile(fragments::published_jwk().into_schema())?,
        })
    }

    /// Validate claims against the schema of `message_type`.
    pub fn validate_claims(
        &self,
        message_type: MessageType,
        claims: &Value,
    ) -> Result<(), Vec<Violation>> {
        match self.claims.get(&message_type) {
            Some(schema) => schema.validate(claims),
            None => Err(vec![Violation::new("type", "must be a registered type")]),
        }
    }

    /// Validate a JOSE header.
    pub fn validate_header(&self, header: &Value) -> Result<(), Vec<Violation>> {
        self.header.validate(header)
    }

    /// Validate a public key as embedded in a message.
    pub fn validate_jwk(&self, jwk: &Value) -> Result<(), Vec<Violation>> {
        self.jwk.validate(jwk)
    }

    /// Validate a public key as served from a key URL. Extra members pass.
    pub fn validate_published_jwk(&self, jwk: &Value) -> Result<(), Vec<Violation>> {
        self.published_jwk.validate(jwk)
    }

    /// JSON Schema document for the claims of `message_type`.
    pub fn claims_schema(&self, message_type: MessageType) -> Option<&Value> {
        self.claims.get(&message_type).map(CompiledSchema::schema)
    }
}

/// The process-wide registry, compiled on first use.
pub fn registry() -> Result<&'static Registry, &'static str> {
    static REGISTRY: OnceLock<Result<Registry, String>> = OnceLock::new();
    REGISTRY
        .get_or_init(Registry::build)
        .as_ref()
        .map_err(String::as_str)
}

fn with_registry(
    check: impl FnOnce(&Registry) -> Result<(), Vec<Violation>>,
) -> Result<(), Vec<Violation>> {
    match registry() {
        Ok(registry) => check(registry),
        Err(e) => Err(vec![Violation::new(
            "",
            format!("schema failed to compile: {e}"),
        )]),
    }
}

/// Validate claims against the schema of `message_type`.
pub fn validate_claims(message_type: MessageType, claims: &Value) -> Result<(), Vec<Violation>> {
    with_registry(|r| r.validate_claims(message_type, claims))
}

/// Validate a JOSE header.
pub fn validate_header(header: &Value) -> Result<(), Vec<Violation>> {
    with_registry(|r| r.validate_header(header))
}

/// Validate a public key as embedded in a message.
pub fn validate_jwk(jwk: &Value) -> Result<(), Vec<Violation>> {
    with_registry(|r| r.validate_jwk(jwk))
}

/// Validate a public key as served from a key URL.
pub fn validate_published_jwk(jwk: &Value) -> Result<(), Vec<Violation>> {
    with_registry(|r| r.validate_published_jwk(jwk))
}

/// Required top-level claims of `message_type`, declaration order.
pub fn required_claims(message_type: MessageType) -> Vec<&'static str> {
    messages::claims_schema(message_type)
        .required_fields()
        .collect()
}
