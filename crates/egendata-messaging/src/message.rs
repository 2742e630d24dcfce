//! Typed view of verified claims.
//!
//! The schema registry decides what is acceptable; these types only give
//! callers a convenient, strongly typed handle on claims that already passed.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::jose::{Jwk, Jwks};
use crate::schema::MessageType;

/// Members every message carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeClaims {
    pub aud: String,
    /// Seconds since the epoch. `1700000000.0` reads as `1700000000`.
    #[serde(deserialize_with = "whole_number::deserialize")]
    pub exp: i64,
    #[serde(deserialize_with = "whole_number::deserialize")]
    pub iat: i64,
    pub iss: String,
}

/// Integers that may arrive as floats without a fractional part.
mod whole_number {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::Number;

    fn integer(number: &Number) -> Option<i64> {
        number.as_i64().or_else(|| {
            number
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                .map(|f| f as i64)
        })
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let number = Number::deserialize(deserializer)?;
        integer(&number)
            .ok_or_else(|| D::Error::custom(format!("expected a whole number, found {number}")))
    }

    pub(super) fn status<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(number) = Option::<Number>::deserialize(deserializer)? else {
            return Ok(None);
        };
        integer(&number)
            .and_then(|n| u16::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("expected an HTTP status, found {number}")))
    }
}

/// A message, discriminated by its `type` claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    ServiceRegistration(ServiceRegistration),
    AccountRegistration(AccountRegistration),
    AuthenticationRequest(AuthenticationRequest),
    ConnectionInit(Session),
    ConnectionRequest(ConnectionRequest),
    Connection(Connection),
    ConnectionResponse(NestedToken),
    ConnectionEvent(NestedToken),
    PermissionRequest(PermissionRequest),
    Login(Session),
    LoginResponse(NestedToken),
    LoginEvent(NestedToken),
    AccessToken(AccessToken),
    DataReadRequest(DataReadRequest),
    DataReadResponse(DataReadResponse),
    DataWrite(DataWrite),
}

impl Message {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::ServiceRegistration(_) => MessageType::ServiceRegistration,
            Self::AccountRegistration(_) => MessageType::AccountRegistration,
            Self::AuthenticationRequest(_) => MessageType::AuthenticationRequest,
            Self::ConnectionInit(_) => MessageType::ConnectionInit,
            Self::ConnectionRequest(_) => MessageType::ConnectionRequest,
            Self::Connection(_) => MessageType::Connection,
            Self::ConnectionResponse(_) => MessageType::ConnectionResponse,
            Self::ConnectionEvent(_) => MessageType::ConnectionEvent,
            Self::PermissionRequest(_) => MessageType::PermissionRequest,
            Self::Login(_) => MessageType::Login,
            Self::LoginResponse(_) => MessageType::LoginResponse,
            Self::LoginEvent(_) => MessageType::LoginEvent,
            Self::AccessToken(_) => MessageType::AccessToken,
            Self::DataReadRequest(_) => MessageType::DataReadRequest,
            Self::DataReadResponse(_) => MessageType::DataReadResponse,
            Self::DataWrite(_) => MessageType::DataWrite,
        }
    }

    pub fn envelope(&self) -> &EnvelopeClaims {
        match self {
            Self::ServiceRegistration(m) => &m.envelope,
            Self::AccountRegistration(m) => &m.envelope,
            Self::AuthenticationRequest(m) => &m.envelope,
            Self::ConnectionInit(m) | Self::Login(m) => &m.envelope,
            Self::ConnectionRequest(m) => &m.envelope,
            Self::Connection(m) => &m.envelope,
            Self::ConnectionResponse(m)
            | Self::ConnectionEvent(m)
            | Self::LoginResponse(m)
            | Self::LoginEvent(m) => &m.envelope,
            Self::PermissionRequest(m) => &m.envelope,
            Self::AccessToken(m) => &m.envelope,
            Self::DataReadRequest(m) => &m.envelope,
            Self::DataReadResponse(m) => &m.envelope,
            Self::DataWrite(m) => &m.envelope,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRegistration {
    #[serde(flatten)]
    pub envelope: EnvelopeClaims,
    pub display_name: String,
    pub description: String,
    #[serde(rename = "iconURI")]
    pub icon_uri: String,
    #[serde(rename = "jwksURI")]
    pub jwks_uri: String,
    #[serde(rename = "eventsURI")]
    pub events_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRegistration {
    #[serde(flatten)]
    pub envelope: EnvelopeClaims,
    pub pds: PdsCredentials,
}

/// Personal data storage the account is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdsCredentials {
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationRequest {
    #[serde(flatten)]
    pub envelope: EnvelopeClaims,
    pub sid: String,
    #[serde(rename = "eventsURI")]
    pub events_uri: String,
}

/// `CONNECTION_INIT` and `LOGIN`: the device answers a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(flatten)]
    pub envelope: EnvelopeClaims,
    pub sid: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRequest {
    #[serde(flatten)]
    pub envelope: EnvelopeClaims,
    pub sid: Uuid,
    pub display_name: String,
    pub description: String,
    #[serde(rename = "iconURI")]
    pub icon_uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<RequestedPermission>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(flatten)]
    pub envelope: EnvelopeClaims,
    pub sid: String,
    pub sub: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<ConnectionPermissions>,
}

/// Responses and events wrapping another signed envelope verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NestedToken {
    #[serde(flatten)]
    pub envelope: EnvelopeClaims,
    pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRequest {
    #[serde(flatten)]
    pub envelope: EnvelopeClaims,
    pub sid: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<Uuid>,
    pub permissions: Vec<RequestedPermission>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    #[serde(flatten)]
    pub envelope: EnvelopeClaims,
    pub sub: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataReadRequest {
    #[serde(flatten)]
    pub envelope: EnvelopeClaims,
    pub sub: Uuid,
    pub paths: Vec<ContentPath>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataReadResponse {
    #[serde(flatten)]
    pub envelope: EnvelopeClaims,
    pub sub: Uuid,
    pub paths: Vec<ReadResponsePath>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataWrite {
    #[serde(flatten)]
    pub envelope: EnvelopeClaims,
    pub sub: Uuid,
    pub paths: Vec<DataPath>,
}

// Permissions

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PermissionType {
    Read,
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LawfulBasis {
    #[default]
    Consent,
}

/// What every permission record names: the data path and the legal ground.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionScope {
    pub id: Uuid,
    pub domain: String,
    pub area: String,
    pub lawful_basis: LawfulBasis,
}

impl PermissionScope {
    pub fn path(&self) -> ContentPath {
        ContentPath {
            domain: self.domain.clone(),
            area: self.area.clone(),
        }
    }
}

/// Permission asked for by a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum RequestedPermission {
    Read {
        #[serde(flatten)]
        scope: PermissionScope,
        purpose: String,
        /// Key the data is to be encrypted for.
        jwk: Jwk,
    },
    Write {
        #[serde(flatten)]
        scope: PermissionScope,
        description: String,
    },
}

/// Permission approved by the account owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum GrantedPermission {
    Read {
        #[serde(flatten)]
        scope: PermissionScope,
        purpose: String,
        /// Approved reader.
        kid: String,
    },
    Write {
        #[serde(flatten)]
        scope: PermissionScope,
        description: String,
        /// Everyone approved to read what gets written.
        jwks: Jwks,
    },
}

macro_rules! scoped {
    ($ty:ident) => {
        impl $ty {
            pub fn scope(&self) -> &PermissionScope {
                match self {
                    Self::Read { scope, .. } | Self::Write { scope, .. } => scope,
                }
            }

            pub fn permission_type(&self) -> PermissionType {
                match self {
                    Self::Read { .. } => PermissionType::Read,
                    Self::Write { .. } => PermissionType::Write,
                }
            }
        }
    };
}

scoped!(RequestedPermission);
scoped!(GrantedPermission);

/// Permission declined by the account owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeniedPermission {
    #[serde(flatten)]
    pub scope: PermissionScope,
    #[serde(rename = "type")]
    pub permission_type: PermissionType,
}

/// Approved and denied buckets. An absent bucket is `None`, never empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionPermissions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved: Option<Vec<GrantedPermission>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub denied: Option<Vec<DeniedPermission>>,
}

// Data paths

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentPath {
    pub domain: String,
    pub area: String,
}

/// Content path with encrypted data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPath {
    #[serde(flatten)]
    pub path: ContentPath,
    pub data: Jwe,
}

/// Content path with either encrypted data or the reason there is none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadResponsePath {
    #[serde(flatten)]
    pub path: ContentPath,
    #[serde(flatten)]
    pub outcome: ReadOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadOutcome {
    Data(Jwe),
    Error(ErrorDescriptor),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub message: String,
    #[serde(
        default,
        deserialize_with = "whole_number::status",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// General JWE serialization. Never decrypted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwe {
    pub recipients: Vec<JweRecipient>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protected: Option<String>,
    pub iv: String,
    pub ciphertext: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JweRecipient {
    pub encrypted_key: String,
    pub header: JweRecipientHeader,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JweRecipientHeader {
    pub alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwk: Option<Jwk>,
}
