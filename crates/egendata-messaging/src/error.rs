//! Error types for message authentication and issuing.

use std::fmt;

use serde::Serialize;

use crate::schema::{MessageType, Violation};

/// Messaging errors.
///
/// Every variant maps to one stable [`ErrorKind`]. Verification aborts on the
/// first error; nothing here is retried internally.
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    /// Envelope could not be split into header, claims and signature.
    #[error("malformed envelope: {reason}")]
    MalformedEnvelope { reason: String },

    /// Envelope carries no signature segment.
    #[error("signature missing")]
    MissingSignature,

    /// Claims carry no `type`.
    #[error("type missing")]
    MissingType,

    /// Claims `type` is not a registered message type.
    #[error("unknown type: {message_type}")]
    UnknownType { message_type: String },

    /// Service/operator-issued message without a `kid` header.
    #[error("no signing key (kid)")]
    NoSigningKeyKid,

    /// Device-issued message without an embedded `jwk` header.
    #[error("no signing key (jwk)")]
    NoSigningKeyJwk,

    /// No verification key could be obtained.
    #[error("no signing key")]
    NoSigningKey,

    /// JOSE header failed structural validation.
    #[error("invalid header: {}", join(.violations))]
    InvalidHeader { violations: Vec<Violation> },

    /// Claims failed structural validation for their message type.
    #[error("invalid claims for {message_type}: {}", join(.violations))]
    InvalidClaims {
        message_type: MessageType,
        violations: Vec<Violation>,
    },

    /// Key lookup failed. `reason` keeps the transport-level cause.
    #[error("no key found for kid: {kid}")]
    KeyNotFound { kid: String, reason: String },

    /// Signature did not verify against the acquired key.
    #[error("signature invalid: {reason}")]
    SignatureInvalid { reason: String },

    /// Signature verified but the token is past its `exp`.
    #[error("token expired")]
    Expired,

    /// Claims handed to the issuer carry no `type`.
    #[error("payload must have a type")]
    MissingSchemaOnIssue,

    /// Claims handed to the issuer carry an unregistered `type`.
    #[error("unknown schema {message_type}")]
    UnknownSchemaOnIssue { message_type: String },

    /// Issuer header carries neither `kid` nor `jwk`.
    #[error("header must either have a kid or a jwk")]
    MissingSigningKeyReference,

    /// The codec refused to sign.
    #[error("signing failed: {reason}")]
    SigningFailed { reason: String },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Config { message: String },
}

/// Stable, machine-readable error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    MalformedEnvelope,
    MissingSignature,
    MissingType,
    UnknownType,
    NoSigningKeyKid,
    NoSigningKeyJwk,
    NoSigningKey,
    InvalidHeader,
    InvalidClaims,
    KeyNotFound,
    SignatureInvalid,
    Expired,
    MissingSchemaOnIssue,
    UnknownSchemaOnIssue,
    MissingSigningKeyReference,
    SigningFailed,
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedEnvelope => "MALFORMED_ENVELOPE",
            Self::MissingSignature => "MISSING_SIGNATURE",
            Self::MissingType => "MISSING_TYPE",
            Self::UnknownType => "UNKNOWN_TYPE",
            Self::NoSigningKeyKid => "NO_SIGNING_KEY_KID",
            Self::NoSigningKeyJwk => "NO_SIGNING_KEY_JWK",
            Self::NoSigningKey => "NO_SIGNING_KEY",
            Self::InvalidHeader => "INVALID_HEADER",
            Self::InvalidClaims => "INVALID_CLAIMS",
            Self::KeyNotFound => "KEY_NOT_FOUND",
            Self::SignatureInvalid => "SIGNATURE_INVALID",
            Self::Expired => "EXPIRED",
            Self::MissingSchemaOnIssue => "MISSING_SCHEMA_ON_ISSUE",
            Self::UnknownSchemaOnIssue => "UNKNOWN_SCHEMA_ON_ISSUE",
            Self::MissingSigningKeyReference => "MISSING_SIGNING_KEY_REFERENCE",
            Self::SigningFailed => "SIGNING_FAILED",
            Self::Config => "CONFIG",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl MessagingError {
    /// Stable kind for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedEnvelope { .. } => ErrorKind::MalformedEnvelope,
            Self::MissingSignature => ErrorKind::MissingSignature,
            Self::MissingType => ErrorKind::MissingType,
            Self::UnknownType { .. } => ErrorKind::UnknownType,
            Self::NoSigningKeyKid => ErrorKind::NoSigningKeyKid,
            Self::NoSigningKeyJwk => ErrorKind::NoSigningKeyJwk,
            Self::NoSigningKey => ErrorKind::NoSigningKey,
            Self::InvalidHeader { .. } => ErrorKind::InvalidHeader,
            Self::InvalidClaims { .. } => ErrorKind::InvalidClaims,
            Self::KeyNotFound { .. } => ErrorKind::KeyNotFound,
            Self::SignatureInvalid { .. } => ErrorKind::SignatureInvalid,
            Self::Expired => ErrorKind::Expired,
            Self::MissingSchemaOnIssue => ErrorKind::MissingSchemaOnIssue,
            Self::UnknownSchemaOnIssue { .. } => ErrorKind::UnknownSchemaOnIssue,
            Self::MissingSigningKeyReference => ErrorKind::MissingSigningKeyReference,
            Self::SigningFailed { .. } => ErrorKind::SigningFailed,
            Self::Config { .. } => ErrorKind::Config,
        }
    }

    /// Structural violations carried by validation errors, empty otherwise.
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::InvalidHeader { violations } | Self::InvalidClaims { violations, .. } => {
                violations
            }
            _ => &[],
        }
    }
}

fn join(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for messaging operations.
pub type MessagingResult<T> = Result<T, MessagingError>;
