//! Signed message authentication and schema validation for Egendata.
//!
//! Parties in the Egendata protocol (devices, services and the operator)
//! exchange compact signed envelopes. This crate provides:
//!
//! - A schema registry with one claims schema per message type
//! - Key resolution for `kid`-anchored (service/operator) messages
//! - Authentication of inbound envelopes, with self-certifying (`jwk`)
//!   envelopes for device-issued types
//! - Issuing of outbound envelopes, validated before they leave
//!
//! # Quick Start
//!
//! ```no_run
//! use egendata_messaging::{JoseHeader, MessagingConfig, TokenService};
//!
//! # async fn example(key: egendata_messaging::PrivateJwk, inbound: &str) -> Result<(), egendata_messaging::MessagingError> {
//! let service = TokenService::from_config(&MessagingConfig::from_env())?;
//!
//! // Verify an inbound envelope
//! let verified = service.verify(inbound).await?;
//! println!("{} from {:?}", verified.message_type, verified.issuer());
//!
//! // Issue an outbound one
//! let claims = serde_json::json!({
//!     "type": "AUTHENTICATION_REQUEST",
//!     "aud": "egendata://account",
//!     "iss": "https://mycv.work",
//!     "sid": "f0b5bef5-c137-4211-adaf-a0d6a37be8b1",
//!     "eventsURI": "https://mycv.work/events"
//! });
//! let token = service.sign(&claims, &key, &JoseHeader::with_kid("https://mycv.work/jwks/sig"))?;
//! # let _ = token;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `EGENDATA_KEY_FETCH_TIMEOUT_SECS` | Key fetch timeout in seconds (default: none) |
//! | `EGENDATA_MAX_KEY_BYTES` | Max key document size (default: 65536) |
//! | `EGENDATA_CLOCK_LEEWAY_SECS` | Clock skew tolerated on `exp` (default: 60) |
//! | `EGENDATA_TOKEN_TTL_SECS` | Validity window of issued tokens (default: 3600) |

pub mod codec;
pub mod config;
pub mod error;
pub mod jose;
pub mod keys;
pub mod message;
pub mod schema;
pub mod token;

// Re-export main types
pub use codec::{CodecError, JoseCodec, JwtCodec};
pub use config::MessagingConfig;
pub use error::{ErrorKind, MessagingError, MessagingResult};
pub use jose::{
    Algorithm, DecodedEnvelope, JoseHeader, Jwk, Jwks, KeyUse, PrivateJwk, ALLOWED_ALGORITHMS,
};
pub use keys::{HttpKeySource, KeyFetchError, KeyResolver, KeySource, StaticKeySource};
pub use message::Message;
pub use schema::{IssuerClass, MessageType, Violation};
pub use token::{Authenticator, Issuer, TokenService, VerifiedToken};
