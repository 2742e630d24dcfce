//! Fuzz target for claims validation against every registered message type.
//!
//! ```bash
//! cargo +nightly fuzz run validate_claims
//! ```

#![no_main]

use egendata_messaging::schema::{validate_claims, validate_header};
use egendata_messaging::MessageType;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };

    let _ = validate_header(&value);
    for message_type in MessageType::ALL {
        if let Err(violations) = validate_claims(message_type, &value) {
            assert!(!violations.is_empty());
        }
    }
});
