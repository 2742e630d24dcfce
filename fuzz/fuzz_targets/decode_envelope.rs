//! Fuzz target for compact envelope decoding.
//!
//! ```bash
//! cargo +nightly fuzz run decode_envelope
//! ```

#![no_main]

use egendata_messaging::{JoseCodec, JwtCodec};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(token) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(envelope) = JoseCodec::default().decode(token) {
        // a decoded envelope always has three segments
        assert_eq!(token.split('.').count(), 3);
        let _ = envelope.header_member("alg");
    }
});
