#![no_main]

use hashlock_core::{secret, SaltSource};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Salt parsing must reject arbitrary input without panicking. Accepted
    // salts go on to hash at their embedded cost factor, so iterations that
    // stumble on a well-formed high-cost salt are slow but still correct.
    if let Ok(text) = std::str::from_utf8(data) {
        let source = SaltSource::Existing(text.to_string());
        let _ = secret::derive("fuzz password", "rFuzzSubject", &source, 4);
    }
});
