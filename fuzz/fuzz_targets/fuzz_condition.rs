#![no_main]

use hashlock_core::Condition;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must never panic the decoder
    if let Ok(condition) = Condition::decode(data) {
        // Valid decodes must round-trip byte-exactly
        let reencoded = condition.encode();
        assert_eq!(reencoded, data);

        let condition2 = Condition::decode(&reencoded).unwrap();
        assert_eq!(condition, condition2);

        // Hex conversion should not panic
        let _ = condition.to_hex();
    }
});
