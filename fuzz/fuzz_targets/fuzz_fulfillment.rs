#![no_main]

use hashlock_core::Fulfillment;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must never panic the decoder
    if let Ok(fulfillment) = Fulfillment::decode(data) {
        // Valid decodes must round-trip byte-exactly
        let reencoded = fulfillment.encode();
        assert_eq!(reencoded, data);

        let fulfillment2 = Fulfillment::decode(&reencoded).unwrap();
        assert_eq!(fulfillment, fulfillment2);
    }
});
