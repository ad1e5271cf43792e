#![no_main]

use libfuzzer_sys::fuzz_target;
use stmtsnap::export::{decode_snapshot, encode_snapshot};

// Decoding arbitrary bytes must fail cleanly; whatever decodes must encode
// and decode to the same snapshot.
fuzz_target!(|data: &[u8]| {
    if data.len() > 1 << 20 {
        return;
    }

    if let Ok(snapshot) = decode_snapshot(data) {
        let encoded = encode_snapshot(&snapshot).expect("decoded snapshot re-encodes");
        let decoded = decode_snapshot(&encoded).expect("re-encoded snapshot decodes");
        assert_eq!(decoded, snapshot);
    }
});
