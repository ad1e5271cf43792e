#![no_main]

use libfuzzer_sys::fuzz_target;
use stmtsnap::SnapshotId;

// Anything that parses must be canonical: formatting its instant again gives
// back the same text.
fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(id) = SnapshotId::parse(text) {
        assert_eq!(id.as_str(), text, "parse accepted non-canonical text");

        let instant = id.instant().expect("parsed id has an instant");
        let again = SnapshotId::from_instant(instant).expect("instant re-formats");
        assert_eq!(again, id);
        assert!(!id.file_stem().contains([' ', ':']));
    }
});
