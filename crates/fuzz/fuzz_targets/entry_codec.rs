#![no_main]
use libfuzzer_sys::fuzz_target;
use permreg_types::{Entry, ENTRY_BYTES};

fuzz_target!(|data: &[u8]| {
    if data.len() != ENTRY_BYTES {
        // wrong widths must be rejected, never panic
        assert!(Entry::from_bytes(data).is_err());
        return;
    }

    // Whatever decodes must encode back to the identical bytes
    if let Ok(entry) = Entry::from_bytes(data) {
        assert_eq!(&entry.to_bytes()[..], data);
    } else {
        // only a dirty reserved prefix of word1 is rejected
        assert!(data[32..40].iter().any(|b| *b != 0));
    }
});
