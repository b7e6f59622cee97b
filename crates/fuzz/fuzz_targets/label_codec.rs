#![no_main]
use libfuzzer_sys::fuzz_target;
use permreg_types::{label_to_canonical_id, Label, MAX_LABEL_LENGTH};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else {
        return;
    };

    match label_to_canonical_id(s) {
        Ok(canonical) => {
            // accepted labels are bounded and dot-free
            assert!(!s.is_empty());
            assert!(s.len() <= MAX_LABEL_LENGTH);
            assert!(!s.contains('.'));
            // low 32 bits are always free for the version
            assert_eq!(&canonical.as_bytes()[28..], &[0u8; 4]);
            // hashing is deterministic
            assert_eq!(label_to_canonical_id(s).ok(), Some(canonical));
            let label = Label::parse(s).expect("validated label parses");
            assert_eq!(label.canonical_id(), canonical);
        }
        Err(_) => {
            assert!(Label::parse(s).is_err());
        }
    }
});
