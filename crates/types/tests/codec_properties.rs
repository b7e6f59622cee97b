use permreg_types::{
    construct_resource_id, construct_token_id, Address, AssigneeCounts, CanonicalId, Entry,
    Role, RoleBitmap, MAX_ASSIGNEES,
};
use proptest::prelude::*;

// Property-based checks for the identity and record codecs.

fn arbitrary_canonical() -> impl Strategy<Value = CanonicalId> {
    prop::array::uniform32(any::<u8>()).prop_map(CanonicalId::from_bytes)
}

fn arbitrary_address() -> impl Strategy<Value = Option<Address>> {
    prop::option::of(prop::array::uniform20(any::<u8>()).prop_map(Address))
        .prop_map(|a| a.and_then(Address::non_zero))
}

fn arbitrary_entry() -> impl Strategy<Value = Entry> {
    (
        any::<u64>(),
        any::<u32>(),
        arbitrary_address(),
        any::<u32>(),
        arbitrary_address(),
    )
        .prop_map(
            |(expiry, token_version_id, subregistry, eac_version_id, resolver)| Entry {
                expiry,
                token_version_id,
                subregistry,
                eac_version_id,
                resolver,
            },
        )
}

proptest! {
    #[test]
    fn token_and_resource_ids_decode_to_inputs(
        canonical in arbitrary_canonical(),
        version in prop_oneof![Just(0u32), Just(u32::MAX), any::<u32>()],
    ) {
        prop_assert_eq!(construct_token_id(canonical, version).decode(), (canonical, version));
        prop_assert_eq!(construct_resource_id(canonical, version).decode(), (canonical, version));
    }
}

proptest! {
    #[test]
    fn entry_words_restore_entry(entry in arbitrary_entry()) {
        let words = entry.encode();
        prop_assert_eq!(Entry::decode(&words).unwrap(), entry);
        // fields never leak into the reserved word1 prefix
        prop_assert!(words[1][..8].iter().all(|b| *b == 0));
    }
}

proptest! {
    #[test]
    fn counts_track_adds_and_removes(adds in 0u8..=MAX_ASSIGNEES, removes in 0u8..=20) {
        let role = Role::SetResolver.bit();
        let mut counts = AssigneeCounts::default();
        for _ in 0..adds {
            counts = counts.try_add(role).unwrap();
        }
        for _ in 0..removes {
            counts = counts.remove(role);
        }
        let expected = adds.saturating_sub(removes);
        prop_assert_eq!(counts.count_at(role.0.trailing_zeros()), expected);
        // no other slot is disturbed
        prop_assert_eq!(counts.masked(!role & RoleBitmap::ALL), 0);
    }
}
