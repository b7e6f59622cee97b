use permreg_registry::{
    NameStatus, PermissionedRegistry, RegisterRequest, RegistryConfig, RegistryError,
};
use permreg_access_control::AccessControlError;
use permreg_storage::SledStorage;
use permreg_types::{Address, ManualClock, Role, RoleBitmap, TokenId, DEFAULT_OWNER_ROLES};
use std::sync::Arc;

const T0: u64 = 1_700_000_000;
const ADMIN: Address = Address::from_low_u64(0xAD);
const U1: Address = Address::from_low_u64(1);
const U2: Address = Address::from_low_u64(2);
const U3: Address = Address::from_low_u64(3);

fn registry() -> (PermissionedRegistry, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(T0));
    let mut registry = PermissionedRegistry::in_memory(clock.clone());
    registry.initialize_root(&ADMIN, RoleBitmap::ALL).unwrap();
    (registry, clock)
}

fn register(
    registry: &mut PermissionedRegistry,
    label: &str,
    owner: Address,
    roles: RoleBitmap,
    expiry: u64,
) -> TokenId {
    registry
        .register(&ADMIN, RegisterRequest::new(label, owner, roles, expiry))
        .unwrap()
}

#[test]
fn alice_reregistration_after_expiry() {
    let (mut registry, clock) = registry();
    let r1 = DEFAULT_OWNER_ROLES | Role::Burn.bit();
    let first = register(&mut registry, "alice", U1, r1, T0 + 100);

    let entry = registry.get_entry(first).unwrap();
    assert_eq!(entry.token_version_id, 0);
    assert_eq!(entry.eac_version_id, 0);
    let old_resource = registry.get_resource(first).unwrap();

    clock.set(T0 + 101);
    assert_eq!(registry.owner_of(&first).unwrap(), None);
    assert_eq!(registry.latest_owner_of(first).unwrap(), Some(U1));
    assert_eq!(registry.get_status(first).unwrap(), NameStatus::Expired);

    let second = register(&mut registry, "alice", U2, DEFAULT_OWNER_ROLES, T0 + 200);
    let entry = registry.get_entry(second).unwrap();
    assert_eq!(entry.token_version_id, 1);
    assert_eq!(entry.eac_version_id, 1);
    assert_eq!(registry.owner_of(&second).unwrap(), Some(U2));
    assert_eq!(registry.owner_of(&first).unwrap(), None);

    // fresh ACL: nothing U1 held carries over
    assert_eq!(registry.roles_of(second, &U1).unwrap(), RoleBitmap::EMPTY);
    assert!(!registry.has_roles(second, Role::Renew.bit(), &U1).unwrap());
    // the orphaned scope still records U1's old roles
    assert_ne!(
        registry
            .get_resource_assignee_count(&old_resource, Role::Burn.bit())
            .unwrap(),
        0
    );
    assert_eq!(registry.get_assignee_count(second, Role::Burn.bit()).unwrap(), 0);
}

#[test]
fn expiry_boundary() {
    let (mut registry, clock) = registry();
    let expiry = T0 + 100;
    let token_id = register(&mut registry, "edge", U1, DEFAULT_OWNER_ROLES, expiry);

    clock.set(expiry - 1);
    registry.renew(&U1, token_id, expiry + 1).unwrap();
    registry.set_resolver(&U1, token_id, Some(U3)).unwrap();
    assert_eq!(registry.owner_of(&token_id).unwrap(), Some(U1));

    let expiry = expiry + 1;
    clock.set(expiry);
    assert_eq!(registry.owner_of(&token_id).unwrap(), None);
    for err in [
        registry.renew(&U1, token_id, expiry + 50).unwrap_err(),
        registry.set_resolver(&U1, token_id, None).unwrap_err(),
        registry.set_subregistry(&U1, token_id, None).unwrap_err(),
        registry.unregister(&ADMIN, token_id).unwrap_err(),
        registry.burn(&ADMIN, token_id).unwrap_err(),
        registry.set_token_observer(&ADMIN, token_id, None).unwrap_err(),
    ] {
        assert!(
            matches!(err, RegistryError::NameExpired { id } if id == token_id),
            "unexpected error: {err:?}"
        );
    }
}

#[test]
fn regeneration_preserves_owner_and_roles() {
    let (mut registry, _) = registry();
    let owner_roles = DEFAULT_OWNER_ROLES | Role::Renew.admin_bit();
    let old = register(&mut registry, "regen", U1, owner_roles, T0 + 100);

    registry
        .grant_roles(&U1, old, Role::Renew.bit(), &U2)
        .unwrap();
    let mid = registry.get_token_id(old).unwrap();
    registry
        .revoke_roles(&U1, mid, Role::Renew.bit(), &U2)
        .unwrap();
    let new = registry.get_token_id(old).unwrap();

    assert_eq!(old.version(), 0);
    assert_eq!(mid.version(), 1);
    assert_eq!(new.version(), 2);
    assert_eq!(registry.owner_of(&new).unwrap(), Some(U1));
    assert_eq!(registry.owner_of(&old).unwrap(), None);
    assert_eq!(registry.owner_of(&mid).unwrap(), None);
    assert_eq!(registry.roles_of(new, &U1).unwrap(), owner_roles);
    // regeneration never touches the ACL epoch
    assert_eq!(registry.get_entry(new).unwrap().eac_version_id, 0);
}

#[test]
fn reserved_names_never_regenerate() {
    let (mut registry, _) = registry();
    let reserved = registry.reserve(&ADMIN, "held", None, T0 + 100).unwrap();
    registry
        .grant_roles(&ADMIN, reserved, Role::SetResolver.bit(), &U1)
        .unwrap();
    assert_eq!(registry.get_token_id(reserved).unwrap(), reserved);
}

#[test]
fn transfer_gated_by_can_transfer() {
    let (mut registry, _) = registry();
    let token_id = register(&mut registry, "gated", U1, Role::Renew.bit(), T0 + 100);

    let err = registry
        .safe_transfer_from(&U1, &U1, &U2, token_id)
        .unwrap_err();
    assert!(matches!(
        err,
        RegistryError::TransferDisallowed { token_id: t, owner } if t == token_id && owner == U1
    ));

    registry
        .grant_roles(&ADMIN, token_id, Role::CanTransfer.bit(), &U1)
        .unwrap();
    let token_id = registry.get_token_id(token_id).unwrap();
    registry
        .safe_transfer_from(&U1, &U1, &U2, token_id)
        .unwrap();
    assert_eq!(registry.owner_of(&token_id).unwrap(), Some(U2));
    assert!(registry
        .has_roles(token_id, Role::CanTransfer.bit() | Role::Renew.bit(), &U2)
        .unwrap());
}

#[test]
fn batch_transfer_is_all_or_nothing() {
    let (mut registry, _) = registry();
    let a = register(&mut registry, "one", U1, DEFAULT_OWNER_ROLES, T0 + 100);
    let b = register(&mut registry, "two", U1, DEFAULT_OWNER_ROLES, T0 + 100);
    let c = register(&mut registry, "three", U1, Role::Renew.bit(), T0 + 100);

    let err = registry
        .safe_batch_transfer_from(&U1, &U1, &U2, &[a, b, c])
        .unwrap_err();
    assert!(matches!(err, RegistryError::TransferDisallowed { token_id, .. } if token_id == c));
    for id in [a, b, c] {
        assert_eq!(registry.owner_of(&id).unwrap(), Some(U1));
    }
    assert_eq!(registry.roles_of(a, &U2).unwrap(), RoleBitmap::EMPTY);

    assert!(matches!(
        registry.safe_batch_transfer_from(&U1, &U1, &U2, &[a, a]),
        Err(RegistryError::DuplicateTokenId { token_id }) if token_id == a
    ));

    registry.drain_events();
    registry
        .safe_batch_transfer_from(&U1, &U1, &U2, &[a, b])
        .unwrap();
    assert_eq!(registry.owner_of(&a).unwrap(), Some(U2));
    assert_eq!(registry.owner_of(&b).unwrap(), Some(U2));
    assert_eq!(registry.owner_of(&c).unwrap(), Some(U1));
    let names: Vec<_> = registry.drain_events().iter().map(|e| e.name()).collect();
    assert_eq!(names, vec!["transfer_batch"]);
}

#[test]
fn approved_operator_can_transfer() {
    let (mut registry, _) = registry();
    let token_id = register(&mut registry, "op", U1, DEFAULT_OWNER_ROLES, T0 + 100);
    registry.set_approval_for_all(&U1, &U3, true).unwrap();
    registry
        .safe_batch_transfer_from(&U3, &U1, &U2, &[token_id])
        .unwrap();
    assert_eq!(registry.owner_of(&token_id).unwrap(), Some(U2));
}

#[test]
fn sixteenth_assignee_fails_without_changes() {
    let (mut registry, _) = registry();
    let token_id = register(&mut registry, "crowd", U1, RoleBitmap::EMPTY, T0 + 100);
    let role = Role::SetResolver.bit();
    let shift = Role::SetResolver.slot() * 4;

    for n in 0..14u64 {
        registry
            .grant_roles(&ADMIN, token_id, role, &Address::from_low_u64(100 + n))
            .unwrap();
    }
    registry
        .grant_roles(&ADMIN, token_id, role, &Address::from_low_u64(200))
        .unwrap();
    assert_eq!(
        registry.get_assignee_count(token_id, role).unwrap(),
        15u128 << shift
    );

    let current = registry.get_token_id(token_id).unwrap();
    let err = registry
        .grant_roles(&ADMIN, token_id, role, &Address::from_low_u64(300))
        .unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Access(AccessControlError::MaxAssigneesExceeded { .. })
    ));
    assert_eq!(registry.get_token_id(token_id).unwrap(), current);
    assert!(!registry
        .has_roles(token_id, role, &Address::from_low_u64(300))
        .unwrap());
    assert_eq!(
        registry.get_assignee_count(token_id, role).unwrap(),
        15u128 << shift
    );
}

#[test]
fn transfer_respects_receiver_capacity() {
    let (mut registry, _) = registry();
    let token_id = register(&mut registry, "full", U1, DEFAULT_OWNER_ROLES, T0 + 100);
    // U1 already counts once; fill the renew slot
    for n in 0..14u64 {
        registry
            .grant_roles(&ADMIN, token_id, Role::Renew.bit(), &Address::from_low_u64(100 + n))
            .unwrap();
    }
    let token_id = registry.get_token_id(token_id).unwrap();
    // moving U1's roles keeps the count at 15
    registry
        .safe_transfer_from(&U1, &U1, &U2, token_id)
        .unwrap();
    assert_eq!(
        registry.get_assignee_count(token_id, Role::Renew.bit()).unwrap(),
        15u128 << (Role::Renew.slot() * 4)
    );
}

#[test]
fn sled_backed_registry_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(T0));
    let token_id = {
        let store = Arc::new(SledStorage::new(dir.path()).unwrap());
        let mut registry =
            PermissionedRegistry::new(store.clone(), clock.clone(), RegistryConfig::default());
        registry.initialize_root(&ADMIN, RoleBitmap::ALL).unwrap();
        let token_id = register(&mut registry, "durable", U1, DEFAULT_OWNER_ROLES, T0 + 100);
        store.flush().unwrap();
        token_id
    };

    let store = Arc::new(SledStorage::new(dir.path()).unwrap());
    let mut registry = PermissionedRegistry::new(store, clock, RegistryConfig::default());
    assert_eq!(registry.owner_of(&token_id).unwrap(), Some(U1));
    assert!(registry.has_roles(token_id, Role::Renew.bit(), &U1).unwrap());
    assert!(matches!(
        registry.initialize_root(&U2, RoleBitmap::ALL),
        Err(RegistryError::AlreadyInitialized)
    ));
}
