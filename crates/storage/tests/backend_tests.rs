//! Behavioural tests shared by the in-memory and sled backends.

use permreg_storage::{
    BatchStorage,
    EntryStorage, MemoryStorage, RoleStorage, SledStorage, Storage, TokenStorage, WriteBatch,
};
use permreg_types::{
    label_to_canonical_id, Address, AssigneeCounts, Entry, Role, RoleBitmap, ROOT_RESOURCE,
};
use tempfile::TempDir;

/// Helper to create a populated entry
fn create_test_entry() -> Entry {
    Entry {
        expiry: 1_700_000_000,
        token_version_id: 3,
        subregistry: Some(Address::from_low_u64(0xAA)),
        eac_version_id: 2,
        resolver: None,
    }
}

fn exercise_entries<S: EntryStorage>(store: &S) {
    let id = label_to_canonical_id("alice").unwrap();
    assert_eq!(store.get_entry(&id).unwrap(), Entry::default());

    let entry = create_test_entry();
    store.set_entry(&id, &entry).unwrap();
    assert_eq!(store.get_entry(&id).unwrap(), entry);

    let other = label_to_canonical_id("bob").unwrap();
    assert!(!store.get_entry(&other).unwrap().exists());
}

fn exercise_roles<S: RoleStorage>(store: &S) {
    let id = label_to_canonical_id("alice").unwrap();
    let resource = id.resource_id(0);
    let account = Address::from_low_u64(1);
    let roles = Role::Renew.bit() | Role::SetResolver.with_admin();
    let counts = AssigneeCounts::default().try_add(roles).unwrap();

    store
        .apply_role_update(&resource, &account, roles, counts)
        .unwrap();
    assert_eq!(store.get_roles(&resource, &account).unwrap(), roles);
    assert_eq!(store.get_assignee_counts(&resource).unwrap(), counts);

    // different epoch of the same name is a different scope
    let next = id.resource_id(1);
    assert_eq!(store.get_roles(&next, &account).unwrap(), RoleBitmap::EMPTY);
    assert_eq!(store.get_roles(&ROOT_RESOURCE, &account).unwrap(), RoleBitmap::EMPTY);

    store
        .apply_role_update(&resource, &account, RoleBitmap::EMPTY, AssigneeCounts::default())
        .unwrap();
    assert_eq!(store.get_roles(&resource, &account).unwrap(), RoleBitmap::EMPTY);
    assert_eq!(
        store.get_assignee_counts(&resource).unwrap(),
        AssigneeCounts::default()
    );
}

fn exercise_tokens<S: TokenStorage>(store: &S) {
    let token = label_to_canonical_id("alice").unwrap().token_id(4);
    let owner = Address::from_low_u64(1);
    let operator = Address::from_low_u64(2);

    assert_eq!(store.get_token_owner(&token).unwrap(), None);
    store.set_token_owner(&token, Some(owner)).unwrap();
    assert_eq!(store.get_token_owner(&token).unwrap(), Some(owner));
    store.set_token_owner(&token, None).unwrap();
    assert_eq!(store.get_token_owner(&token).unwrap(), None);

    assert!(!store.is_approved_for_all(&owner, &operator).unwrap());
    store.set_approval_for_all(&owner, &operator, true).unwrap();
    assert!(store.is_approved_for_all(&owner, &operator).unwrap());
    assert!(!store.is_approved_for_all(&operator, &owner).unwrap());
    store.set_approval_for_all(&owner, &operator, false).unwrap();
    assert!(!store.is_approved_for_all(&owner, &operator).unwrap());
}

fn exercise_batch<S: Storage>(store: &S) {
    let id = label_to_canonical_id("carol").unwrap();
    let old_token = id.token_id(0);
    let new_token = id.token_id(1);
    let resource = id.resource_id(0);
    let owner = Address::from_low_u64(5);
    let roles = Role::Renew.bit() | Role::CanTransfer.bit();
    let counts = AssigneeCounts::default().try_add(roles).unwrap();
    store.set_token_owner(&old_token, Some(owner)).unwrap();

    let mut entry = create_test_entry();
    entry.token_version_id = 1;
    let mut batch = WriteBatch::new();
    batch
        .set_entry(id, entry)
        .set_token_owner(old_token, None)
        .set_token_owner(new_token, Some(owner))
        .set_roles(resource, owner, roles, counts);
    assert_eq!(batch.len(), 4);
    store.apply_batch(&batch).unwrap();

    assert_eq!(store.get_entry(&id).unwrap(), entry);
    assert_eq!(store.get_token_owner(&old_token).unwrap(), None);
    assert_eq!(store.get_token_owner(&new_token).unwrap(), Some(owner));
    assert_eq!(store.get_roles(&resource, &owner).unwrap(), roles);
    assert_eq!(store.get_assignee_counts(&resource).unwrap(), counts);

    // later writes to the same key win
    let renew_only = AssigneeCounts::default().try_add(Role::Renew.bit()).unwrap();
    let mut batch = WriteBatch::new();
    batch
        .set_roles(resource, owner, RoleBitmap::EMPTY, AssigneeCounts::default())
        .set_roles(resource, owner, Role::Renew.bit(), renew_only);
    store.apply_batch(&batch).unwrap();
    assert_eq!(store.get_roles(&resource, &owner).unwrap(), Role::Renew.bit());

    store.apply_batch(&WriteBatch::new()).unwrap();
    assert_eq!(store.get_token_owner(&new_token).unwrap(), Some(owner));
}

#[test]
fn test_memory_backend() {
    let store = MemoryStorage::new();
    exercise_entries(&store);
    exercise_roles(&store);
    exercise_tokens(&store);
    exercise_batch(&store);
    assert_eq!(store.entry_count(), 2);
}

#[test]
fn test_sled_backend() {
    let dir = TempDir::new().unwrap();
    let store = SledStorage::new(dir.path()).unwrap();
    exercise_entries(&store);
    exercise_roles(&store);
    exercise_tokens(&store);
    exercise_batch(&store);
}

#[test]
fn test_sled_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let id = label_to_canonical_id("persist").unwrap();
    let token = id.token_id(0);
    let owner = Address::from_low_u64(7);
    let resource = id.resource_id(0);
    let roles = Role::CanTransfer.bit();
    let counts = AssigneeCounts::default().try_add(roles).unwrap();

    {
        let store = SledStorage::new(dir.path()).unwrap();
        store.set_entry(&id, &create_test_entry()).unwrap();
        store.set_token_owner(&token, Some(owner)).unwrap();
        store
            .apply_role_update(&resource, &owner, roles, counts)
            .unwrap();
        store.flush().unwrap();
    }

    let store = SledStorage::new(dir.path()).unwrap();
    assert_eq!(store.get_entry(&id).unwrap(), create_test_entry());
    assert_eq!(store.get_token_owner(&token).unwrap(), Some(owner));
    assert_eq!(store.get_roles(&resource, &owner).unwrap(), roles);
    assert_eq!(store.get_assignee_counts(&resource).unwrap(), counts);
}

#[test]
fn test_sled_reopens_right_after_drop() {
    let dir = TempDir::new().unwrap();
    let id = label_to_canonical_id("reopen").unwrap();

    for version in 0..8u32 {
        let store = SledStorage::new(dir.path()).unwrap();
        assert_eq!(store.get_entry(&id).unwrap().token_version_id, version.saturating_sub(1));
        let mut entry = create_test_entry();
        entry.token_version_id = version;
        let mut batch = WriteBatch::new();
        batch.set_entry(id, entry);
        store.apply_batch(&batch).unwrap();
    }
}
