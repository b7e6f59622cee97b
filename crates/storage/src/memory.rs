//! In-memory backend, used by tests and ephemeral registries.

use crate::{
    approval_key, role_key, BatchStorage, EntryStorage, RoleStorage, TokenStorage, WriteBatch,
};
use anyhow::Result;
use parking_lot::RwLock;
use permreg_types::{Address, AssigneeCounts, CanonicalId, Entry, ResourceId, RoleBitmap, TokenId};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// In-memory testing backend
///
/// Entries are kept in their packed form so the in-memory and sled backends
/// exercise the same codec.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<RwLock<HashMap<CanonicalId, [u8; 64]>>>,
    roles: Arc<RwLock<HashMap<[u8; 52], RoleBitmap>>>,
    assignees: Arc<RwLock<HashMap<ResourceId, AssigneeCounts>>>,
    owners: Arc<RwLock<HashMap<TokenId, Address>>>,
    approvals: Arc<RwLock<HashSet<[u8; 40]>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }
}

impl EntryStorage for MemoryStorage {
    fn get_entry(&self, id: &CanonicalId) -> Result<Entry> {
        match self.entries.read().get(id) {
            Some(bytes) => Ok(Entry::from_bytes(bytes)?),
            None => Ok(Entry::default()),
        }
    }

    fn set_entry(&self, id: &CanonicalId, entry: &Entry) -> Result<()> {
        self.entries.write().insert(*id, entry.to_bytes());
        Ok(())
    }
}

impl RoleStorage for MemoryStorage {
    fn get_roles(&self, resource: &ResourceId, account: &Address) -> Result<RoleBitmap> {
        Ok(self
            .roles
            .read()
            .get(&role_key(resource, account))
            .copied()
            .unwrap_or_default())
    }

    fn get_assignee_counts(&self, resource: &ResourceId) -> Result<AssigneeCounts> {
        Ok(self
            .assignees
            .read()
            .get(resource)
            .copied()
            .unwrap_or_default())
    }

    fn apply_role_update(
        &self,
        resource: &ResourceId,
        account: &Address,
        roles: RoleBitmap,
        counts: AssigneeCounts,
    ) -> Result<()> {
        // lock order: roles, then assignees
        let mut role_map = self.roles.write();
        let mut count_map = self.assignees.write();

        let key = role_key(resource, account);
        if roles.is_empty() {
            role_map.remove(&key);
        } else {
            role_map.insert(key, roles);
        }
        count_map.insert(*resource, counts);
        Ok(())
    }
}

impl TokenStorage for MemoryStorage {
    fn get_token_owner(&self, token: &TokenId) -> Result<Option<Address>> {
        Ok(self.owners.read().get(token).copied())
    }

    fn set_token_owner(&self, token: &TokenId, owner: Option<Address>) -> Result<()> {
        let mut owners = self.owners.write();
        match owner {
            Some(owner) => owners.insert(*token, owner),
            None => owners.remove(token),
        };
        Ok(())
    }

    fn is_approved_for_all(&self, owner: &Address, operator: &Address) -> Result<bool> {
        Ok(self
            .approvals
            .read()
            .contains(&approval_key(owner, operator)))
    }

    fn set_approval_for_all(
        &self,
        owner: &Address,
        operator: &Address,
        approved: bool,
    ) -> Result<()> {
        let key = approval_key(owner, operator);
        let mut approvals = self.approvals.write();
        if approved {
            approvals.insert(key);
        } else {
            approvals.remove(&key);
        }
        Ok(())
    }
}

impl BatchStorage for MemoryStorage {
    fn apply_batch(&self, batch: &WriteBatch) -> Result<()> {
        // lock order: entries, roles, assignees, owners
        let mut entries = self.entries.write();
        let mut role_map = self.roles.write();
        let mut count_map = self.assignees.write();
        let mut owners = self.owners.write();

        for (id, entry) in &batch.entries {
            entries.insert(*id, entry.to_bytes());
        }
        for write in &batch.roles {
            let key = role_key(&write.resource, &write.account);
            if write.roles.is_empty() {
                role_map.remove(&key);
            } else {
                role_map.insert(key, write.roles);
            }
            count_map.insert(write.resource, write.counts);
        }
        for (token, owner) in &batch.token_owners {
            match owner {
                Some(owner) => owners.insert(*token, *owner),
                None => owners.remove(token),
            };
        }
        Ok(())
    }
}
