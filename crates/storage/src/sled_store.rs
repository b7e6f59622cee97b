//! Sled-backed implementation

use crate::{
    approval_key, role_key, BatchStorage, EntryStorage, RoleStorage, TokenStorage, WriteBatch,
};
use anyhow::{anyhow, Result};
use permreg_types::{
    Address, AssigneeCounts, CanonicalId, Entry, ResourceId, RoleBitmap, TokenId, ADDRESS_BYTES,
};
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use sled::{Db, Tree};
use std::path::Path;

pub struct SledStorage {
    db: Db,
    entries: Tree,
    roles: Tree,
    assignees: Tree,
    owners: Tree,
    approvals: Tree,
}

impl SledStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        // No background flusher: it would keep the file lock alive after drop.
        let db = sled::Config::new()
            .path(path.as_ref())
            .flush_every_ms(None)
            .open()?;
        let entries = db.open_tree("entries")?;
        let roles = db.open_tree("roles")?;
        let assignees = db.open_tree("assignees")?;
        let owners = db.open_tree("token_owners")?;
        let approvals = db.open_tree("approvals")?;

        tracing::debug!(
            target: "storage",
            "Opened registry database at {} ({} entries)",
            path.as_ref().display(),
            entries.len()
        );

        Ok(Self {
            db,
            entries,
            roles,
            assignees,
            owners,
            approvals,
        })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl Drop for SledStorage {
    fn drop(&mut self) {
        if let Err(err) = self.db.flush() {
            tracing::warn!(target: "storage", "Final flush failed: {}", err);
        }
    }
}

fn read_u128(bytes: &[u8]) -> Result<u128> {
    let raw: [u8; 16] = bytes
        .try_into()
        .map_err(|_| anyhow!("expected 16-byte value, found {} bytes", bytes.len()))?;
    Ok(u128::from_be_bytes(raw))
}

impl EntryStorage for SledStorage {
    fn get_entry(&self, id: &CanonicalId) -> Result<Entry> {
        match self.entries.get(&id.as_bytes()[..])? {
            Some(v) => Ok(Entry::from_bytes(&v)?),
            None => Ok(Entry::default()),
        }
    }

    fn set_entry(&self, id: &CanonicalId, entry: &Entry) -> Result<()> {
        self.entries
            .insert(&id.as_bytes()[..], &entry.to_bytes()[..])?;
        Ok(())
    }
}

impl RoleStorage for SledStorage {
    fn get_roles(&self, resource: &ResourceId, account: &Address) -> Result<RoleBitmap> {
        self.roles
            .get(role_key(resource, account))?
            .map(|v| read_u128(&v).map(RoleBitmap))
            .transpose()
            .map(Option::unwrap_or_default)
    }

    fn get_assignee_counts(&self, resource: &ResourceId) -> Result<AssigneeCounts> {
        self.assignees
            .get(&resource.as_bytes()[..])?
            .map(|v| read_u128(&v).map(AssigneeCounts))
            .transpose()
            .map(Option::unwrap_or_default)
    }

    fn apply_role_update(
        &self,
        resource: &ResourceId,
        account: &Address,
        roles: RoleBitmap,
        counts: AssigneeCounts,
    ) -> Result<()> {
        let key = role_key(resource, account);
        let role_bytes = roles.0.to_be_bytes();
        let count_bytes = counts.0.to_be_bytes();

        (&self.roles, &self.assignees)
            .transaction(|(role_tree, count_tree)| {
                if roles.is_empty() {
                    role_tree.remove(&key[..])?;
                } else {
                    role_tree.insert(&key[..], &role_bytes[..])?;
                }
                count_tree.insert(&resource.as_bytes()[..], &count_bytes[..])?;
                Ok::<(), ConflictableTransactionError<()>>(())
            })
            .map_err(|e: TransactionError<()>| anyhow!("role update failed: {e:?}"))?;
        Ok(())
    }
}

impl TokenStorage for SledStorage {
    fn get_token_owner(&self, token: &TokenId) -> Result<Option<Address>> {
        self.owners
            .get(&token.as_bytes()[..])?
            .map(|v| -> Result<Address> {
                let raw: [u8; ADDRESS_BYTES] = v
                    .as_ref()
                    .try_into()
                    .map_err(|_| anyhow!("corrupt owner record for {token}"))?;
                Ok(Address(raw))
            })
            .transpose()
    }

    fn set_token_owner(&self, token: &TokenId, owner: Option<Address>) -> Result<()> {
        match owner {
            Some(owner) => {
                self.owners
                    .insert(&token.as_bytes()[..], &owner.as_bytes()[..])?;
            }
            None => {
                self.owners.remove(&token.as_bytes()[..])?;
            }
        }
        Ok(())
    }

    fn is_approved_for_all(&self, owner: &Address, operator: &Address) -> Result<bool> {
        Ok(self
            .approvals
            .contains_key(approval_key(owner, operator))?)
    }

    fn set_approval_for_all(
        &self,
        owner: &Address,
        operator: &Address,
        approved: bool,
    ) -> Result<()> {
        let key = approval_key(owner, operator);
        if approved {
            self.approvals.insert(key, &[1u8][..])?;
        } else {
            self.approvals.remove(key)?;
        }
        Ok(())
    }
}

impl BatchStorage for SledStorage {
    fn apply_batch(&self, batch: &WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        (&self.entries, &self.roles, &self.assignees, &self.owners)
            .transaction(|(entry_tree, role_tree, count_tree, owner_tree)| {
                for (id, entry) in &batch.entries {
                    entry_tree.insert(&id.as_bytes()[..], &entry.to_bytes()[..])?;
                }
                for write in &batch.roles {
                    let key = role_key(&write.resource, &write.account);
                    if write.roles.is_empty() {
                        role_tree.remove(&key[..])?;
                    } else {
                        role_tree.insert(&key[..], &write.roles.0.to_be_bytes()[..])?;
                    }
                    count_tree.insert(
                        &write.resource.as_bytes()[..],
                        &write.counts.0.to_be_bytes()[..],
                    )?;
                }
                for (token, owner) in &batch.token_owners {
                    match owner {
                        Some(owner) => {
                            owner_tree.insert(&token.as_bytes()[..], &owner.as_bytes()[..])?;
                        }
                        None => {
                            owner_tree.remove(&token.as_bytes()[..])?;
                        }
                    }
                }
                Ok::<(), ConflictableTransactionError<()>>(())
            })
            .map_err(|e: TransactionError<()>| anyhow!("batch write failed: {e:?}"))?;

        tracing::trace!(target: "storage", "Applied batch of {} writes", batch.len());
        Ok(())
    }
}
