//! Storage backends for the permissioned name registry.
//!
//! The registry only ever persists four tables:
//!
//! - entries: canonical id → packed two-word [`Entry`]
//! - roles: (resource, account) → [`RoleBitmap`], plus per-resource
//!   [`AssigneeCounts`]
//! - token owners: token id → account
//! - operator approvals: (owner, operator) → approved
//!
//! Backends use interior mutability so a single store can be shared through
//! `Arc` between the access-control layer and the registry.

use anyhow::Result;
use permreg_types::{Address, AssigneeCounts, CanonicalId, Entry, ResourceId, RoleBitmap, TokenId};

pub mod memory;
pub mod sled_store;

pub use memory::MemoryStorage;
pub use sled_store::SledStorage;

/// Durable per-name records.
pub trait EntryStorage {
    /// Stored entry, or the default (non-existent) entry when absent.
    fn get_entry(&self, id: &CanonicalId) -> Result<Entry>;
    fn set_entry(&self, id: &CanonicalId, entry: &Entry) -> Result<()>;
}

/// Role bitmaps and packed assignee counts.
pub trait RoleStorage {
    fn get_roles(&self, resource: &ResourceId, account: &Address) -> Result<RoleBitmap>;
    fn get_assignee_counts(&self, resource: &ResourceId) -> Result<AssigneeCounts>;

    /// Write an account's bitmap together with the resource's counts.
    ///
    /// Backends must make both writes visible together.
    fn apply_role_update(
        &self,
        resource: &ResourceId,
        account: &Address,
        roles: RoleBitmap,
        counts: AssigneeCounts,
    ) -> Result<()>;
}

/// Single-quantity token ownership and operator approvals.
pub trait TokenStorage {
    fn get_token_owner(&self, token: &TokenId) -> Result<Option<Address>>;
    /// `None` removes the ownership record.
    fn set_token_owner(&self, token: &TokenId, owner: Option<Address>) -> Result<()>;
    fn is_approved_for_all(&self, owner: &Address, operator: &Address) -> Result<bool>;
    fn set_approval_for_all(&self, owner: &Address, operator: &Address, approved: bool)
        -> Result<()>;
}

/// One staged role bitmap together with its resource's counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleWrite {
    pub resource: ResourceId,
    pub account: Address,
    pub roles: RoleBitmap,
    pub counts: AssigneeCounts,
}

/// Writes spanning several tables that must land together.
///
/// Writes to the same key are applied in staging order, so the last one wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    pub entries: Vec<(CanonicalId, Entry)>,
    pub token_owners: Vec<(TokenId, Option<Address>)>,
    pub roles: Vec<RoleWrite>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_entry(&mut self, id: CanonicalId, entry: Entry) -> &mut Self {
        self.entries.push((id, entry));
        self
    }

    /// `None` removes the ownership record.
    pub fn set_token_owner(&mut self, token: TokenId, owner: Option<Address>) -> &mut Self {
        self.token_owners.push((token, owner));
        self
    }

    pub fn set_roles(
        &mut self,
        resource: ResourceId,
        account: Address,
        roles: RoleBitmap,
        counts: AssigneeCounts,
    ) -> &mut Self {
        self.roles.push(RoleWrite {
            resource,
            account,
            roles,
            counts,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.token_owners.is_empty() && self.roles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len() + self.token_owners.len() + self.roles.len()
    }
}

/// Atomic application of a [`WriteBatch`].
pub trait BatchStorage {
    /// Apply every write in `batch` or none of them.
    fn apply_batch(&self, batch: &WriteBatch) -> Result<()>;
}

/// Everything the registry needs from a backend.
pub trait Storage: EntryStorage + RoleStorage + TokenStorage + BatchStorage + Send + Sync {}

impl<T> Storage for T where
    T: EntryStorage + RoleStorage + TokenStorage + BatchStorage + Send + Sync
{
}

/// Key for the roles table: resource bytes followed by account bytes.
pub(crate) fn role_key(resource: &ResourceId, account: &Address) -> [u8; 52] {
    let mut key = [0u8; 52];
    key[..32].copy_from_slice(resource.as_bytes());
    key[32..].copy_from_slice(account.as_bytes());
    key
}

/// Key for the approvals table: owner bytes followed by operator bytes.
pub(crate) fn approval_key(owner: &Address, operator: &Address) -> [u8; 40] {
    let mut key = [0u8; 40];
    key[..20].copy_from_slice(owner.as_bytes());
    key[20..].copy_from_slice(operator.as_bytes());
    key
}
