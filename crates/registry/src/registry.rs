//! Permissioned registry state machine
//!
//! Names move through `Unregistered → Reserved → Registered ⇄ Expired`. Each
//! name owns one [`Entry`] carrying two independent epochs:
//!
//! - the ACL epoch (`eac_version_id`) scopes role assignments and advances only
//!   when an expired name is registered or reserved again, orphaning every
//!   role granted under the previous epoch;
//! - the token epoch (`token_version_id`) names the transferable handle and
//!   also advances whenever the roles of a live, owned name change.
//!
//! Every mutating call samples the clock once and finishes all validation
//! before its first write.

use crate::config::RegistryConfig;
use crate::errors::{RegistryError, Result};
use crate::events::RegistryEvent;
use crate::observer::RenewalObserver;
use permreg_access_control::{AccessControl, RoleChange, RoleUpdate};
use permreg_storage::{MemoryStorage, Storage, WriteBatch};
use permreg_types::{
    Address, CanonicalId, Clock, Entry, Label, ResourceId, Role, RoleBitmap, TokenId,
    ROOT_RESOURCE,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Lifecycle state reported by [`PermissionedRegistry::get_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameStatus {
    Unregistered,
    Reserved,
    Registered,
    Expired,
}

/// Arguments of [`PermissionedRegistry::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterRequest {
    pub label: String,
    pub owner: Address,
    /// `None` leaves the stored subregistry untouched.
    pub subregistry: Option<Address>,
    /// `None` leaves the stored resolver untouched.
    pub resolver: Option<Address>,
    /// Initial roles of `owner` on the new resource. Admin bits are allowed.
    pub roles: RoleBitmap,
    pub expiry: u64,
}

impl RegisterRequest {
    pub fn new(label: impl Into<String>, owner: Address, roles: RoleBitmap, expiry: u64) -> Self {
        Self {
            label: label.into(),
            owner,
            subregistry: None,
            resolver: None,
            roles,
            expiry,
        }
    }

    pub fn with_subregistry(mut self, subregistry: Address) -> Self {
        self.subregistry = subregistry.non_zero();
        self
    }

    pub fn with_resolver(mut self, resolver: Address) -> Self {
        self.resolver = resolver.non_zero();
        self
    }
}

/// A validated single-token move.
struct PlannedTransfer {
    token_id: TokenId,
    role_updates: Vec<RoleUpdate>,
}

/// A token rotation computed before any role write.
struct Regeneration {
    entry: Entry,
    old_token_id: TokenId,
    owner: Address,
}

impl Regeneration {
    /// Retire the current token and mint its successor to the same owner.
    fn stage(&self, canonical: CanonicalId, batch: &mut WriteBatch) {
        batch
            .set_token_owner(self.old_token_id, None)
            .set_token_owner(self.entry.token_id(canonical), Some(self.owner))
            .set_entry(canonical, self.entry);
    }
}

pub struct PermissionedRegistry {
    store: Arc<dyn Storage>,
    access: AccessControl<dyn Storage>,
    clock: Arc<dyn Clock>,
    config: RegistryConfig,
    observers: HashMap<CanonicalId, Arc<dyn RenewalObserver>>,
    events: Vec<RegistryEvent>,
}

impl PermissionedRegistry {
    pub fn new(store: Arc<dyn Storage>, clock: Arc<dyn Clock>, config: RegistryConfig) -> Self {
        Self {
            access: AccessControl::new(Arc::clone(&store)),
            store,
            clock,
            config,
            observers: HashMap::new(),
            events: Vec::new(),
        }
    }

    /// Registry over a fresh [`MemoryStorage`] with default configuration.
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::new(
            Arc::new(MemoryStorage::new()),
            clock,
            RegistryConfig::default(),
        )
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Assign `roles` (admin bits included) on the root resource.
    ///
    /// Only allowed while nobody holds a root admin role, so a store can be
    /// bootstrapped once.
    pub fn initialize_root(&mut self, admin: &Address, roles: RoleBitmap) -> Result<RoleChange> {
        if admin.is_zero() {
            return Err(RegistryError::InvalidReceiver);
        }
        if self
            .access
            .get_assignee_count(&ROOT_RESOURCE, RoleBitmap::ALL_ADMIN)?
            != 0
        {
            return Err(RegistryError::AlreadyInitialized);
        }
        let change = self.access.assign_roles(&ROOT_RESOURCE, roles, admin)?;
        self.emit(RegistryEvent::RolesGranted {
            resource: ROOT_RESOURCE,
            account: *admin,
            roles: change.added,
            caller: *admin,
        });
        Ok(change)
    }

    /// Take the events emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<RegistryEvent> {
        std::mem::take(&mut self.events)
    }

    fn emit(&mut self, event: RegistryEvent) {
        info!(target: "registry", event = event.name(), "{}", event);
        self.events.push(event);
    }

    fn parse_label(&self, label: &str) -> Result<Label> {
        Ok(Label::parse_with_limit(label, self.config.label.max_length)?)
    }

    fn load(&self, canonical: &CanonicalId) -> Result<Entry> {
        Ok(self.store.get_entry(canonical)?)
    }

    /// Load the entry and fail with `NameExpired` unless it is live at `now`.
    fn load_live(&self, canonical: &CanonicalId, now: u64) -> Result<Entry> {
        let entry = self.load(canonical)?;
        if entry.is_expired(now) {
            return Err(RegistryError::NameExpired {
                id: entry.token_id(*canonical),
            });
        }
        Ok(entry)
    }

    fn stored_owner(&self, canonical: &CanonicalId, entry: &Entry) -> Result<Option<Address>> {
        Ok(self.store.get_token_owner(&entry.token_id(*canonical))?)
    }

    fn bump(version: u32, id: TokenId) -> Result<u32> {
        version
            .checked_add(1)
            .ok_or(RegistryError::VersionOverflow { id })
    }

    /// Retire the previous epoch of an expired entry and open a new one.
    ///
    /// Returns the retired owner, if the stale token still had one.
    fn start_new_epoch(
        &self,
        canonical: &CanonicalId,
        entry: &mut Entry,
    ) -> Result<Option<(TokenId, Address)>> {
        let old_token = entry.token_id(*canonical);
        let retired = self
            .store
            .get_token_owner(&old_token)?
            .map(|owner| (old_token, owner));
        entry.eac_version_id = Self::bump(entry.eac_version_id, old_token)?;
        entry.token_version_id = Self::bump(entry.token_version_id, old_token)?;
        Ok(retired)
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Register `request.label` and mint its token to `request.owner`.
    pub fn register(&mut self, caller: &Address, request: RegisterRequest) -> Result<TokenId> {
        let now = self.clock.now();
        let label = self.parse_label(&request.label)?;
        let canonical = label.canonical_id();

        if request.expiry <= now {
            return Err(RegistryError::CannotSetPastExpiration {
                expiry: request.expiry,
                now,
            });
        }
        if request.owner.is_zero() {
            return Err(RegistryError::InvalidReceiver);
        }

        let mut entry = self.load(&canonical)?;
        let mut retired = None;
        let mut new_epoch = false;
        if entry.exists() && !entry.is_expired(now) {
            if self.stored_owner(&canonical, &entry)?.is_some() {
                warn!(target: "registry", "Rejected registration of {}: already registered", label);
                return Err(RegistryError::NameAlreadyRegistered {
                    label: label.to_string(),
                });
            }
            self.access
                .check_roles(&ROOT_RESOURCE, Role::RegisterReserved.bit(), caller)?;
        } else {
            self.access
                .check_roles(&ROOT_RESOURCE, Role::Registrar.bit(), caller)?;
            if entry.exists() {
                retired = self.start_new_epoch(&canonical, &mut entry)?;
                new_epoch = true;
            }
        }

        let resource = entry.resource_id(canonical);
        let token_id = entry.token_id(canonical);
        let role_update = self
            .access
            .plan_grant(&resource, request.roles, &request.owner)?;

        entry.expiry = request.expiry;
        if let Some(subregistry) = request.subregistry.and_then(Address::non_zero) {
            entry.subregistry = Some(subregistry);
        }
        if let Some(resolver) = request.resolver.and_then(Address::non_zero) {
            entry.resolver = Some(resolver);
        }

        // all checks passed
        let mut batch = WriteBatch::new();
        if let Some((old_token, _)) = retired {
            batch.set_token_owner(old_token, None);
        }
        batch
            .set_entry(canonical, entry)
            .set_token_owner(token_id, Some(request.owner));
        role_update.stage(&mut batch);
        self.store.apply_batch(&batch)?;
        if new_epoch {
            self.observers.remove(&canonical);
        }

        if let Some((old_token, old_owner)) = retired {
            self.emit(RegistryEvent::TransferSingle {
                operator: *caller,
                from: Some(old_owner),
                to: None,
                token_id: old_token,
            });
        }
        self.emit(RegistryEvent::NameRegistered {
            token_id,
            label: label.to_string(),
            owner: request.owner,
            expiry: request.expiry,
            caller: *caller,
        });
        self.emit(RegistryEvent::TransferSingle {
            operator: *caller,
            from: None,
            to: Some(request.owner),
            token_id,
        });
        if let Some(subregistry) = request.subregistry.and_then(Address::non_zero) {
            self.emit(RegistryEvent::SubregistryUpdated {
                token_id,
                subregistry: Some(subregistry),
                caller: *caller,
            });
        }
        if let Some(resolver) = request.resolver.and_then(Address::non_zero) {
            self.emit(RegistryEvent::ResolverUpdated {
                token_id,
                resolver: Some(resolver),
                caller: *caller,
            });
        }
        if !role_update.change.is_empty() {
            self.emit(RegistryEvent::RolesGranted {
                resource,
                account: request.owner,
                roles: role_update.change.added,
                caller: *caller,
            });
        }

        Ok(token_id)
    }

    /// Hold `label` without an owner until `expiry`.
    pub fn reserve(
        &mut self,
        caller: &Address,
        label: &str,
        resolver: Option<Address>,
        expiry: u64,
    ) -> Result<TokenId> {
        let now = self.clock.now();
        let label = self.parse_label(label)?;
        let canonical = label.canonical_id();

        if expiry <= now {
            return Err(RegistryError::CannotSetPastExpiration { expiry, now });
        }
        self.access
            .check_roles(&ROOT_RESOURCE, Role::RegisterReserved.bit(), caller)?;

        let mut entry = self.load(&canonical)?;
        let mut retired = None;
        if entry.exists() && !entry.is_expired(now) {
            let label = label.to_string();
            return Err(if self.stored_owner(&canonical, &entry)?.is_some() {
                RegistryError::NameAlreadyRegistered { label }
            } else {
                RegistryError::NameAlreadyReserved { label }
            });
        }
        if entry.exists() {
            retired = self.start_new_epoch(&canonical, &mut entry)?;
        }

        let resolver = resolver.and_then(Address::non_zero);
        entry.expiry = expiry;
        entry.subregistry = None;
        entry.resolver = resolver;
        let token_id = entry.token_id(canonical);

        let mut batch = WriteBatch::new();
        if let Some((old_token, _)) = retired {
            batch.set_token_owner(old_token, None);
        }
        batch.set_entry(canonical, entry);
        self.store.apply_batch(&batch)?;
        self.observers.remove(&canonical);

        if let Some((old_token, old_owner)) = retired {
            self.emit(RegistryEvent::TransferSingle {
                operator: *caller,
                from: Some(old_owner),
                to: None,
                token_id: old_token,
            });
        }
        self.emit(RegistryEvent::NameReserved {
            token_id,
            label: label.to_string(),
            expiry,
            caller: *caller,
        });
        if resolver.is_some() {
            self.emit(RegistryEvent::ResolverUpdated {
                token_id,
                resolver,
                caller: *caller,
            });
        }
        Ok(token_id)
    }

    /// Extend the expiry of a live name.
    pub fn renew(
        &mut self,
        caller: &Address,
        id: impl Into<CanonicalId>,
        new_expiry: u64,
    ) -> Result<()> {
        let now = self.clock.now();
        let canonical = id.into();
        let mut entry = self.load_live(&canonical, now)?;
        let token_id = entry.token_id(canonical);
        self.access
            .check_roles(&entry.resource_id(canonical), Role::Renew.bit(), caller)?;

        if new_expiry <= entry.expiry {
            return Err(RegistryError::CannotReduceExpiration {
                id: token_id,
                old_expiry: entry.expiry,
                new_expiry,
            });
        }

        if let Some(observer) = self.observers.get(&canonical) {
            if let Err(err) = observer.on_renew(&token_id, new_expiry, caller) {
                warn!(target: "registry", "Renewal of {} aborted by observer: {}", token_id, err);
                return Err(err.into());
            }
        }

        entry.expiry = new_expiry;
        self.store.set_entry(&canonical, &entry)?;
        self.emit(RegistryEvent::ExpiryUpdated {
            token_id,
            new_expiry,
            caller: *caller,
        });
        Ok(())
    }

    pub fn set_subregistry(
        &mut self,
        caller: &Address,
        id: impl Into<CanonicalId>,
        subregistry: Option<Address>,
    ) -> Result<()> {
        let now = self.clock.now();
        let canonical = id.into();
        let mut entry = self.load_live(&canonical, now)?;
        self.access.check_roles(
            &entry.resource_id(canonical),
            Role::SetSubregistry.bit(),
            caller,
        )?;

        let subregistry = subregistry.and_then(Address::non_zero);
        entry.subregistry = subregistry;
        self.store.set_entry(&canonical, &entry)?;
        self.emit(RegistryEvent::SubregistryUpdated {
            token_id: entry.token_id(canonical),
            subregistry,
            caller: *caller,
        });
        Ok(())
    }

    pub fn set_resolver(
        &mut self,
        caller: &Address,
        id: impl Into<CanonicalId>,
        resolver: Option<Address>,
    ) -> Result<()> {
        let now = self.clock.now();
        let canonical = id.into();
        let mut entry = self.load_live(&canonical, now)?;
        self.access.check_roles(
            &entry.resource_id(canonical),
            Role::SetResolver.bit(),
            caller,
        )?;

        let resolver = resolver.and_then(Address::non_zero);
        entry.resolver = resolver;
        self.store.set_entry(&canonical, &entry)?;
        self.emit(RegistryEvent::ResolverUpdated {
            token_id: entry.token_id(canonical),
            resolver,
            caller: *caller,
        });
        Ok(())
    }

    /// Install or remove the renewal observer of a live name.
    pub fn set_token_observer(
        &mut self,
        caller: &Address,
        id: impl Into<CanonicalId>,
        observer: Option<Arc<dyn RenewalObserver>>,
    ) -> Result<()> {
        let now = self.clock.now();
        let canonical = id.into();
        let entry = self.load_live(&canonical, now)?;
        self.access.check_roles(
            &entry.resource_id(canonical),
            Role::SetTokenObserver.bit(),
            caller,
        )?;

        let installed = observer.is_some();
        match observer {
            Some(observer) => {
                self.observers.insert(canonical, observer);
            }
            None => {
                self.observers.remove(&canonical);
            }
        }
        self.emit(RegistryEvent::TokenObserverUpdated {
            token_id: entry.token_id(canonical),
            installed,
            caller: *caller,
        });
        Ok(())
    }

    pub fn unregister(&mut self, caller: &Address, id: impl Into<CanonicalId>) -> Result<()> {
        let token_id = self.retire(caller, id.into(), Role::Unregister)?;
        self.emit(RegistryEvent::NameUnregistered {
            token_id,
            caller: *caller,
        });
        Ok(())
    }

    pub fn burn(&mut self, caller: &Address, id: impl Into<CanonicalId>) -> Result<()> {
        let token_id = self.retire(caller, id.into(), Role::Burn)?;
        self.emit(RegistryEvent::NameBurned {
            token_id,
            caller: *caller,
        });
        Ok(())
    }

    /// Expire a live name immediately, clear its references and retire its token.
    fn retire(&mut self, caller: &Address, canonical: CanonicalId, role: Role) -> Result<TokenId> {
        let now = self.clock.now();
        let mut entry = self.load_live(&canonical, now)?;
        self.access
            .check_roles(&entry.resource_id(canonical), role.bit(), caller)?;

        let token_id = entry.token_id(canonical);
        let owner = self.store.get_token_owner(&token_id)?;

        entry.expiry = now;
        entry.subregistry = None;
        entry.resolver = None;
        let mut batch = WriteBatch::new();
        batch.set_entry(canonical, entry);
        if owner.is_some() {
            batch.set_token_owner(token_id, None);
        }
        self.store.apply_batch(&batch)?;
        self.observers.remove(&canonical);

        if let Some(owner) = owner {
            self.emit(RegistryEvent::TransferSingle {
                operator: *caller,
                from: Some(owner),
                to: None,
                token_id,
            });
        }
        Ok(token_id)
    }

    // ---------------------------------------------------------------------
    // Transfers
    // ---------------------------------------------------------------------

    fn check_operator(&self, caller: &Address, from: &Address) -> Result<()> {
        if caller != from && !self.store.is_approved_for_all(from, caller)? {
            return Err(RegistryError::MissingApproval {
                owner: *from,
                operator: *caller,
            });
        }
        Ok(())
    }

    fn plan_transfer(
        &self,
        from: &Address,
        to: &Address,
        token_id: TokenId,
        now: u64,
    ) -> Result<PlannedTransfer> {
        let canonical = token_id.canonical_id();
        let entry = self.load(&canonical)?;
        let owned = entry.token_id(canonical) == token_id
            && !entry.is_expired(now)
            && self.store.get_token_owner(&token_id)?.as_ref() == Some(from);
        if !owned {
            return Err(RegistryError::InsufficientBalance {
                token_id,
                account: *from,
            });
        }

        let resource = entry.resource_id(canonical);
        if !self
            .access
            .has_roles(&resource, Role::CanTransfer.bit(), from)?
        {
            warn!(target: "registry", "Transfer of {} blocked: {} lacks can_transfer", token_id, from);
            return Err(RegistryError::TransferDisallowed {
                token_id,
                owner: *from,
            });
        }

        Ok(PlannedTransfer {
            token_id,
            role_updates: self.access.plan_transfer(&resource, from, to)?,
        })
    }

    fn stage_transfer(to: &Address, plan: &PlannedTransfer, batch: &mut WriteBatch) {
        batch.set_token_owner(plan.token_id, Some(*to));
        for update in &plan.role_updates {
            update.stage(batch);
        }
    }

    /// Move one token, and its owner's roles on the name, from `from` to `to`.
    pub fn safe_transfer_from(
        &mut self,
        caller: &Address,
        from: &Address,
        to: &Address,
        token_id: TokenId,
    ) -> Result<()> {
        let now = self.clock.now();
        self.check_operator(caller, from)?;
        if to.is_zero() {
            return Err(RegistryError::InvalidReceiver);
        }
        let plan = self.plan_transfer(from, to, token_id, now)?;

        let mut batch = WriteBatch::new();
        Self::stage_transfer(to, &plan, &mut batch);
        self.store.apply_batch(&batch)?;
        self.emit(RegistryEvent::TransferSingle {
            operator: *caller,
            from: Some(*from),
            to: Some(*to),
            token_id,
        });
        Ok(())
    }

    /// Move several tokens at once. Nothing is written unless every item passes.
    pub fn safe_batch_transfer_from(
        &mut self,
        caller: &Address,
        from: &Address,
        to: &Address,
        token_ids: &[TokenId],
    ) -> Result<()> {
        let now = self.clock.now();
        self.check_operator(caller, from)?;
        if to.is_zero() {
            return Err(RegistryError::InvalidReceiver);
        }

        let mut seen = HashSet::with_capacity(token_ids.len());
        let mut plans = Vec::with_capacity(token_ids.len());
        for token_id in token_ids {
            if !seen.insert(token_id.canonical_id()) {
                return Err(RegistryError::DuplicateTokenId {
                    token_id: *token_id,
                });
            }
            plans.push(self.plan_transfer(from, to, *token_id, now)?);
        }

        let mut batch = WriteBatch::new();
        for plan in &plans {
            Self::stage_transfer(to, plan, &mut batch);
        }
        self.store.apply_batch(&batch)?;
        debug!(target: "registry", "Batch of {} tokens moved from {} to {}", plans.len(), from, to);
        self.emit(RegistryEvent::TransferBatch {
            operator: *caller,
            from: *from,
            to: *to,
            token_ids: token_ids.to_vec(),
        });
        Ok(())
    }

    pub fn set_approval_for_all(
        &mut self,
        caller: &Address,
        operator: &Address,
        approved: bool,
    ) -> Result<()> {
        self.store.set_approval_for_all(caller, operator, approved)?;
        self.emit(RegistryEvent::ApprovalForAll {
            owner: *caller,
            operator: *operator,
            approved,
        });
        Ok(())
    }

    pub fn is_approved_for_all(&self, owner: &Address, operator: &Address) -> Result<bool> {
        Ok(self.store.is_approved_for_all(owner, operator)?)
    }

    // ---------------------------------------------------------------------
    // Roles
    // ---------------------------------------------------------------------

    /// Grant regular roles on the name's current resource.
    ///
    /// An effective change on a live, owned name regenerates its token.
    pub fn grant_roles(
        &mut self,
        caller: &Address,
        id: impl Into<CanonicalId>,
        roles: RoleBitmap,
        account: &Address,
    ) -> Result<RoleChange> {
        let now = self.clock.now();
        let canonical = id.into();
        let entry = self.load(&canonical)?;
        let resource = entry.resource_id(canonical);

        let update = self.access.authorize_grant(&resource, roles, account, caller)?;
        if update.change.is_empty() {
            return Ok(update.change);
        }
        let regeneration = self.plan_regeneration(canonical, entry, now)?;

        let mut batch = WriteBatch::new();
        update.stage(&mut batch);
        if let Some(regeneration) = &regeneration {
            regeneration.stage(canonical, &mut batch);
        }
        self.store.apply_batch(&batch)?;

        self.emit(RegistryEvent::RolesGranted {
            resource,
            account: *account,
            roles: update.change.added,
            caller: *caller,
        });
        if let Some(regeneration) = regeneration {
            self.emit(RegistryEvent::TokenRegenerated {
                old_token_id: regeneration.old_token_id,
                new_token_id: regeneration.entry.token_id(canonical),
                caller: *caller,
            });
        }
        Ok(update.change)
    }

    /// Revoke roles (admin bits included) on the name's current resource.
    pub fn revoke_roles(
        &mut self,
        caller: &Address,
        id: impl Into<CanonicalId>,
        roles: RoleBitmap,
        account: &Address,
    ) -> Result<RoleChange> {
        let now = self.clock.now();
        let canonical = id.into();
        let entry = self.load(&canonical)?;
        let resource = entry.resource_id(canonical);

        let update = self.access.authorize_revoke(&resource, roles, account, caller)?;
        if update.change.is_empty() {
            return Ok(update.change);
        }
        let regeneration = self.plan_regeneration(canonical, entry, now)?;

        let mut batch = WriteBatch::new();
        update.stage(&mut batch);
        if let Some(regeneration) = &regeneration {
            regeneration.stage(canonical, &mut batch);
        }
        self.store.apply_batch(&batch)?;

        self.emit(RegistryEvent::RolesRevoked {
            resource,
            account: *account,
            roles: update.change.removed,
            caller: *caller,
        });
        if let Some(regeneration) = regeneration {
            self.emit(RegistryEvent::TokenRegenerated {
                old_token_id: regeneration.old_token_id,
                new_token_id: regeneration.entry.token_id(canonical),
                caller: *caller,
            });
        }
        Ok(update.change)
    }

    pub fn grant_root_roles(
        &mut self,
        caller: &Address,
        roles: RoleBitmap,
        account: &Address,
    ) -> Result<RoleChange> {
        let change = self.access.grant_root_roles(roles, account, caller)?;
        if !change.is_empty() {
            self.emit(RegistryEvent::RolesGranted {
                resource: ROOT_RESOURCE,
                account: *account,
                roles: change.added,
                caller: *caller,
            });
        }
        Ok(change)
    }

    pub fn revoke_root_roles(
        &mut self,
        caller: &Address,
        roles: RoleBitmap,
        account: &Address,
    ) -> Result<RoleChange> {
        let change = self.access.revoke_root_roles(roles, account, caller)?;
        if !change.is_empty() {
            self.emit(RegistryEvent::RolesRevoked {
                resource: ROOT_RESOURCE,
                account: *account,
                roles: change.removed,
                caller: *caller,
            });
        }
        Ok(change)
    }

    /// Work out the token rotation a role change on `entry` would cause.
    ///
    /// `None` for expired or owner-less names.
    fn plan_regeneration(
        &self,
        canonical: CanonicalId,
        mut entry: Entry,
        now: u64,
    ) -> Result<Option<Regeneration>> {
        if entry.is_expired(now) {
            return Ok(None);
        }
        let old_token_id = entry.token_id(canonical);
        let Some(owner) = self.store.get_token_owner(&old_token_id)? else {
            return Ok(None);
        };
        entry.token_version_id = Self::bump(entry.token_version_id, old_token_id)?;
        Ok(Some(Regeneration {
            entry,
            old_token_id,
            owner,
        }))
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Whether `account` holds every bit of `roles` on the name's current
    /// resource or on the root.
    pub fn has_roles(
        &self,
        id: impl Into<CanonicalId>,
        roles: RoleBitmap,
        account: &Address,
    ) -> Result<bool> {
        let resource = self.get_resource(id)?;
        Ok(self.access.has_roles(&resource, roles, account)?)
    }

    pub fn has_root_roles(&self, roles: RoleBitmap, account: &Address) -> Result<bool> {
        Ok(self.access.has_root_roles(roles, account)?)
    }

    /// Bitmap `account` holds directly on the name's current resource.
    pub fn roles_of(&self, id: impl Into<CanonicalId>, account: &Address) -> Result<RoleBitmap> {
        let resource = self.get_resource(id)?;
        Ok(self.access.roles_of(&resource, account)?)
    }

    pub fn get_assignee_count(&self, id: impl Into<CanonicalId>, query: RoleBitmap) -> Result<u128> {
        let resource = self.get_resource(id)?;
        Ok(self.access.get_assignee_count(&resource, query)?)
    }

    /// Holder counts on an explicit resource, current or orphaned.
    pub fn get_resource_assignee_count(
        &self,
        resource: &ResourceId,
        query: RoleBitmap,
    ) -> Result<u128> {
        Ok(self.access.get_assignee_count(resource, query)?)
    }

    pub fn get_entry(&self, id: impl Into<CanonicalId>) -> Result<Entry> {
        self.load(&id.into())
    }

    pub fn get_resource(&self, id: impl Into<CanonicalId>) -> Result<ResourceId> {
        let canonical = id.into();
        Ok(self.load(&canonical)?.resource_id(canonical))
    }

    pub fn get_token_id(&self, id: impl Into<CanonicalId>) -> Result<TokenId> {
        let canonical = id.into();
        Ok(self.load(&canonical)?.token_id(canonical))
    }

    pub fn get_expiry(&self, id: impl Into<CanonicalId>) -> Result<u64> {
        Ok(self.load(&id.into())?.expiry)
    }

    pub fn get_status(&self, id: impl Into<CanonicalId>) -> Result<NameStatus> {
        let now = self.clock.now();
        let canonical = id.into();
        let entry = self.load(&canonical)?;
        if !entry.exists() {
            return Ok(NameStatus::Unregistered);
        }
        let owner = self.stored_owner(&canonical, &entry)?;
        Ok(match (entry.is_expired(now), owner) {
            (false, Some(_)) => NameStatus::Registered,
            (false, None) => NameStatus::Reserved,
            (true, Some(_)) => NameStatus::Expired,
            (true, None) => NameStatus::Unregistered,
        })
    }

    /// Owner of `token_id` if it is the name's current token and the name is live.
    pub fn owner_of(&self, token_id: &TokenId) -> Result<Option<Address>> {
        let now = self.clock.now();
        let canonical = token_id.canonical_id();
        let entry = self.load(&canonical)?;
        if entry.token_id(canonical) != *token_id || entry.is_expired(now) {
            return Ok(None);
        }
        Ok(self.store.get_token_owner(token_id)?)
    }

    /// Owner recorded for the name's current token, ignoring expiry.
    pub fn latest_owner_of(&self, id: impl Into<CanonicalId>) -> Result<Option<Address>> {
        let canonical = id.into();
        let entry = self.load(&canonical)?;
        self.stored_owner(&canonical, &entry)
    }

    /// Subregistry of a live name.
    pub fn get_subregistry(&self, id: impl Into<CanonicalId>) -> Result<Option<Address>> {
        let entry = self.load(&id.into())?;
        Ok(if entry.is_expired(self.clock.now()) {
            None
        } else {
            entry.subregistry
        })
    }

    /// Resolver of a live name.
    pub fn get_resolver(&self, id: impl Into<CanonicalId>) -> Result<Option<Address>> {
        let entry = self.load(&id.into())?;
        Ok(if entry.is_expired(self.clock.now()) {
            None
        } else {
            entry.resolver
        })
    }

    pub fn has_observer(&self, id: impl Into<CanonicalId>) -> bool {
        self.observers.contains_key(&id.into())
    }
}
