//! Role checks, admin-gated grants and revocations, and assignee counting.

use crate::errors::{AccessControlError, Result};
use permreg_storage::{RoleStorage, WriteBatch};
use permreg_types::{Address, AssigneeCounts, ResourceId, RoleBitmap, ROOT_RESOURCE};
use std::sync::Arc;
use tracing::{debug, info};

/// Net effect of a role mutation on one account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleChange {
    pub resource: ResourceId,
    pub account: Address,
    pub added: RoleBitmap,
    pub removed: RoleBitmap,
}

impl RoleChange {
    /// True when the call left the bitmap untouched.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// A validated role write that has not been committed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleUpdate {
    pub resource: ResourceId,
    pub account: Address,
    /// Bitmap the account will hold afterwards.
    pub roles: RoleBitmap,
    /// Resource counts afterwards.
    pub counts: AssigneeCounts,
    pub change: RoleChange,
}

impl RoleUpdate {
    /// Add this update to `batch` instead of committing it alone.
    /// Empty changes are skipped, as in [`AccessControl::commit`].
    pub fn stage(&self, batch: &mut WriteBatch) {
        if !self.change.is_empty() {
            batch.set_roles(self.resource, self.account, self.roles, self.counts);
        }
    }
}

/// Access-control layer over a [`RoleStorage`] backend.
pub struct AccessControl<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for AccessControl<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

fn ensure_valid(roles: RoleBitmap) -> Result<()> {
    if !roles.is_valid() {
        return Err(AccessControlError::InvalidRoleBitmap { bitmap: roles });
    }
    Ok(())
}

impl<S: RoleStorage + ?Sized> AccessControl<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Bitmap stored for `account` on exactly `resource` (root not included).
    pub fn roles_of(&self, resource: &ResourceId, account: &Address) -> Result<RoleBitmap> {
        Ok(self.store.get_roles(resource, account)?)
    }

    /// Bitmap held on `resource` combined with the root bitmap.
    fn effective_roles(&self, resource: &ResourceId, account: &Address) -> Result<RoleBitmap> {
        let mut roles = self.roles_of(resource, account)?;
        if !resource.is_root() {
            roles |= self.roles_of(&ROOT_RESOURCE, account)?;
        }
        Ok(roles)
    }

    pub fn has_roles(
        &self,
        resource: &ResourceId,
        roles: RoleBitmap,
        account: &Address,
    ) -> Result<bool> {
        Ok(self.effective_roles(resource, account)?.contains(roles))
    }

    pub fn has_root_roles(&self, roles: RoleBitmap, account: &Address) -> Result<bool> {
        self.has_roles(&ROOT_RESOURCE, roles, account)
    }

    /// Fail with [`AccessControlError::Unauthorized`] unless every bit is held.
    pub fn check_roles(
        &self,
        resource: &ResourceId,
        roles: RoleBitmap,
        account: &Address,
    ) -> Result<()> {
        if !self.has_roles(resource, roles, account)? {
            debug!(
                target: "access_control",
                "Denied {} on {}: missing {}",
                account, resource, roles
            );
            return Err(AccessControlError::Unauthorized {
                resource: *resource,
                required: roles,
                account: *account,
            });
        }
        Ok(())
    }

    /// Holder counts for each role in `query`, placed at that role's slot.
    pub fn get_assignee_count(&self, resource: &ResourceId, query: RoleBitmap) -> Result<u128> {
        if query.is_empty() {
            return Ok(0);
        }
        Ok(self.store.get_assignee_counts(resource)?.masked(query))
    }

    /// Compute the write that adds `roles` to `account`, without authorisation.
    ///
    /// Fails with [`AccessControlError::MaxAssigneesExceeded`] if any newly
    /// added role is already at the ceiling.
    pub fn plan_grant(
        &self,
        resource: &ResourceId,
        roles: RoleBitmap,
        account: &Address,
    ) -> Result<RoleUpdate> {
        ensure_valid(roles)?;
        let current = self.roles_of(resource, account)?;
        let added = roles & !current;
        let counts = self
            .store
            .get_assignee_counts(resource)?
            .try_add(added)
            .map_err(|pos| AccessControlError::MaxAssigneesExceeded {
                resource: *resource,
                role: RoleBitmap(1u128 << pos),
            })?;

        Ok(RoleUpdate {
            resource: *resource,
            account: *account,
            roles: current | roles,
            counts,
            change: RoleChange {
                resource: *resource,
                account: *account,
                added,
                removed: RoleBitmap::EMPTY,
            },
        })
    }

    /// Compute the write that removes `roles` from `account`, without authorisation.
    pub fn plan_revoke(
        &self,
        resource: &ResourceId,
        roles: RoleBitmap,
        account: &Address,
    ) -> Result<RoleUpdate> {
        ensure_valid(roles)?;
        let current = self.roles_of(resource, account)?;
        let removed = roles & current;
        let counts = self.store.get_assignee_counts(resource)?.remove(removed);

        Ok(RoleUpdate {
            resource: *resource,
            account: *account,
            roles: current & !roles,
            counts,
            change: RoleChange {
                resource: *resource,
                account: *account,
                added: RoleBitmap::EMPTY,
                removed,
            },
        })
    }

    /// Compute the writes that move every role `from` holds on `resource` to `to`.
    ///
    /// Roles `from` holds through the root resource are not moved.
    pub fn plan_transfer(
        &self,
        resource: &ResourceId,
        from: &Address,
        to: &Address,
    ) -> Result<Vec<RoleUpdate>> {
        if from == to {
            return Ok(Vec::new());
        }
        let moving = self.roles_of(resource, from)?;
        if moving.is_empty() {
            return Ok(Vec::new());
        }

        let counts = self.store.get_assignee_counts(resource)?.remove(moving);
        let receiving = self.roles_of(resource, to)?;
        let added = moving & !receiving;
        let final_counts =
            counts
                .try_add(added)
                .map_err(|pos| AccessControlError::MaxAssigneesExceeded {
                    resource: *resource,
                    role: RoleBitmap(1u128 << pos),
                })?;

        Ok(vec![
            RoleUpdate {
                resource: *resource,
                account: *from,
                roles: RoleBitmap::EMPTY,
                counts,
                change: RoleChange {
                    resource: *resource,
                    account: *from,
                    added: RoleBitmap::EMPTY,
                    removed: moving,
                },
            },
            RoleUpdate {
                resource: *resource,
                account: *to,
                roles: receiving | moving,
                counts: final_counts,
                change: RoleChange {
                    resource: *resource,
                    account: *to,
                    added,
                    removed: RoleBitmap::EMPTY,
                },
            },
        ])
    }

    /// Persist a planned update. Empty changes are skipped.
    pub fn commit(&self, update: &RoleUpdate) -> Result<()> {
        if update.change.is_empty() {
            return Ok(());
        }
        self.store.apply_role_update(
            &update.resource,
            &update.account,
            update.roles,
            update.counts,
        )?;
        debug!(
            target: "access_control",
            "Roles of {} on {} now {} (+{} -{})",
            update.account,
            update.resource,
            update.roles,
            update.change.added,
            update.change.removed
        );
        Ok(())
    }

    /// Assign roles at resource creation. Admin bits are allowed here.
    pub fn assign_roles(
        &self,
        resource: &ResourceId,
        roles: RoleBitmap,
        account: &Address,
    ) -> Result<RoleChange> {
        let update = self.plan_grant(resource, roles, account)?;
        self.commit(&update)?;
        Ok(update.change)
    }

    /// Validate and authorise a grant without writing it.
    pub fn authorize_grant(
        &self,
        resource: &ResourceId,
        roles: RoleBitmap,
        account: &Address,
        caller: &Address,
    ) -> Result<RoleUpdate> {
        ensure_valid(roles)?;
        if roles.has_admin_bits() {
            return Err(AccessControlError::CannotGrantAdminRoles {
                resource: *resource,
                roles,
                account: *caller,
            });
        }
        self.check_roles(resource, roles.required_admin(), caller)?;
        self.plan_grant(resource, roles, account)
    }

    /// Grant regular roles; the caller needs the matching admin bits.
    pub fn grant_roles(
        &self,
        resource: &ResourceId,
        roles: RoleBitmap,
        account: &Address,
        caller: &Address,
    ) -> Result<RoleChange> {
        let update = self.authorize_grant(resource, roles, account, caller)?;
        self.commit(&update)?;
        if !update.change.is_empty() {
            info!(
                target: "access_control",
                "{} granted {} to {} on {}",
                caller, update.change.added, account, resource
            );
        }
        Ok(update.change)
    }

    /// Validate and authorise a revocation without writing it.
    pub fn authorize_revoke(
        &self,
        resource: &ResourceId,
        roles: RoleBitmap,
        account: &Address,
        caller: &Address,
    ) -> Result<RoleUpdate> {
        ensure_valid(roles)?;
        self.check_roles(resource, roles.required_admin(), caller)?;
        self.plan_revoke(resource, roles, account)
    }

    /// Revoke regular and/or admin roles; the caller needs the matching admin bits.
    pub fn revoke_roles(
        &self,
        resource: &ResourceId,
        roles: RoleBitmap,
        account: &Address,
        caller: &Address,
    ) -> Result<RoleChange> {
        let update = self.authorize_revoke(resource, roles, account, caller)?;
        self.commit(&update)?;
        if !update.change.is_empty() {
            info!(
                target: "access_control",
                "{} revoked {} from {} on {}",
                caller, update.change.removed, account, resource
            );
        }
        Ok(update.change)
    }

    pub fn grant_root_roles(
        &self,
        roles: RoleBitmap,
        account: &Address,
        caller: &Address,
    ) -> Result<RoleChange> {
        self.grant_roles(&ROOT_RESOURCE, roles, account, caller)
    }

    pub fn revoke_root_roles(
        &self,
        roles: RoleBitmap,
        account: &Address,
        caller: &Address,
    ) -> Result<RoleChange> {
        self.revoke_roles(&ROOT_RESOURCE, roles, account, caller)
    }

    /// Move every role `from` holds on `resource` to `to`.
    pub fn transfer_roles(&self, resource: &ResourceId, from: &Address, to: &Address) -> Result<()> {
        for update in self.plan_transfer(resource, from, to)? {
            self.commit(&update)?;
        }
        Ok(())
    }
}
