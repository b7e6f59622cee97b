//! Error types for role checks and role mutations

use permreg_types::{Address, ResourceId, RoleBitmap};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AccessControlError {
    #[error("Unauthorized: {account} lacks roles {required} on resource {resource}")]
    Unauthorized {
        resource: ResourceId,
        required: RoleBitmap,
        account: Address,
    },

    #[error("Admin roles {roles} cannot be granted on resource {resource} (requested by {account})")]
    CannotGrantAdminRoles {
        resource: ResourceId,
        roles: RoleBitmap,
        account: Address,
    },

    #[error("Invalid role bitmap: {bitmap}")]
    InvalidRoleBitmap { bitmap: RoleBitmap },

    #[error("Assignee limit reached for role {role} on resource {resource}")]
    MaxAssigneesExceeded {
        resource: ResourceId,
        role: RoleBitmap,
    },

    #[error("Role storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AccessControlError>;
