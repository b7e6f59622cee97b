//! Resource-scoped access control
//!
//! Every resource carries one [`RoleBitmap`](permreg_types::RoleBitmap) per
//! account. Holding the admin bit of a role on a resource (or on
//! [`ROOT_RESOURCE`](permreg_types::ROOT_RESOURCE)) authorises granting and
//! revoking that role there. Admin bits themselves are only ever assigned when
//! a resource is created; they can be revoked but never granted.

pub mod access;
pub mod errors;

pub use access::{AccessControl, RoleChange, RoleUpdate};
pub use errors::*;
