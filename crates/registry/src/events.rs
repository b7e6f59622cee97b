//! Change notifications emitted by registry operations

use permreg_types::{Address, ResourceId, RoleBitmap, TokenId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One logical effect of a state-changing call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RegistryEvent {
    NameRegistered {
        token_id: TokenId,
        label: String,
        owner: Address,
        expiry: u64,
        caller: Address,
    },
    NameReserved {
        token_id: TokenId,
        label: String,
        expiry: u64,
        caller: Address,
    },
    ExpiryUpdated {
        token_id: TokenId,
        new_expiry: u64,
        caller: Address,
    },
    SubregistryUpdated {
        token_id: TokenId,
        subregistry: Option<Address>,
        caller: Address,
    },
    ResolverUpdated {
        token_id: TokenId,
        resolver: Option<Address>,
        caller: Address,
    },
    TokenObserverUpdated {
        token_id: TokenId,
        installed: bool,
        caller: Address,
    },
    NameUnregistered {
        token_id: TokenId,
        caller: Address,
    },
    NameBurned {
        token_id: TokenId,
        caller: Address,
    },
    TokenRegenerated {
        old_token_id: TokenId,
        new_token_id: TokenId,
        caller: Address,
    },
    RolesGranted {
        resource: ResourceId,
        account: Address,
        roles: RoleBitmap,
        caller: Address,
    },
    RolesRevoked {
        resource: ResourceId,
        account: Address,
        roles: RoleBitmap,
        caller: Address,
    },
    /// `from: None` is a mint, `to: None` retires the token.
    TransferSingle {
        operator: Address,
        from: Option<Address>,
        to: Option<Address>,
        token_id: TokenId,
    },
    TransferBatch {
        operator: Address,
        from: Address,
        to: Address,
        token_ids: Vec<TokenId>,
    },
    ApprovalForAll {
        owner: Address,
        operator: Address,
        approved: bool,
    },
}

impl RegistryEvent {
    pub fn name(&self) -> &'static str {
        match self {
            RegistryEvent::NameRegistered { .. } => "name_registered",
            RegistryEvent::NameReserved { .. } => "name_reserved",
            RegistryEvent::ExpiryUpdated { .. } => "expiry_updated",
            RegistryEvent::SubregistryUpdated { .. } => "subregistry_updated",
            RegistryEvent::ResolverUpdated { .. } => "resolver_updated",
            RegistryEvent::TokenObserverUpdated { .. } => "token_observer_updated",
            RegistryEvent::NameUnregistered { .. } => "name_unregistered",
            RegistryEvent::NameBurned { .. } => "name_burned",
            RegistryEvent::TokenRegenerated { .. } => "token_regenerated",
            RegistryEvent::RolesGranted { .. } => "roles_granted",
            RegistryEvent::RolesRevoked { .. } => "roles_revoked",
            RegistryEvent::TransferSingle { .. } => "transfer_single",
            RegistryEvent::TransferBatch { .. } => "transfer_batch",
            RegistryEvent::ApprovalForAll { .. } => "approval_for_all",
        }
    }
}

fn opt(addr: &Option<Address>) -> String {
    addr.map(|a| a.to_string())
        .unwrap_or_else(|| "none".to_string())
}

impl fmt::Display for RegistryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryEvent::NameRegistered {
                token_id,
                label,
                owner,
                expiry,
                caller,
            } => write!(
                f,
                "{caller} registered {label:?} as {token_id} for {owner} until {expiry}"
            ),
            RegistryEvent::NameReserved {
                token_id,
                label,
                expiry,
                caller,
            } => write!(f, "{caller} reserved {label:?} as {token_id} until {expiry}"),
            RegistryEvent::ExpiryUpdated {
                token_id,
                new_expiry,
                caller,
            } => write!(f, "{caller} renewed {token_id} until {new_expiry}"),
            RegistryEvent::SubregistryUpdated {
                token_id,
                subregistry,
                caller,
            } => write!(
                f,
                "{caller} set subregistry of {token_id} to {}",
                opt(subregistry)
            ),
            RegistryEvent::ResolverUpdated {
                token_id,
                resolver,
                caller,
            } => write!(f, "{caller} set resolver of {token_id} to {}", opt(resolver)),
            RegistryEvent::TokenObserverUpdated {
                token_id,
                installed,
                caller,
            } => {
                let action = if *installed { "installed" } else { "removed" };
                write!(f, "{caller} {action} renewal observer on {token_id}")
            }
            RegistryEvent::NameUnregistered { token_id, caller } => {
                write!(f, "{caller} unregistered {token_id}")
            }
            RegistryEvent::NameBurned { token_id, caller } => {
                write!(f, "{caller} burned {token_id}")
            }
            RegistryEvent::TokenRegenerated {
                old_token_id,
                new_token_id,
                caller,
            } => write!(f, "{caller} regenerated {old_token_id} as {new_token_id}"),
            RegistryEvent::RolesGranted {
                resource,
                account,
                roles,
                caller,
            } => write!(f, "{caller} granted {roles} to {account} on {resource}"),
            RegistryEvent::RolesRevoked {
                resource,
                account,
                roles,
                caller,
            } => write!(f, "{caller} revoked {roles} from {account} on {resource}"),
            RegistryEvent::TransferSingle {
                operator,
                from,
                to,
                token_id,
            } => write!(
                f,
                "{operator} moved {token_id} from {} to {}",
                opt(from),
                opt(to)
            ),
            RegistryEvent::TransferBatch {
                operator,
                from,
                to,
                token_ids,
            } => write!(
                f,
                "{operator} moved {} tokens from {from} to {to}",
                token_ids.len()
            ),
            RegistryEvent::ApprovalForAll {
                owner,
                operator,
                approved,
            } => write!(f, "{owner} set approval of {operator} to {approved}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use permreg_types::CanonicalId;

    #[test]
    fn serializes_with_event_tag() {
        let token_id = CanonicalId::from_bytes([0xAB; 32]).token_id(1);
        let event = RegistryEvent::TransferSingle {
            operator: Address::from_low_u64(1),
            from: None,
            to: Some(Address::from_low_u64(2)),
            token_id,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "transfer_single");
        assert_eq!(json["token_id"], token_id.to_string());
        assert!(json["from"].is_null());
        assert_eq!(event.name(), "transfer_single");
    }
}
