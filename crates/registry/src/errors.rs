//! Error types for the permissioned registry

use crate::observer::ObserverError;
use permreg_access_control::AccessControlError;
use permreg_types::{Address, CodecError, TokenId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error(transparent)]
    Access(#[from] AccessControlError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Renewal observer failed: {0}")]
    Observer(#[from] ObserverError),

    #[error("Name already registered: {label}")]
    NameAlreadyRegistered { label: String },

    #[error("Name already reserved: {label}")]
    NameAlreadyReserved { label: String },

    #[error("Name expired: {id}")]
    NameExpired { id: TokenId },

    #[error("Cannot reduce expiration of {id} from {old_expiry} to {new_expiry}")]
    CannotReduceExpiration {
        id: TokenId,
        old_expiry: u64,
        new_expiry: u64,
    },

    #[error("Expiry {expiry} is not in the future (now {now})")]
    CannotSetPastExpiration { expiry: u64, now: u64 },

    #[error("Transfer of {token_id} disallowed: owner {owner} lacks the transfer role")]
    TransferDisallowed { token_id: TokenId, owner: Address },

    #[error("Account {account} does not own {token_id}")]
    InsufficientBalance { token_id: TokenId, account: Address },

    #[error("Operator {operator} is not approved by {owner}")]
    MissingApproval { owner: Address, operator: Address },

    #[error("Invalid receiver: the zero address cannot hold tokens")]
    InvalidReceiver,

    #[error("Token {token_id} appears more than once in the batch")]
    DuplicateTokenId { token_id: TokenId },

    #[error("Version counter exhausted for {id}")]
    VersionOverflow { id: TokenId },

    #[error("Root roles already assigned")]
    AlreadyInitialized,

    #[error("Registry storage error: {0}")]
    Storage(#[from] anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RegistryError {
    /// True for errors caused by the name's lifecycle state.
    pub fn is_name_state(&self) -> bool {
        matches!(
            self,
            RegistryError::NameAlreadyRegistered { .. }
                | RegistryError::NameAlreadyReserved { .. }
                | RegistryError::NameExpired { .. }
                | RegistryError::CannotReduceExpiration { .. }
        )
    }

    /// True for missing-role failures.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            RegistryError::Access(AccessControlError::Unauthorized { .. })
        )
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
