//! Renewal observer capability
//!
//! An observer is attached to a name by a holder of `SetTokenObserver` and is
//! consulted on every renewal before anything is written. Any error aborts the
//! renewal and is returned to the caller unchanged.

use permreg_types::{Address, TokenId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ObserverError {
    #[error("Renewal of {token_id} rejected: {reason}")]
    Rejected { token_id: TokenId, reason: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub trait RenewalObserver: Send + Sync {
    fn on_renew(
        &self,
        token_id: &TokenId,
        new_expiry: u64,
        caller: &Address,
    ) -> Result<(), ObserverError>;
}

impl<F> RenewalObserver for F
where
    F: Fn(&TokenId, u64, &Address) -> Result<(), ObserverError> + Send + Sync,
{
    fn on_renew(
        &self,
        token_id: &TokenId,
        new_expiry: u64,
        caller: &Address,
    ) -> Result<(), ObserverError> {
        self(token_id, new_expiry, caller)
    }
}
