//! Durable per-name record and its two-word packed layout.
//!
//! Each word is a big-endian 256-bit integer; fields are packed from the least
//! significant bit upwards:
//!
//! ```text
//! word0: | subregistry (160) | tokenVersionId (32) | expiry (64) |
//! word1: | unused (64)       | resolver (160)      | eacVersionId (32) |
//! ```

use crate::address::{Address, ADDRESS_BYTES};
use crate::errors::{CodecError, Result};
use crate::ids::{construct_resource_id, construct_token_id, CanonicalId, ResourceId, TokenId};
use serde::{Deserialize, Serialize};

/// Size of one packed word.
pub const WORD_BYTES: usize = 32;
/// Packed entry size (two words).
pub const ENTRY_BYTES: usize = 2 * WORD_BYTES;

// word0 byte ranges
const W0_SUBREGISTRY: std::ops::Range<usize> = 0..20;
const W0_TOKEN_VERSION: std::ops::Range<usize> = 20..24;
const W0_EXPIRY: std::ops::Range<usize> = 24..32;
// word1 byte ranges
const W1_UNUSED: std::ops::Range<usize> = 0..8;
const W1_RESOLVER: std::ops::Range<usize> = 8..28;
const W1_EAC_VERSION: std::ops::Range<usize> = 28..32;

/// Durable record per canonical id.
///
/// An all-default entry (expiry 0) means the name has never been registered
/// or reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Entry {
    /// Seconds since the epoch; the name is expired once `now >= expiry`.
    pub expiry: u64,
    pub token_version_id: u32,
    pub subregistry: Option<Address>,
    pub eac_version_id: u32,
    pub resolver: Option<Address>,
}

impl Entry {
    /// Whether the entry was ever created.
    pub fn exists(&self) -> bool {
        self.expiry != 0
    }

    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expiry
    }

    pub fn token_id(&self, canonical: CanonicalId) -> TokenId {
        construct_token_id(canonical, self.token_version_id)
    }

    pub fn resource_id(&self, canonical: CanonicalId) -> ResourceId {
        construct_resource_id(canonical, self.eac_version_id)
    }

    /// Pack into the two-word layout.
    pub fn encode(&self) -> [[u8; WORD_BYTES]; 2] {
        let mut word0 = [0u8; WORD_BYTES];
        let mut word1 = [0u8; WORD_BYTES];

        word0[W0_SUBREGISTRY].copy_from_slice(&address_bytes(self.subregistry));
        word0[W0_TOKEN_VERSION].copy_from_slice(&self.token_version_id.to_be_bytes());
        word0[W0_EXPIRY].copy_from_slice(&self.expiry.to_be_bytes());

        word1[W1_RESOLVER].copy_from_slice(&address_bytes(self.resolver));
        word1[W1_EAC_VERSION].copy_from_slice(&self.eac_version_id.to_be_bytes());

        [word0, word1]
    }

    /// Unpack from the two-word layout. Fails if the unused bits are set.
    pub fn decode(words: &[[u8; WORD_BYTES]; 2]) -> Result<Self> {
        let [word0, word1] = words;

        if word1[W1_UNUSED].iter().any(|b| *b != 0) {
            return Err(CodecError::InvalidEntryEncoding);
        }

        let mut expiry = [0u8; 8];
        expiry.copy_from_slice(&word0[W0_EXPIRY]);
        let mut token_version = [0u8; 4];
        token_version.copy_from_slice(&word0[W0_TOKEN_VERSION]);
        let mut eac_version = [0u8; 4];
        eac_version.copy_from_slice(&word1[W1_EAC_VERSION]);

        Ok(Self {
            expiry: u64::from_be_bytes(expiry),
            token_version_id: u32::from_be_bytes(token_version),
            subregistry: read_address(&word0[W0_SUBREGISTRY]),
            eac_version_id: u32::from_be_bytes(eac_version),
            resolver: read_address(&word1[W1_RESOLVER]),
        })
    }

    /// Pack into a flat 64-byte buffer (word0 then word1).
    pub fn to_bytes(&self) -> [u8; ENTRY_BYTES] {
        let [word0, word1] = self.encode();
        let mut out = [0u8; ENTRY_BYTES];
        out[..WORD_BYTES].copy_from_slice(&word0);
        out[WORD_BYTES..].copy_from_slice(&word1);
        out
    }

    /// Inverse of [`Entry::to_bytes`]; any other length is rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != ENTRY_BYTES {
            return Err(CodecError::InvalidEntryEncoding);
        }
        let mut word0 = [0u8; WORD_BYTES];
        let mut word1 = [0u8; WORD_BYTES];
        word0.copy_from_slice(&bytes[..WORD_BYTES]);
        word1.copy_from_slice(&bytes[WORD_BYTES..]);
        Self::decode(&[word0, word1])
    }
}

fn address_bytes(addr: Option<Address>) -> [u8; ADDRESS_BYTES] {
    addr.map(|a| a.0).unwrap_or([0u8; ADDRESS_BYTES])
}

fn read_address(bytes: &[u8]) -> Option<Address> {
    let mut out = [0u8; ADDRESS_BYTES];
    out.copy_from_slice(bytes);
    Address(out).non_zero()
}
