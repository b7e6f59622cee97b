//! Identity encoding for names, access-control scopes and ownership handles.
//!
//! All three identifiers are 256-bit big-endian integers sharing the same
//! upper 224 bits. The low 32 bits carry a version:
//!
//! - [`CanonicalId`]: version field zeroed, stable for the lifetime of a label.
//! - [`ResourceId`]: canonical id | `eacVersionId`, the access-control scope.
//! - [`TokenId`]: canonical id | `tokenVersionId`, the transferable handle.

use crate::errors::{CodecError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Width of every identifier in bytes.
pub const ID_BYTES: usize = 32;
/// Offset of the 32-bit version field inside the big-endian id bytes.
const VERSION_OFFSET: usize = ID_BYTES - 4;

fn set_version(bytes: &mut [u8; ID_BYTES], version: u32) {
    bytes[VERSION_OFFSET..].copy_from_slice(&version.to_be_bytes());
}

fn read_version(bytes: &[u8; ID_BYTES]) -> u32 {
    let mut v = [0u8; 4];
    v.copy_from_slice(&bytes[VERSION_OFFSET..]);
    u32::from_be_bytes(v)
}

fn parse_id_hex(input: &str) -> Result<[u8; ID_BYTES]> {
    let payload = input.strip_prefix("0x").unwrap_or(input);
    let mut bytes = [0u8; ID_BYTES];
    hex::decode_to_slice(payload, &mut bytes).map_err(|_| CodecError::InvalidHex {
        input: input.to_string(),
    })?;
    Ok(bytes)
}

/// Version-independent identifier derived from a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CanonicalId([u8; ID_BYTES]);

impl CanonicalId {
    /// Canonicalise arbitrary id bytes by clearing the version field.
    pub fn from_bytes(mut bytes: [u8; ID_BYTES]) -> Self {
        set_version(&mut bytes, 0);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ID_BYTES] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn token_id(&self, version: u32) -> TokenId {
        construct_token_id(*self, version)
    }

    pub fn resource_id(&self, version: u32) -> ResourceId {
        construct_resource_id(*self, version)
    }
}

/// Access-control scope: canonical id with the ACL epoch in the low 32 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ResourceId(pub [u8; ID_BYTES]);

/// The well-known scope from which global roles are granted.
pub const ROOT_RESOURCE: ResourceId = ResourceId([0u8; ID_BYTES]);

impl ResourceId {
    pub fn as_bytes(&self) -> &[u8; ID_BYTES] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        *self == ROOT_RESOURCE
    }

    pub fn canonical_id(&self) -> CanonicalId {
        CanonicalId::from_bytes(self.0)
    }

    pub fn version(&self) -> u32 {
        read_version(&self.0)
    }

    pub fn decode(&self) -> (CanonicalId, u32) {
        (self.canonical_id(), self.version())
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

/// Ownership handle: canonical id with the token epoch in the low 32 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct TokenId(pub [u8; ID_BYTES]);

impl TokenId {
    pub fn as_bytes(&self) -> &[u8; ID_BYTES] {
        &self.0
    }

    pub fn canonical_id(&self) -> CanonicalId {
        CanonicalId::from_bytes(self.0)
    }

    pub fn version(&self) -> u32 {
        read_version(&self.0)
    }

    pub fn decode(&self) -> (CanonicalId, u32) {
        (self.canonical_id(), self.version())
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

/// `canonical | version` for an ownership handle.
pub fn construct_token_id(canonical: CanonicalId, version: u32) -> TokenId {
    let mut bytes = canonical.0;
    set_version(&mut bytes, version);
    TokenId(bytes)
}

/// `canonical | version` for an access-control scope.
pub fn construct_resource_id(canonical: CanonicalId, version: u32) -> ResourceId {
    let mut bytes = canonical.0;
    set_version(&mut bytes, version);
    ResourceId(bytes)
}

/// Clear the low 32 bits of any identifier.
pub fn canonical_id_of(id: &[u8; ID_BYTES]) -> CanonicalId {
    CanonicalId::from_bytes(*id)
}

impl From<TokenId> for CanonicalId {
    fn from(id: TokenId) -> Self {
        id.canonical_id()
    }
}

impl From<ResourceId> for CanonicalId {
    fn from(id: ResourceId) -> Self {
        id.canonical_id()
    }
}

impl From<&TokenId> for CanonicalId {
    fn from(id: &TokenId) -> Self {
        id.canonical_id()
    }
}

macro_rules! hex_display {
    ($($ty:ty),*) => {$(
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }
    )*};
}

hex_display!(CanonicalId, ResourceId, TokenId);

macro_rules! hex_string_serde {
    ($($ty:ty),*) => {$(
        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.to_string()
            }
        }

        impl TryFrom<String> for $ty {
            type Error = CodecError;

            fn try_from(value: String) -> Result<Self> {
                value.parse()
            }
        }
    )*};
}

hex_string_serde!(CanonicalId, ResourceId, TokenId);

impl FromStr for CanonicalId {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        parse_id_hex(s).map(CanonicalId::from_bytes)
    }
}

impl FromStr for ResourceId {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        parse_id_hex(s).map(ResourceId)
    }
}

impl FromStr for TokenId {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self> {
        parse_id_hex(s).map(TokenId)
    }
}
