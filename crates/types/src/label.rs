//! Label validation and hashing

use crate::errors::{CodecError, Result};
use crate::ids::CanonicalId;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;

/// Hard upper bound on label length in bytes.
pub const MAX_LABEL_LENGTH: usize = 255;

/// A single validated name segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Label(String);

impl Label {
    /// Validate `label` against the default length bound.
    pub fn parse(label: impl Into<String>) -> Result<Self> {
        Self::parse_with_limit(label, MAX_LABEL_LENGTH)
    }

    /// Validate `label` against a (possibly stricter) length bound.
    pub fn parse_with_limit(label: impl Into<String>, max_len: usize) -> Result<Self> {
        let label = label.into();
        validate_label(&label, max_len)?;
        Ok(Self(label))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn canonical_id(&self) -> CanonicalId {
        hash_label(&self.0)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Label> for String {
    fn from(label: Label) -> Self {
        label.0
    }
}

impl TryFrom<String> for Label {
    type Error = CodecError;

    fn try_from(value: String) -> Result<Self> {
        Label::parse(value)
    }
}

/// Check that a label is non-empty, bounded and a single segment.
pub fn validate_label(label: &str, max_len: usize) -> Result<()> {
    if label.is_empty() {
        return Err(CodecError::EmptyLabel);
    }

    let max = max_len.min(MAX_LABEL_LENGTH);
    if label.len() > max {
        return Err(CodecError::LabelTooLong {
            label: label.to_string(),
            len: label.len(),
            max,
        });
    }

    if label.chars().any(|c| c == '.' || c.is_control()) {
        return Err(CodecError::InvalidLabelCharacter {
            label: label.to_string(),
        });
    }

    Ok(())
}

/// keccak-256 of the label bytes with the version field cleared.
fn hash_label(label: &str) -> CanonicalId {
    let digest: [u8; 32] = Keccak256::digest(label.as_bytes()).into();
    CanonicalId::from_bytes(digest)
}

/// Validate and hash a label into its canonical id.
pub fn label_to_canonical_id(label: &str) -> Result<CanonicalId> {
    validate_label(label, MAX_LABEL_LENGTH)?;
    Ok(hash_label(label))
}
