//! Error types for identity and record codecs

use crate::address::AddressError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("Label must not be empty")]
    EmptyLabel,

    #[error("Label too long: {label} is {len} bytes, limit is {max}")]
    LabelTooLong { label: String, len: usize, max: usize },

    #[error("Label contains a separator or control character: {label:?}")]
    InvalidLabelCharacter { label: String },

    #[error("Invalid hex identifier: {input}")]
    InvalidHex { input: String },

    #[error("Invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    #[error("Invalid entry encoding: unused bits are set")]
    InvalidEntryEncoding,

    #[error("Unknown role name: {name}")]
    UnknownRole { name: String },
}

pub type Result<T> = std::result::Result<T, CodecError>;
