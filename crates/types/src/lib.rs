//! Core types for the permissioned name registry.
//!
//! Pure codecs only: label hashing, the canonical / resource / token id
//! scheme, the packed entry layout, role bitmaps with packed assignee counts,
//! and the clock capability the registry samples.

pub mod address;
pub mod clock;
pub mod entry;
pub mod errors;
pub mod ids;
pub mod label;
pub mod roles;

pub use address::*;
pub use clock::*;
pub use entry::*;
pub use errors::*;
pub use ids::*;
pub use label::*;
pub use roles::*;
