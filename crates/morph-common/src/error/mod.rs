//! Error classification for MorphDB.
//!
//! Every crate defines its own error enum; each of them maps onto the
//! stable [`ErrorCode`] defined here so that callers at the boundary can
//! classify failures without matching on crate-specific variants.

mod code;

pub use code::ErrorCode;
