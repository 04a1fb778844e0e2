//! Provenance Store - request-shared on-disk state
//!
//! The API key store that gates the service and the scratch space where
//! uploaded archives and per-request inputs live until released.

pub mod error;
pub mod keys;
pub mod scratch;

pub use error::{Result, StoreError};
pub use keys::{KeyRecord, KeyStatus, KeyStore};
pub use scratch::{validate_id, ScratchDirectory, ScratchManager, TempInput};
