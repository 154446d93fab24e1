//! The canonical error type for all ledger, tree, and store failures.
//!
//! Policy summary:
//! - `ConsistencyVerificationFailed` is fatal to `Ledger::start`; the ledger
//!   stays closed. There is no fallback recovery mode.
//! - `Serialization` is surfaced to the caller; during recovery it is fatal.
//! - `StoreIo` means the operation did not commit. An append that fails with
//!   `StoreIo` is caught by the startup cross-check on the next open.

use thiserror::Error;

/// Every fallible operation in this crate returns `Result<T>`.
pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// The two persistent representations of the ledger (transaction log and
    /// hash store) disagree, or an internal count invariant does not hold.
    #[error("consistency verification failed: {0}")]
    ConsistencyVerificationFailed(String),

    /// A read was issued for a key outside the stored range.
    #[error("{entity} {key} not found")]
    NotFound {
        /// What was looked up ("transaction", "leaf", "node").
        entity: &'static str,
        /// The 1-based key or index that missed.
        key: u64,
    },

    /// Bytes could not be decoded under the current schema, or a value could
    /// not be encoded to the wire form.
    #[error("serialization failure: {0}")]
    Serialization(String),

    /// An underlying store read or write failed. The enclosing operation is
    /// not committed.
    #[error("store I/O failure: {0}")]
    StoreIo(#[from] std::io::Error),

    /// The caller handed the ledger a value its serializer or store cannot
    /// accept (wrong field type, embedded delimiter, non-contiguous key).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<sled::Error> for LedgerError {
    fn from(err: sled::Error) -> Self {
        LedgerError::StoreIo(std::io::Error::new(std::io::ErrorKind::Other, err))
    }
}

impl From<rmp_serde::encode::Error> for LedgerError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for LedgerError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        LedgerError::Serialization(err.to_string())
    }
}
