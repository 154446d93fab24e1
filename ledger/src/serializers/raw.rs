//! Identity codec for ledgers of opaque byte payloads. The transaction IS
//! its wire form; the ledger only sequences and hashes it.

use crate::errors::{LedgerError, Result};

use super::Serializer;

/// Pass-through codec over raw bytes.
#[derive(Default)]
pub struct RawBytesSerializer;

impl RawBytesSerializer {
    pub fn new() -> Self {
        RawBytesSerializer
    }
}

impl Serializer for RawBytesSerializer {
    type Txn = Vec<u8>;

    fn serialize(&self, txn: &Self::Txn) -> Result<Vec<u8>> {
        if txn.contains(&b'\n') {
            // The raw codec is used with the line-oriented store; a payload
            // holding the separator cannot be stored as one record.
            return Err(LedgerError::InvalidArgument(
                "raw payload contains the line separator".into(),
            ));
        }
        Ok(txn.clone())
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Self::Txn> {
        Ok(bytes.to_vec())
    }
}
