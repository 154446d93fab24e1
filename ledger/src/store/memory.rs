//! In-memory transaction log for tests.

use crate::errors::{LedgerError, Result};

use super::KeyValueStore;

/// Vec-backed log with the same key semantics as the durable backends.
#[derive(Default)]
pub struct MemoryStore {
    records: Vec<Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn put(&mut self, key: Option<u64>, value: &[u8]) -> Result<u64> {
        let next = self.records.len() as u64 + 1;
        let key = key.unwrap_or(next);
        if key != next {
            return Err(LedgerError::InvalidArgument(format!(
                "non-contiguous key {key}, expected {next}"
            )));
        }
        self.records.push(value.to_vec());
        Ok(key)
    }

    fn get(&self, key: u64) -> Result<Vec<u8>> {
        if key == 0 || key > self.records.len() as u64 {
            return Err(LedgerError::NotFound { entity: "transaction", key });
        }
        Ok(self.records[key as usize - 1].clone())
    }

    fn size(&self) -> u64 {
        self.records.len() as u64
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
