//! In-memory hash store. Backs unit tests and the recovery root
//! re-derivation, where persistence would be wasted work.

use crate::errors::{LedgerError, Result};
use crate::hashing::Digest;

use super::{HashStore, NodeRecord};

/// Vec-backed hash store with the same record semantics as the file store.
#[derive(Default)]
pub struct MemoryHashStore {
    leaves: Vec<Digest>,
    nodes: Vec<NodeRecord>,
}

impl MemoryHashStore {
    pub fn new() -> Self {
        MemoryHashStore::default()
    }

    /// Replace a stored node record in place. Corruption-injection helper for
    /// recovery tests; no durable backend offers this.
    #[cfg(test)]
    pub(crate) fn overwrite_node(&mut self, index: u64, record: NodeRecord) {
        self.nodes[index as usize - 1] = record;
    }
}

impl HashStore for MemoryHashStore {
    fn write_leaf(&mut self, leaf: &Digest) -> Result<u64> {
        self.leaves.push(*leaf);
        Ok(self.leaves.len() as u64)
    }

    fn write_node(&mut self, node: &NodeRecord) -> Result<u64> {
        self.nodes.push(node.clone());
        Ok(self.nodes.len() as u64)
    }

    fn read_leaf(&self, index: u64) -> Result<Digest> {
        if index == 0 || index > self.leaves.len() as u64 {
            return Err(LedgerError::NotFound { entity: "leaf", key: index });
        }
        Ok(self.leaves[index as usize - 1])
    }

    fn read_node(&self, index: u64) -> Result<NodeRecord> {
        if index == 0 || index > self.nodes.len() as u64 {
            return Err(LedgerError::NotFound { entity: "node", key: index });
        }
        Ok(self.nodes[index as usize - 1].clone())
    }

    fn leaf_count(&self) -> u64 {
        self.leaves.len() as u64
    }

    fn node_count(&self) -> u64 {
        self.nodes.len() as u64
    }

    fn reset(&mut self) -> Result<()> {
        self.leaves.clear();
        self.nodes.clear();
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
