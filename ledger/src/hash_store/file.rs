//! File-backed hash store: two append-only record files.
//!
//! On-disk layout (frozen — stable across restarts):
//!
//! - `merkle_leaves.bin` — 32 raw bytes per record, the leaf hash.
//! - `merkle_nodes.bin`  — 44 bytes per record:
//!   `start: u64 BE || height: u32 BE || hash: 32 bytes`.
//!   `0` in `start`/`height` is the sentinel for an unattributed node.
//!
//! A crash can leave a partially written trailing record in either file. On
//! open, any tail shorter than one record is truncated away; counts and
//! indexed reads see whole records only. Leaving the partial bytes in place
//! would shift the fixed-width offsets of every subsequent append.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::Result;
use crate::hashing::Digest;

use super::{HashStore, NodeRecord};

const LEAVES_FILE: &str = "merkle_leaves.bin";
const NODES_FILE: &str = "merkle_nodes.bin";

const LEAF_RECORD_LEN: u64 = 32;
const NODE_RECORD_LEN: u64 = 44;

/// Durable hash store over two fixed-width record files in `data_dir`.
pub struct FileHashStore {
    leaves_path: PathBuf,
    nodes_path: PathBuf,
    leaves: File,
    nodes: File,
    leaf_count: u64,
    node_count: u64,
}

impl FileHashStore {
    /// Open (creating if absent) the two record files under `data_dir`,
    /// repairing any partially written trailing record.
    pub fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;
        let leaves_path = data_dir.join(LEAVES_FILE);
        let nodes_path = data_dir.join(NODES_FILE);

        let (leaves, leaf_count) = open_record_file(&leaves_path, LEAF_RECORD_LEN)?;
        let (nodes, node_count) = open_record_file(&nodes_path, NODE_RECORD_LEN)?;

        debug!(
            leaves = leaf_count,
            nodes = node_count,
            dir = %data_dir.display(),
            "opened file hash store"
        );
        Ok(FileHashStore {
            leaves_path,
            nodes_path,
            leaves,
            nodes,
            leaf_count,
            node_count,
        })
    }
}

/// Open one record file, truncating a partial trailing record if present.
/// Returns the append handle and the whole-record count.
fn open_record_file(path: &Path, record_len: u64) -> Result<(File, u64)> {
    let file = OpenOptions::new()
        .read(true)
        .create(true)
        .append(true)
        .open(path)?;
    let len = file.metadata()?.len();
    let count = len / record_len;
    let whole = count * record_len;
    if whole != len {
        warn!(
            path = %path.display(),
            partial_bytes = len - whole,
            "truncating partially written trailing record"
        );
        file.set_len(whole)?;
    }
    Ok((file, count))
}

/// Read one whole record at a 1-based index from `path`.
fn read_record(path: &Path, index: u64, record_len: u64, buf: &mut [u8]) -> Result<()> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start((index - 1) * record_len))?;
    file.read_exact(buf)?;
    Ok(())
}

impl HashStore for FileHashStore {
    fn write_leaf(&mut self, leaf: &Digest) -> Result<u64> {
        self.leaves.write_all(leaf)?;
        self.leaf_count += 1;
        Ok(self.leaf_count)
    }

    fn write_node(&mut self, node: &NodeRecord) -> Result<u64> {
        let mut record = [0u8; NODE_RECORD_LEN as usize];
        record[0..8].copy_from_slice(&node.start.unwrap_or(0).to_be_bytes());
        record[8..12].copy_from_slice(&node.height.unwrap_or(0).to_be_bytes());
        record[12..44].copy_from_slice(&node.hash);
        self.nodes.write_all(&record)?;
        self.node_count += 1;
        Ok(self.node_count)
    }

    fn read_leaf(&self, index: u64) -> Result<Digest> {
        if index == 0 || index > self.leaf_count {
            return Err(crate::errors::LedgerError::NotFound {
                entity: "leaf",
                key: index,
            });
        }
        let mut hash = [0u8; 32];
        read_record(&self.leaves_path, index, LEAF_RECORD_LEN, &mut hash)?;
        Ok(hash)
    }

    fn read_node(&self, index: u64) -> Result<NodeRecord> {
        if index == 0 || index > self.node_count {
            return Err(crate::errors::LedgerError::NotFound {
                entity: "node",
                key: index,
            });
        }
        let mut record = [0u8; NODE_RECORD_LEN as usize];
        read_record(&self.nodes_path, index, NODE_RECORD_LEN, &mut record)?;
        let start = u64::from_be_bytes(record[0..8].try_into().unwrap());
        let height = u32::from_be_bytes(record[8..12].try_into().unwrap());
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&record[12..44]);
        Ok(NodeRecord {
            start: (start != 0).then_some(start),
            height: (height != 0).then_some(height),
            hash,
        })
    }

    fn leaf_count(&self) -> u64 {
        self.leaf_count
    }

    fn node_count(&self) -> u64 {
        self.node_count
    }

    fn reset(&mut self) -> Result<()> {
        self.leaves.set_len(0)?;
        self.nodes.set_len(0)?;
        self.leaf_count = 0;
        self.node_count = 0;
        debug!("hash store reset; next start must recover from the transaction log");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.leaves.sync_all()?;
        self.nodes.sync_all()?;
        Ok(())
    }
}
