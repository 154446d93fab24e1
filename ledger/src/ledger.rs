//! `Ledger` — the append/lookup/recovery orchestrator.
//!
//! A ledger couples three collaborators it owns exclusively:
//!
//! - a [`CompactMerkleTree`] over a hash store,
//! - a [`KeyValueStore`] transaction log,
//! - a [`Serializer`] for the embedder's transaction type.
//!
//! # Append protocol (frozen)
//!
//! ```text
//! 1. serialize(txn)                       → bytes
//! 2. txn_log.put(next_key, bytes)         → seqNo
//! 3. hash_leaf(bytes)                     → leaf hash
//! 4. tree.append_leaf_hash(leaf hash)     → audit path (+ persisted nodes)
//! 5. return MerkleInfo
//! ```
//!
//! The log write commits first. If the process dies between steps 2 and 4,
//! the two persistent representations disagree by exactly one record; the
//! startup cross-check detects the gap and refuses to open. An append that
//! returned an error is never considered committed.
//!
//! # Single-writer discipline
//!
//! `start`, `add`, and `stop` take `&mut self`; reads take `&self`.
//! Exclusive ownership is the concurrency model; there are no internal
//! locks and no runtime writer checks.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::errors::{LedgerError, Result};
use crate::hash_store::{HashStore, MemoryHashStore};
use crate::hashing::{hash_leaf, Digest};
use crate::serializers::Serializer;
use crate::store::KeyValueStore;
use crate::tree::CompactMerkleTree;

/// The Merkle commitment returned by [`Ledger::add`] and
/// [`Ledger::merkle_info`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerkleInfo {
    /// 1-based position of the transaction in append order.
    pub seq_no: u64,
    /// Root hash of the tree this info was computed against.
    pub root_hash: Digest,
    /// RFC 6962 audit path for `seq_no` in that tree.
    pub audit_path: Vec<Digest>,
    /// `SHA256(0x00 || serialized_txn)`.
    pub leaf_hash: Digest,
    /// Embedder-supplied transaction timestamp, when the transaction form
    /// carries one.
    pub txn_time: Option<u64>,
}

/// Append-only, tamper-evident transaction ledger.
pub struct Ledger<S, K, H>
where
    S: Serializer,
    K: KeyValueStore,
    H: HashStore,
{
    tree: CompactMerkleTree<H>,
    txn_log: K,
    serializer: S,
    genesis_path: Option<PathBuf>,
    started: bool,
}

impl<S, K, H> Ledger<S, K, H>
where
    S: Serializer,
    K: KeyValueStore,
    H: HashStore,
{
    /// Assemble a ledger. Nothing is read or written until
    /// [`start`](Self::start).
    pub fn new(tree: CompactMerkleTree<H>, txn_log: K, serializer: S) -> Self {
        Ledger {
            tree,
            txn_log,
            serializer,
            genesis_path: None,
            started: false,
        }
    }

    /// Bootstrap an empty ledger from a genesis file: one serialized record
    /// per line, loaded as seqNos `1..=g` during `start` before any user
    /// `add`. A non-empty transaction log skips the file entirely.
    pub fn with_genesis_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.genesis_path = Some(path.into());
        self
    }

    /// Open the ledger: load genesis if applicable, then reconcile the
    /// transaction log against the hash store.
    ///
    /// Mode selection:
    /// - hash store empty, log non-empty → rebuild the tree from the log
    ///   (the authoritative path; also the post-`reset` path);
    /// - hash store non-empty → reconstruct the tree from the hash store,
    ///   then cross-check it against the log.
    ///
    /// Any divergence fails with `ConsistencyVerificationFailed` and the
    /// ledger stays closed; there is no fallback between modes.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        if self.txn_log.size() == 0 {
            self.load_genesis()?;
        }

        let log_size = self.txn_log.size();
        let leaf_count = self.tree.store().leaf_count();
        if leaf_count == 0 && log_size > 0 {
            info!(records = log_size, "rebuilding merkle tree from transaction log");
            self.recover_tree_from_txn_log()?;
        } else if leaf_count > 0 {
            debug!(leaves = leaf_count, "reconstructing merkle tree from hash store");
            self.recover_tree_from_hash_store()?;
        }

        self.started = true;
        info!(
            size = self.size(),
            root = %hex::encode(self.root_hash()),
            "ledger started"
        );
        Ok(())
    }

    /// Flush and close the underlying stores. Idempotent; the ledger can be
    /// dropped afterwards and reopened from disk by a fresh instance.
    pub fn stop(&mut self) -> Result<()> {
        self.txn_log.close()?;
        self.tree.close()?;
        if self.started {
            self.started = false;
            debug!("ledger stopped");
        }
        Ok(())
    }

    /// Append a transaction. Returns the assigned seqNo and the new Merkle
    /// state. See the module doc for the commit protocol.
    pub fn add(&mut self, txn: &S::Txn) -> Result<MerkleInfo> {
        if !self.started {
            return Err(LedgerError::InvalidArgument(
                "ledger is not started".into(),
            ));
        }
        let bytes = self.serializer.serialize(txn)?;
        let seq_no = self.txn_log.put(None, &bytes)?;
        let leaf_hash = hash_leaf(&bytes);
        let audit_path = self.tree.append_leaf_hash(leaf_hash)?;
        Ok(MerkleInfo {
            seq_no,
            root_hash: self.tree.root_hash(),
            audit_path,
            leaf_hash,
            txn_time: self.serializer.txn_time(txn),
        })
    }

    /// Look up the transaction at `seq_no`. The decoded transaction carries
    /// its sequence number under the reserved `seqNo` field where the
    /// transaction form supports it.
    pub fn get(&self, seq_no: u64) -> Result<S::Txn> {
        let bytes = self.txn_log.get(seq_no)?;
        let mut txn = self.serializer.deserialize(&bytes)?;
        self.serializer.attach_seq_no(&mut txn, seq_no);
        Ok(txn)
    }

    /// Lazily yield `(seqNo, txn)` over the inclusive range `frm..=to`.
    /// `frm` defaults to 1, `to` to the current size. An inverted range
    /// (`frm > to`) yields an empty sequence; it is not an error.
    pub fn get_all_txn(
        &self,
        frm: Option<u64>,
        to: Option<u64>,
    ) -> impl Iterator<Item = Result<(u64, S::Txn)>> + '_ {
        let frm = frm.unwrap_or(1);
        let to = to.unwrap_or_else(|| self.size());
        (frm..=to).map(move |seq_no| self.get(seq_no).map(|txn| (seq_no, txn)))
    }

    /// Number of transactions, genesis records included.
    pub fn size(&self) -> u64 {
        self.tree.tree_size()
    }

    /// Current root hash.
    pub fn root_hash(&self) -> Digest {
        self.tree.root_hash()
    }

    /// Current spine hashes, largest subtree first.
    pub fn hashes(&self) -> Vec<Digest> {
        self.tree.hashes()
    }

    /// Merkle commitment for a historical `seq_no` against the current tree
    /// size. Pure in `(size, seq_no)`: stable regardless of when queried.
    pub fn merkle_info(&self, seq_no: u64) -> Result<MerkleInfo> {
        let audit_path = self.tree.audit_path(seq_no)?;
        Ok(MerkleInfo {
            seq_no,
            root_hash: self.tree.root_hash(),
            audit_path,
            leaf_hash: self.tree.store().read_leaf(seq_no)?,
            txn_time: None,
        })
    }

    /// The underlying tree (read access).
    pub fn tree(&self) -> &CompactMerkleTree<H> {
        &self.tree
    }

    /// Administrative access to the tree and its hash store. External
    /// mutation (`reset`, fault injection) is only defined while the ledger
    /// is stopped.
    pub fn tree_mut(&mut self) -> &mut CompactMerkleTree<H> {
        &mut self.tree
    }

    /// The underlying transaction log (read access).
    pub fn txn_log(&self) -> &K {
        &self.txn_log
    }

    /// Administrative access to the transaction log. Same contract as
    /// [`tree_mut`](Self::tree_mut).
    pub fn txn_log_mut(&mut self) -> &mut K {
        &mut self.txn_log
    }

    /// Recovery mode A: rebuild the tree by replaying the transaction log.
    ///
    /// Precondition: the hash store is empty (fresh or reset). Leaf hashes
    /// are computed over the stored bytes exactly as written, which is what
    /// makes this path insensitive to appended-field schema growth.
    pub fn recover_tree_from_txn_log(&mut self) -> Result<()> {
        if self.tree.store().leaf_count() != 0 || self.tree.store().node_count() != 0 {
            return Err(LedgerError::InvalidArgument(
                "log replay requires an empty hash store; reset it first".into(),
            ));
        }
        let tree = &mut self.tree;
        let log = &self.txn_log;
        for record in log.iter_range(1, log.size()) {
            let (_, bytes) = record?;
            tree.extend(hash_leaf(&bytes))?;
        }
        Ok(())
    }

    /// Recovery mode B: reconstruct the tree from the hash store without
    /// rehashing, then cross-check it against the transaction log.
    ///
    /// The tree-side checks (interior-node count, root re-derived from the
    /// persisted leaves) live in [`CompactMerkleTree::open`]. The ledger
    /// adds the cross-store checks: equal sizes, and the hash-store root
    /// equal to the root obtained by replaying the log bytes.
    pub fn recover_tree_from_hash_store(&mut self) -> Result<()> {
        self.tree.open()?;

        let tree_size = self.tree.tree_size();
        let log_size = self.txn_log.size();
        if tree_size != log_size {
            warn!(tree_size, log_size, "leaf/transaction count divergence");
            return Err(LedgerError::ConsistencyVerificationFailed(format!(
                "hash store holds {tree_size} leaves, transaction log holds {log_size} records"
            )));
        }
        if tree_size > 0 {
            let replayed = self.replay_log_root()?;
            if replayed != self.tree.root_hash() {
                return Err(LedgerError::ConsistencyVerificationFailed(format!(
                    "transaction log replays to root {}, hash store holds {}",
                    hex::encode(replayed),
                    hex::encode(self.tree.root_hash())
                )));
            }
        }
        Ok(())
    }

    /// Root obtained by leaf-hashing every stored log record through a
    /// throwaway in-memory tree. Never touches the durable hash store.
    fn replay_log_root(&self) -> Result<Digest> {
        let mut replay = CompactMerkleTree::new(MemoryHashStore::new());
        for record in self.txn_log.iter_range(1, self.txn_log.size()) {
            let (_, bytes) = record?;
            replay.extend(hash_leaf(&bytes))?;
        }
        Ok(replay.root_hash())
    }

    /// Copy genesis records (one per line) into the empty transaction log.
    fn load_genesis(&mut self) -> Result<()> {
        let Some(path) = &self.genesis_path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }
        let contents = std::fs::read(path)?;
        let mut loaded = 0u64;
        for line in contents.split(|b| *b == b'\n') {
            if line.is_empty() {
                continue;
            }
            self.txn_log.put(None, line)?;
            loaded += 1;
        }
        info!(records = loaded, path = %path.display(), "loaded genesis records");
        Ok(())
    }
}
