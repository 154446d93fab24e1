//! `CompactMerkleTree` — the incremental tree state machine.
//!
//! # State
//!
//! A tree is fully described by `(tree_size, spine)` where the spine holds
//! one `(start, height, hash)` triple per set bit of `tree_size`, largest
//! subtree first. The root is the right-fold of the spine hashes under the
//! `0x01` pair hash; the empty tree's root is `SHA256("")`.
//!
//! # Persistence protocol (frozen)
//!
//! Every append writes exactly one leaf record, then one node record per
//! equal-height merge it triggers. After `n` appends the store holds `n`
//! leaves and `n - popcount(n)` nodes, and the emission order of nodes is a
//! pure function of `n` (see `hash_store::node_position`). Recovery exploits
//! this: the spine can be reassembled from the store without rehashing a
//! single leaf, and any count that disagrees with the formula is evidence of
//! tampering or a torn write.

use tracing::debug;

use crate::errors::{LedgerError, Result};
use crate::hash_store::{node_position, HashStore, MemoryHashStore, NodeRecord};
use crate::hashing::{empty_tree_root, hash_leaf, hash_node, Digest};

use super::{spine_decomposition, SpineEntry};

/// Incremental RFC 6962 Merkle tree over a persistent hash store.
pub struct CompactMerkleTree<H: HashStore> {
    store: H,
    tree_size: u64,
    spine: Vec<SpineEntry>,
}

impl<H: HashStore> CompactMerkleTree<H> {
    /// A tree with empty in-memory state. The store may hold persisted data;
    /// call [`open`](Self::open) to load it, or feed the tree through a
    /// replay path.
    pub fn new(store: H) -> Self {
        CompactMerkleTree {
            store,
            tree_size: 0,
            spine: Vec::new(),
        }
    }

    /// The backing hash store.
    pub fn store(&self) -> &H {
        &self.store
    }

    /// Mutable access to the backing hash store. External mutation is only
    /// defined while the owning ledger is stopped (administrative `reset`).
    pub fn store_mut(&mut self) -> &mut H {
        &mut self.store
    }

    /// Current leaf count.
    pub fn tree_size(&self) -> u64 {
        self.tree_size
    }

    /// The spine hashes, largest subtree first. `len == popcount(tree_size)`.
    pub fn hashes(&self) -> Vec<Digest> {
        self.spine.iter().map(|e| e.hash).collect()
    }

    /// Root hash: `SHA256("")` when empty, the single spine hash for a
    /// perfect tree, otherwise the right-fold combining smaller subtrees
    /// into larger.
    pub fn root_hash(&self) -> Digest {
        match self.spine.split_last() {
            None => empty_tree_root(),
            Some((last, rest)) => {
                let mut acc = last.hash;
                for entry in rest.iter().rev() {
                    acc = hash_node(&entry.hash, &acc);
                }
                acc
            }
        }
    }

    /// Append a leaf given its serialized bytes. Returns the leaf hash and
    /// the new leaf's audit path in the extended tree.
    pub fn append(&mut self, leaf_bytes: &[u8]) -> Result<(Digest, Vec<Digest>)> {
        let leaf = hash_leaf(leaf_bytes);
        let path = self.append_leaf_hash(leaf)?;
        Ok((leaf, path))
    }

    /// Append an already-computed leaf hash. Returns the new leaf's audit
    /// path in the extended tree.
    pub fn append_leaf_hash(&mut self, leaf: Digest) -> Result<Vec<Digest>> {
        self.extend(leaf)?;
        self.audit_path(self.tree_size)
    }

    /// Extend the tree by one leaf hash without producing an audit path.
    /// This is the replay primitive: recovery drives it once per log record.
    pub fn extend(&mut self, leaf: Digest) -> Result<()> {
        let new_size = self
            .tree_size
            .checked_add(1)
            .ok_or_else(|| LedgerError::InvalidArgument("tree size overflow".into()))?;
        self.store.write_leaf(&leaf)?;
        self.spine.push(SpineEntry {
            start: new_size,
            height: 0,
            hash: leaf,
        });

        // Merge from the right while the two smallest subtrees have equal
        // height. Each merge persists one interior node with its provenance.
        while self.spine.len() >= 2 {
            let height = self.spine[self.spine.len() - 1].height;
            if self.spine[self.spine.len() - 2].height != height {
                break;
            }
            let right = self.spine.pop().unwrap(); // safe: loop guard saw two entries
            let left = self.spine.pop().unwrap();
            let parent = hash_node(&left.hash, &right.hash);
            let merged_height = height + 1;
            self.store
                .write_node(&NodeRecord::new(left.start, merged_height, parent))?;
            self.spine.push(SpineEntry {
                start: left.start,
                height: merged_height,
                hash: parent,
            });
        }

        self.tree_size = new_size;
        Ok(())
    }

    /// Load `(tree_size, spine)` from the persisted hash store without
    /// rehashing any leaf bytes, verifying the store's internal consistency.
    ///
    /// Protocol:
    /// 1. `k = leaf_count()`; require `node_count() == k - popcount(k)`.
    /// 2. For each set bit of `k`, largest first, take the subtree root from
    ///    the final merge at that height (position derived from `k` alone);
    ///    the lowest set bit at height 0 is `leaves[k]` itself.
    /// 3. Re-derive the root from `leaves[1..=k]` through a fresh in-memory
    ///    tree and require equality with the fold of the assembled spine.
    ///
    /// Any mismatch fails `ConsistencyVerificationFailed` and leaves the
    /// in-memory state empty.
    pub fn open(&mut self) -> Result<()> {
        self.tree_size = 0;
        self.spine.clear();

        let leaf_count = self.store.leaf_count();
        if leaf_count == 0 {
            return Ok(());
        }

        let expected_nodes = leaf_count - u64::from(leaf_count.count_ones());
        let node_count = self.store.node_count();
        if node_count != expected_nodes {
            return Err(LedgerError::ConsistencyVerificationFailed(format!(
                "hash store holds {node_count} interior nodes, {expected_nodes} expected for {leaf_count} leaves"
            )));
        }

        let mut spine = Vec::with_capacity(leaf_count.count_ones() as usize);
        for (start, height) in spine_decomposition(leaf_count) {
            let hash = if height == 0 {
                self.store.read_leaf(start)?
            } else {
                self.store.read_node(node_position(start, height))?.hash
            };
            spine.push(SpineEntry { start, height, hash });
        }

        // Independent root derivation: replay the persisted leaf hashes
        // through a throwaway in-memory tree.
        let mut replay = CompactMerkleTree::new(MemoryHashStore::new());
        for i in 1..=leaf_count {
            replay.extend(self.store.read_leaf(i)?)?;
        }

        self.tree_size = leaf_count;
        self.spine = spine;
        let stored_root = self.root_hash();
        let replayed_root = replay.root_hash();
        if stored_root != replayed_root {
            self.tree_size = 0;
            self.spine.clear();
            return Err(LedgerError::ConsistencyVerificationFailed(format!(
                "persisted interior nodes fold to root {}, leaves fold to {}",
                hex::encode(stored_root),
                hex::encode(replayed_root)
            )));
        }

        debug!(tree_size = leaf_count, root = %hex::encode(stored_root), "tree recovered from hash store");
        Ok(())
    }

    /// Flush the backing store durably. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        self.store.close()
    }
}
