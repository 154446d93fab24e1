//! SHA-256 binding for the ledger.
//!
//! RULE (frozen): SHA-256 (FIPS 180-4). No other hash algorithm permitted.
//!
//! MERKLE DOMAIN SEPARATION (RFC 6962 §2.1):
//!   leaf_hash  = SHA256(0x00 || serialized_leaf_bytes)
//!   node_hash  = SHA256(0x01 || left_hash || right_hash)
//!   empty root = SHA256("")
//!
//! The prefix bytes prevent second-preimage attacks on the Merkle tree.
//! The empty-tree root is the hash of the empty string, NOT the leaf hash of
//! empty bytes; the two differ by the 0x00 prefix.

use sha2::{Digest as _, Sha256};

/// A SHA-256 digest: 32 bytes.
pub type Digest = [u8; 32];

/// The domain separation prefix for Merkle leaf hashes.
pub const LEAF_PREFIX: u8 = 0x00;

/// The domain separation prefix for Merkle interior node hashes.
pub const NODE_PREFIX: u8 = 0x01;

/// Hash a Merkle leaf: `SHA256(0x00 || leaf_bytes)`.
pub fn hash_leaf(leaf_bytes: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(leaf_bytes);
    hasher.finalize().into()
}

/// Hash a Merkle interior node: `SHA256(0x01 || left_hash || right_hash)`.
pub fn hash_node(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// The root of a tree with zero leaves: `SHA256("")`.
pub fn empty_tree_root() -> Digest {
    Sha256::digest([]).into()
}
