//! Append-only, tamper-evident transaction ledger.
//!
//! Clients append opaque transactions; the ledger assigns a monotonically
//! increasing sequence number, incorporates the transaction into a compact
//! RFC 6962 Merkle tree, and returns the new Merkle state (root hash, audit
//! path, leaf hash). Reads are served by sequence number or range, and the
//! in-memory tree is fully reconstructable after a restart from either the
//! transaction log alone or the persisted hash store, with a consistency
//! check between the two.
//!
//! INVARIANTS:
//! 1. Sequence numbers are 1-based, contiguous, and assigned in append order.
//! 2. Leaf hashing is over the serialized bytes as written; records are never
//!    canonically re-serialized for hashing. Schemas grow by appending only.
//! 3. After n appends the hash store holds n leaves and n - popcount(n)
//!    interior nodes; the spine length is popcount(n).
//! 4. The transaction log and the hash store are two independent persistent
//!    representations of the same state; any startup divergence between them
//!    is fatal (`ConsistencyVerificationFailed`), never silently repaired.
//!    The one local repair is the text log's missing final line separator.
//! 5. Single writer: at most one append in flight, enforced by `&mut self`
//!    ownership rather than runtime checks.

pub mod errors;
pub mod hash_store;
pub mod hashing;
pub mod ledger;
pub mod serializers;
pub mod store;
pub mod tree;

pub use errors::{LedgerError, Result};
pub use hash_store::{FileHashStore, HashStore, MemoryHashStore, NodeRecord};
pub use hashing::{hash_leaf, hash_node, Digest};
pub use ledger::{Ledger, MerkleInfo};
pub use serializers::{
    CompactSerializer, FieldType, MsgPackSerializer, RawBytesSerializer, Serializer, Transaction,
    Value,
};
pub use store::{KeyValueStore, MemoryStore, SledStore, TextFileStore};
pub use tree::proof::verify_audit_path;
pub use tree::CompactMerkleTree;
