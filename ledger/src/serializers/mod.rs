//! Transaction model and wire codecs.
//!
//! A transaction is an ordered mapping of named fields to typed values. The
//! ledger never inspects field semantics; it only needs a deterministic,
//! bidirectional mapping between the structured form and bytes. Field order
//! is part of the wire contract, so the map type preserves insertion order.
//!
//! SCHEMA RULE (frozen): a schema may only grow by APPENDING fields. Leaf
//! hashes are computed over the serialized bytes as they were written, never
//! over a canonical re-serialization of the decoded record; decoding old
//! records under a grown schema zero-fills the absent trailing fields as a
//! read-side convenience only.

pub mod compact;
pub mod msgpack;
pub mod raw;

pub use compact::CompactSerializer;
pub use msgpack::MsgPackSerializer;
pub use raw::RawBytesSerializer;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Reserved read-side field names the ledger may attach to or read from a
/// transaction. Neither belongs in an embedder's schema.
pub mod fields {
    /// 1-based position of the transaction in append order, attached by
    /// `Ledger::get`.
    pub const SEQ_NO: &str = "seqNo";
    /// Optional embedder-supplied timestamp, echoed into `MerkleInfo`.
    pub const TXN_TIME: &str = "txnTime";
}

/// A single field value. Untagged so the MessagePack form is the natural
/// scalar (integer or string), not an enum wrapper.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    UInt(u64),
    Str(String),
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

/// An ordered field map. Insertion order is the wire order.
pub type Transaction = IndexMap<String, Value>;

/// Declared type of a schema field. Decoding an absent trailing field yields
/// the type's zero value: `""` for `Str`, `0` for `UInt`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    Str,
    UInt,
}

impl FieldType {
    /// The zero value assigned to absent trailing fields on decode.
    pub fn zero(self) -> Value {
        match self {
            FieldType::Str => Value::Str(String::new()),
            FieldType::UInt => Value::UInt(0),
        }
    }
}

/// An ordered schema: `(field name, declared type)` in wire order.
pub type OrderedFields = Vec<(String, FieldType)>;

/// Build a schema from name/type pairs.
pub fn ordered_fields(fields: &[(&str, FieldType)]) -> OrderedFields {
    fields
        .iter()
        .map(|(name, ty)| ((*name).to_owned(), *ty))
        .collect()
}

/// Deterministic codec between a transaction and its wire form.
///
/// `serialize(deserialize(x)) == x` must hold for any `x` previously
/// produced by this serializer against the same or an ancestor schema.
pub trait Serializer {
    /// The structured transaction type this codec handles.
    type Txn: Clone;

    fn serialize(&self, txn: &Self::Txn) -> Result<Vec<u8>>;

    fn deserialize(&self, bytes: &[u8]) -> Result<Self::Txn>;

    /// Attach the assigned sequence number to a decoded transaction, if the
    /// transaction form can carry it. Default: no-op.
    fn attach_seq_no(&self, _txn: &mut Self::Txn, _seq_no: u64) {}

    /// The transaction's embedder-supplied timestamp, if it carries one.
    /// Default: none.
    fn txn_time(&self, _txn: &Self::Txn) -> Option<u64> {
        None
    }
}

/// Shared helper for the field-map codecs: set the reserved `seqNo` field.
pub(crate) fn attach_seq_no_field(txn: &mut Transaction, seq_no: u64) {
    txn.insert(fields::SEQ_NO.to_owned(), Value::UInt(seq_no));
}

/// Shared helper for the field-map codecs: read the reserved `txnTime` field.
pub(crate) fn txn_time_field(txn: &Transaction) -> Option<u64> {
    match txn.get(fields::TXN_TIME) {
        Some(Value::UInt(t)) => Some(*t),
        _ => None,
    }
}
