//! MessagePack transaction codec.
//!
//! Binary, self-describing, schema-less: the ordered field map serializes as
//! a MessagePack map in insertion order, so the wire form is deterministic
//! for a given transaction. Not compatible with the line-oriented text store
//! (records may contain arbitrary bytes).

use crate::errors::Result;

use super::{attach_seq_no_field, txn_time_field, Serializer, Transaction};

/// Schema-less binary codec over [`Transaction`].
#[derive(Default)]
pub struct MsgPackSerializer;

impl MsgPackSerializer {
    pub fn new() -> Self {
        MsgPackSerializer
    }
}

impl Serializer for MsgPackSerializer {
    type Txn = Transaction;

    fn serialize(&self, txn: &Self::Txn) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec(txn)?)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Self::Txn> {
        Ok(rmp_serde::from_slice(bytes)?)
    }

    fn attach_seq_no(&self, txn: &mut Self::Txn, seq_no: u64) {
        attach_seq_no_field(txn, seq_no);
    }

    fn txn_time(&self, txn: &Self::Txn) -> Option<u64> {
        txn_time_field(txn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::LedgerError;
    use crate::serializers::Value;

    fn txn() -> Transaction {
        Transaction::from_iter([
            ("identifier".to_owned(), Value::from("cli1")),
            ("reqId".to_owned(), Value::from(3u64)),
            ("op".to_owned(), Value::from("do something")),
        ])
    }

    #[test]
    fn round_trip_preserves_field_order_and_types() {
        let s = MsgPackSerializer::new();
        let t = txn();
        let decoded = s.deserialize(&s.serialize(&t).unwrap()).unwrap();
        assert_eq!(decoded, t);
        let names: Vec<&str> = decoded.keys().map(String::as_str).collect();
        assert_eq!(names, ["identifier", "reqId", "op"]);
    }

    #[test]
    fn serialization_is_deterministic() {
        let s = MsgPackSerializer::new();
        assert_eq!(s.serialize(&txn()).unwrap(), s.serialize(&txn()).unwrap());
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let s = MsgPackSerializer::new();
        assert!(matches!(
            s.deserialize(&[0xc1, 0xff, 0x00]),
            Err(LedgerError::Serialization(_))
        ));
    }

    #[test]
    fn txn_time_is_read_from_the_reserved_field() {
        let s = MsgPackSerializer::new();
        let mut t = txn();
        assert_eq!(s.txn_time(&t), None);
        t.insert(
            crate::serializers::fields::TXN_TIME.to_owned(),
            Value::UInt(1_700_000_000),
        );
        assert_eq!(s.txn_time(&t), Some(1_700_000_000));
    }
}
