//! Line-oriented text codec: fields joined by a single-character delimiter
//! in declared schema order.
//!
//! Wire form: UTF-8, one transaction per record, columns in schema order.
//! Empty trailing columns are permitted and decode to type-zero values,
//! which is the entire schema-evolution mechanism: a reader with a grown
//! schema decodes old records by zero-filling the appended fields, and the
//! original leaf hashes survive because hashing is over the bytes as
//! written.
//!
//! On encode, trailing columns whose encoded form is the empty string are
//! stripped, so bytes written under an ancestor schema re-encode
//! byte-identically after a decode under the grown schema.

use crate::errors::{LedgerError, Result};

use super::{
    attach_seq_no_field, txn_time_field, FieldType, OrderedFields, Serializer, Transaction, Value,
};

/// The fixed column delimiter.
pub const DELIMITER: char = '|';

/// Schema-driven delimiter-separated codec.
pub struct CompactSerializer {
    fields: OrderedFields,
}

impl CompactSerializer {
    pub fn new(fields: OrderedFields) -> Self {
        CompactSerializer { fields }
    }

    /// Encode one field value to its column text.
    fn encode_field(name: &str, ty: FieldType, value: &Value) -> Result<String> {
        match (ty, value) {
            (FieldType::Str, Value::Str(s)) => {
                if s.contains(DELIMITER) || s.contains('\n') {
                    return Err(LedgerError::InvalidArgument(format!(
                        "field {name} contains a reserved delimiter character"
                    )));
                }
                Ok(s.clone())
            }
            (FieldType::UInt, Value::UInt(v)) => Ok(v.to_string()),
            _ => Err(LedgerError::InvalidArgument(format!(
                "field {name} does not match its declared type"
            ))),
        }
    }

    /// Decode one column under its declared type. The empty column is the
    /// type-zero value.
    fn decode_field(name: &str, ty: FieldType, column: &str) -> Result<Value> {
        if column.is_empty() {
            return Ok(ty.zero());
        }
        match ty {
            FieldType::Str => Ok(Value::Str(column.to_owned())),
            FieldType::UInt => column
                .parse::<u64>()
                .map(Value::UInt)
                .map_err(|_| {
                    LedgerError::Serialization(format!(
                        "field {name}: {column:?} is not an unsigned integer"
                    ))
                }),
        }
    }
}

impl Serializer for CompactSerializer {
    type Txn = Transaction;

    fn serialize(&self, txn: &Self::Txn) -> Result<Vec<u8>> {
        let mut columns = Vec::with_capacity(self.fields.len());
        for (name, ty) in &self.fields {
            match txn.get(name) {
                Some(value) => columns.push(Self::encode_field(name, *ty, value)?),
                None => columns.push(String::new()),
            }
        }
        while columns.last().is_some_and(|c| c.is_empty()) {
            columns.pop();
        }
        Ok(columns.join(&DELIMITER.to_string()).into_bytes())
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<Self::Txn> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| LedgerError::Serialization(format!("record is not UTF-8: {e}")))?;
        let columns: Vec<&str> = if text.is_empty() {
            Vec::new()
        } else {
            text.split(DELIMITER).collect()
        };
        if columns.len() > self.fields.len() {
            return Err(LedgerError::Serialization(format!(
                "record has {} columns, schema declares {}",
                columns.len(),
                self.fields.len()
            )));
        }
        let mut txn = Transaction::with_capacity(self.fields.len());
        for (i, (name, ty)) in self.fields.iter().enumerate() {
            let value = match columns.get(i) {
                Some(column) => Self::decode_field(name, *ty, column)?,
                // Absent trailing field under a grown schema.
                None => ty.zero(),
            };
            txn.insert(name.clone(), value);
        }
        Ok(txn)
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
    use crate::serializers::ordered_fields;

    fn base_schema() -> OrderedFields {
        ordered_fields(&[
            ("identifier", FieldType::Str),
            ("reqId", FieldType::UInt),
            ("op", FieldType::Str),
        ])
    }

    fn txn(identifier: &str, req_id: u64, op: &str) -> Transaction {
        Transaction::from_iter([
            ("identifier".to_owned(), Value::from(identifier)),
            ("reqId".to_owned(), Value::from(req_id)),
            ("op".to_owned(), Value::from(op)),
        ])
    }

    #[test]
    fn wire_form_is_delimited_in_schema_order() {
        let s = CompactSerializer::new(base_schema());
        assert_eq!(
            s.serialize(&txn("cli1", 1, "do something")).unwrap(),
            b"cli1|1|do something"
        );
    }

    #[test]
    fn round_trip() {
        let s = CompactSerializer::new(base_schema());
        let t = txn("cli1", 42, "op text");
        assert_eq!(s.deserialize(&s.serialize(&t).unwrap()).unwrap(), t);
    }

    #[test]
    fn fewer_columns_zero_fill_the_grown_schema() {
        let mut grown = base_schema();
        grown.push(("newField".to_owned(), FieldType::Str));
        let s = CompactSerializer::new(grown);

        let t = s.deserialize(b"cli1|1|do something").unwrap();
        assert_eq!(t.get("newField"), Some(&Value::Str(String::new())));
        assert_eq!(t.get("reqId"), Some(&Value::UInt(1)));
    }

    #[test]
    fn ancestor_bytes_survive_a_decode_encode_cycle_under_grown_schema() {
        // The round-trip law for ancestor-schema payloads: re-encoding the
        // zero-filled decode must reproduce the original bytes.
        let mut grown = base_schema();
        grown.push(("newField".to_owned(), FieldType::Str));
        let s = CompactSerializer::new(grown);

        let ancestor_bytes = b"cli1|1|do something".to_vec();
        let decoded = s.deserialize(&ancestor_bytes).unwrap();
        assert_eq!(s.serialize(&decoded).unwrap(), ancestor_bytes);
    }

    #[test]
    fn too_many_columns_is_a_serialization_error() {
        let s = CompactSerializer::new(base_schema());
        assert!(matches!(
            s.deserialize(b"a|1|b|extra"),
            Err(LedgerError::Serialization(_))
        ));
    }

    #[test]
    fn non_numeric_uint_column_is_a_serialization_error() {
        let s = CompactSerializer::new(base_schema());
        assert!(matches!(
            s.deserialize(b"a|not-a-number|b"),
            Err(LedgerError::Serialization(_))
        ));
    }

    #[test]
    fn embedded_delimiter_is_rejected_on_encode() {
        let s = CompactSerializer::new(base_schema());
        assert!(matches!(
            s.serialize(&txn("cli|1", 1, "op")),
            Err(LedgerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn type_mismatch_is_rejected_on_encode() {
        let s = CompactSerializer::new(base_schema());
        let mut t = txn("cli1", 1, "op");
        t.insert("reqId".to_owned(), Value::from("not an int"));
        assert!(matches!(
            s.serialize(&t),
            Err(LedgerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn attach_seq_no_sets_the_reserved_field() {
        let s = CompactSerializer::new(base_schema());
        let mut t = txn("cli1", 1, "op");
        s.attach_seq_no(&mut t, 7);
        assert_eq!(t.get(crate::serializers::fields::SEQ_NO), Some(&Value::UInt(7)));
    }
}
