//! Embedded ordered KV transaction log backed by sled.
//!
//! Keys are stored as decimal strings (`"1".."n"`, no zero-padding), the
//! same external key space as the text store. Iteration never relies on
//! sled's lexicographic ordering: contiguity makes direct key lookups
//! sufficient, and `"10"` sorting before `"2"` is irrelevant.

use std::path::Path;

use tracing::debug;

use crate::errors::{LedgerError, Result};

use super::KeyValueStore;

/// Transaction log over a sled tree.
pub struct SledStore {
    db: sled::Db,
    tree: sled::Tree,
    len: u64,
}

impl SledStore {
    /// Open (creating if absent) the sled database at `data_dir` and the
    /// record tree `name` inside it.
    pub fn open(data_dir: impl AsRef<Path>, name: &str) -> Result<Self> {
        let db = sled::open(data_dir.as_ref())?;
        let tree = db.open_tree(name)?;
        let len = tree.len() as u64;
        debug!(records = len, name, "opened sled store");
        Ok(SledStore { db, tree, len })
    }
}

impl KeyValueStore for SledStore {
    fn put(&mut self, key: Option<u64>, value: &[u8]) -> Result<u64> {
        let next = self.len + 1;
        let key = key.unwrap_or(next);
        if key != next {
            return Err(LedgerError::InvalidArgument(format!(
                "non-contiguous key {key}, expected {next}"
            )));
        }
        self.tree.insert(key.to_string().as_bytes(), value)?;
        self.tree.flush()?;
        self.len = key;
        Ok(key)
    }

    fn get(&self, key: u64) -> Result<Vec<u8>> {
        if key == 0 || key > self.len {
            return Err(LedgerError::NotFound { entity: "transaction", key });
        }
        match self.tree.get(key.to_string().as_bytes())? {
            Some(value) => Ok(value.to_vec()),
            None => Err(LedgerError::NotFound { entity: "transaction", key }),
        }
    }

    fn size(&self) -> u64 {
        self.len
    }

    fn close(&mut self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = SledStore::open(dir.path(), "transactions").unwrap();
            assert_eq!(store.put(None, b"one").unwrap(), 1);
            assert_eq!(store.put(None, b"two").unwrap(), 2);
            store.close().unwrap();
        }
        let store = SledStore::open(dir.path(), "transactions").unwrap();
        assert_eq!(store.size(), 2);
        assert_eq!(store.get(1).unwrap(), b"one");
        assert_eq!(store.get(2).unwrap(), b"two");
        assert!(matches!(
            store.get(3),
            Err(LedgerError::NotFound { entity: "transaction", key: 3 })
        ));
    }

    #[test]
    fn contiguity_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SledStore::open(dir.path(), "transactions").unwrap();
        store.put(None, b"one").unwrap();
        assert!(matches!(
            store.put(Some(3), b"gap"),
            Err(LedgerError::InvalidArgument(_))
        ));
    }

    #[test]
    fn ten_plus_records_keep_numeric_key_order() {
        // 12 records: lexicographic "10" < "2" must not leak into iteration.
        let dir = tempfile::tempdir().unwrap();
        let mut store = SledStore::open(dir.path(), "transactions").unwrap();
        for i in 1..=12u64 {
            store.put(None, format!("txn-{i}").as_bytes()).unwrap();
        }
        let keys: Vec<u64> = store
            .iter_range(1, 12)
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(keys, (1..=12).collect::<Vec<_>>());
        assert_eq!(store.get(10).unwrap(), b"txn-10");
    }
}
