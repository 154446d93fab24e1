//! Line-oriented transaction log: one record per line, `\n` separator.
//!
//! Records are UTF-8 byte strings that must not contain the separator; the
//! record's key is its 1-based line number.
//!
//! CRASH RULE: a crash can leave the final record without its terminating
//! separator. That record still counts — the bytes were written — so `size`
//! includes it both before and after a restart. On open, the missing
//! separator is appended (the only local repair this system performs) so the
//! next `put` produces a well-formed line.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::{LedgerError, Result};

use super::KeyValueStore;

const LINE_SEP: u8 = b'\n';

/// Append-only text log with line-number keys.
pub struct TextFileStore {
    path: PathBuf,
    file: File,
    /// Byte offset and separator-less length of each record, in key order.
    index: Vec<(u64, u64)>,
}

impl TextFileStore {
    /// Open (creating if absent) `data_dir/name`, scan the record index, and
    /// repair an unterminated final record if the previous run crashed
    /// mid-write.
    pub fn open(data_dir: impl AsRef<Path>, name: &str) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(name);
        let mut file = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(&path)?;

        let mut contents = Vec::new();
        file.seek(SeekFrom::Start(0))?;
        file.read_to_end(&mut contents)?;

        let mut index = Vec::new();
        let mut record_start = 0u64;
        for (pos, byte) in contents.iter().enumerate() {
            if *byte == LINE_SEP {
                index.push((record_start, pos as u64 - record_start));
                record_start = pos as u64 + 1;
            }
        }
        if record_start < contents.len() as u64 {
            // Unterminated tail: count it, then terminate it.
            index.push((record_start, contents.len() as u64 - record_start));
            file.write_all(&[LINE_SEP])?;
            file.sync_data()?;
            info!(path = %path.display(), "appended missing line separator to final record");
        }

        debug!(path = %path.display(), records = index.len(), "opened text file store");
        Ok(TextFileStore { path, file, index })
    }

    /// Path of the backing file. Lets embedders (and crash tests) inspect the
    /// raw bytes.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write record bytes with no terminating separator, as a crash between
    /// the payload write and the separator write would. Test-only.
    #[cfg(test)]
    pub(crate) fn append_unterminated(&mut self, value: &[u8]) -> Result<()> {
        let offset = self.file.metadata()?.len();
        self.file.write_all(value)?;
        self.file.sync_data()?;
        self.index.push((offset, value.len() as u64));
        Ok(())
    }
}

impl KeyValueStore for TextFileStore {
    fn put(&mut self, key: Option<u64>, value: &[u8]) -> Result<u64> {
        if value.contains(&LINE_SEP) {
            return Err(LedgerError::InvalidArgument(
                "record value contains the line separator".into(),
            ));
        }
        let next = self.index.len() as u64 + 1;
        let key = key.unwrap_or(next);
        if key != next {
            return Err(LedgerError::InvalidArgument(format!(
                "non-contiguous key {key}, expected {next}"
            )));
        }
        let offset = self.file.metadata()?.len();
        self.file.write_all(value)?;
        self.file.write_all(&[LINE_SEP])?;
        self.file.sync_data()?;
        self.index.push((offset, value.len() as u64));
        Ok(key)
    }

    fn get(&self, key: u64) -> Result<Vec<u8>> {
        if key == 0 || key > self.index.len() as u64 {
            return Err(LedgerError::NotFound { entity: "transaction", key });
        }
        let (offset, len) = self.index[key as usize - 1];
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut value = vec![0u8; len as usize];
        file.read_exact(&mut value)?;
        Ok(value)
    }

    fn size(&self) -> u64 {
        self.index.len() as u64
    }

    fn close(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_assigns_contiguous_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TextFileStore::open(dir.path(), "transactions").unwrap();
        assert_eq!(store.put(None, b"one").unwrap(), 1);
        assert_eq!(store.put(Some(2), b"two").unwrap(), 2);
        assert!(matches!(
            store.put(Some(5), b"gap"),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert_eq!(store.size(), 2);
        assert_eq!(store.get(1).unwrap(), b"one");
        assert_eq!(store.get(2).unwrap(), b"two");
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = TextFileStore::open(dir.path(), "transactions").unwrap();
            store.put(None, b"alpha").unwrap();
            store.put(None, b"beta").unwrap();
            store.close().unwrap();
        }
        let store = TextFileStore::open(dir.path(), "transactions").unwrap();
        assert_eq!(store.size(), 2);
        assert_eq!(store.get(2).unwrap(), b"beta");
    }

    #[test]
    fn unterminated_tail_counts_and_is_repaired_on_open() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = TextFileStore::open(dir.path(), "transactions").unwrap();
            store.put(None, b"first").unwrap();
            store.put(None, b"second").unwrap();
            store.append_unterminated(b"third").unwrap();
            // The tail record counts immediately: its bytes are on disk.
            assert_eq!(store.size(), 3);
            store.close().unwrap();
        }

        let path = dir.path().join("transactions");
        let before = std::fs::read(&path).unwrap();
        assert_eq!(before.iter().filter(|b| **b == LINE_SEP).count(), 2);

        let mut store = TextFileStore::open(dir.path(), "transactions").unwrap();
        assert_eq!(store.size(), 3);
        assert_eq!(store.get(3).unwrap(), b"third");

        // Repair appended exactly one separator, so the next put produces a
        // well-formed fourth line.
        let after = std::fs::read(&path).unwrap();
        assert_eq!(after.iter().filter(|b| **b == LINE_SEP).count(), 3);
        store.put(None, b"fourth").unwrap();
        assert_eq!(store.size(), 4);
        assert_eq!(store.get(4).unwrap(), b"fourth");
    }

    #[test]
    fn embedded_separator_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TextFileStore::open(dir.path(), "transactions").unwrap();
        assert!(matches!(
            store.put(None, b"bad\nrecord"),
            Err(LedgerError::InvalidArgument(_))
        ));
        assert_eq!(store.size(), 0);
    }

    #[test]
    fn range_iteration_is_inclusive_and_tolerates_inversion() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TextFileStore::open(dir.path(), "transactions").unwrap();
        for i in 1..=5u64 {
            store.put(None, i.to_string().as_bytes()).unwrap();
        }
        let collected: Vec<_> = store
            .iter_range(2, 4)
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(
            collected,
            vec![(2, b"2".to_vec()), (3, b"3".to_vec()), (4, b"4".to_vec())]
        );
        assert_eq!(store.iter_range(4, 2).count(), 0);
    }
}
