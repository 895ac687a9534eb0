use std::collections::BTreeMap;
use std::path::PathBuf;

/// Error type for durable session storage
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("could not write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not encode session state: {0}")]
    EncodeError(#[from] serde_json::Error),
}

/// One pending write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp<'a> {
    Set(&'a str, &'a str),
    Remove(&'a str),
}

/// Durable string key-value storage for the session
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;

    /// Apply every op, or none if the backing store fails
    fn write_batch(&mut self, ops: &[StorageOp<'_>]) -> Result<(), StorageError>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        self.write_batch(&[StorageOp::Set(key, value)])
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.write_batch(&[StorageOp::Remove(key)])
    }
}

/// Apply a batch to a plain map
pub(crate) fn apply_ops(map: &mut BTreeMap<String, String>, ops: &[StorageOp<'_>]) {
    for op in ops {
        match op {
            StorageOp::Set(key, value) => {
                map.insert((*key).to_string(), (*value).to_string());
            }
            StorageOp::Remove(key) => {
                map.remove(*key);
            }
        }
    }
}

/// Storage that lives as long as the value does
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: BTreeMap<String, String>,
    writes: usize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of batches written so far
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn write_batch(&mut self, ops: &[StorageOp<'_>]) -> Result<(), StorageError> {
        apply_ops(&mut self.entries, ops);
        self.writes += 1;
        Ok(())
    }
}
