use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::session::storage::{KeyValueStore, StorageError, StorageOp, apply_ops};

/// File name of the persisted session inside the state directory
pub const SESSION_FILE: &str = "session.json";

/// Session storage backed by a flat JSON object on disk (session.json).
///
/// The file is read once when opened and rewritten whole on every batch via
/// a temp file in the same directory, so a crash never leaves half a write.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStorage {
    /// Open the session file in `state_dir`. A missing or unreadable file
    /// opens empty, which reads as logged out.
    pub fn open(state_dir: &Path) -> Self {
        let path = state_dir.join(SESSION_FILE);
        let entries = read_entries(&path).unwrap_or_default();
        FileStorage { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let io_err = |source| StorageError::WriteError {
            path: self.path.clone(),
            source,
        };
        fs::create_dir_all(dir).map_err(io_err)?;
        let content = serde_json::to_string_pretty(entries)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        tmp.write_all(content.as_bytes()).map_err(io_err)?;
        tmp.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

fn read_entries(path: &Path) -> Option<BTreeMap<String, String>> {
    let content = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(entries) => Some(entries),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring malformed session file");
            None
        }
    }
}

impl KeyValueStore for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn write_batch(&mut self, ops: &[StorageOp<'_>]) -> Result<(), StorageError> {
        let mut next = self.entries.clone();
        apply_ops(&mut next, ops);
        self.persist(&next)?;
        self.entries = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_and_reopen_round_trip() {
        let dir = TempDir::new().unwrap();
        let mut storage = FileStorage::open(dir.path());
        storage
            .write_batch(&[
                StorageOp::Set("token", "abc"),
                StorageOp::Set("loggedIn", "true"),
                StorageOp::Set("user_id", "7"),
            ])
            .unwrap();

        let reopened = FileStorage::open(dir.path());
        assert_eq!(reopened.get("token"), Some("abc".into()));
        assert_eq!(reopened.get("loggedIn"), Some("true".into()));
        assert_eq!(reopened.get("user_id"), Some("7".into()));
    }

    #[test]
    fn missing_file_opens_empty() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::open(dir.path());
        assert_eq!(storage.get("token"), None);
        assert!(!storage.path().exists());
    }

    #[test]
    fn malformed_file_opens_empty() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(SESSION_FILE), "not json {{{").unwrap();
        let storage = FileStorage::open(dir.path());
        assert_eq!(storage.get("token"), None);
    }

    #[test]
    fn creates_missing_state_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("a").join("b");
        let mut storage = FileStorage::open(&nested);
        storage.set("loggedIn", "false").unwrap();
        assert!(nested.join(SESSION_FILE).exists());
    }

    #[test]
    fn remove_drops_key_on_disk() {
        let dir = TempDir::new().unwrap();
        let mut storage = FileStorage::open(dir.path());
        storage.set("token", "abc").unwrap();
        storage.remove("token").unwrap();
        let content = fs::read_to_string(dir.path().join(SESSION_FILE)).unwrap();
        assert!(!content.contains("abc"));
        assert_eq!(FileStorage::open(dir.path()).get("token"), None);
    }
}
