use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::storage::domain::key_value_store::{KeyValueStore, StorageError};

const STORE_FILE_NAME: &str = "storage.json";

/// Key-value store persisted as a single JSON object.
///
/// Every `set` writes the whole map to a temporary file in the same
/// directory and renames it over the store file, so readers only ever see
/// a complete map.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
    quota: Option<usize>,
}

impl FileStore {
    /// Opens the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>, quota: Option<usize>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(json) => serde_json::from_str(&json)
                .map_err(|e| StorageError::Corrupt(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        log::debug!(
            "Opened store {} ({} keys)",
            path.display(),
            entries.len()
        );
        Ok(Self {
            path,
            entries,
            quota,
        })
    }

    /// Platform data directory location:
    ///
    /// - macOS: `~/Library/Application Support/FaceCam/storage.json`
    /// - Linux: `$XDG_DATA_HOME/FaceCam/storage.json`
    /// - Windows: `%APPDATA%/FaceCam/storage.json`
    pub fn default_path() -> Result<PathBuf, StorageError> {
        dirs::data_dir()
            .map(|d| d.join("FaceCam").join(STORE_FILE_NAME))
            .ok_or(StorageError::NoDataDir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_atomically(&self, json: &[u8]) -> Result<(), StorageError> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StorageError::Io(e.error))?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut next = self.entries.clone();
        next.insert(key.to_string(), value.to_string());
        let json =
            serde_json::to_vec(&next).map_err(|e| StorageError::Corrupt(e.to_string()))?;

        if let Some(quota) = self.quota {
            if json.len() > quota {
                return Err(StorageError::QuotaExceeded {
                    needed: json.len(),
                    quota,
                });
            }
        }

        self.write_atomically(&json)?;
        self.entries = next;
        log::debug!("Stored {key} ({} bytes)", value.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(tmp: &TempDir, quota: Option<usize>) -> FileStore {
        FileStore::open(tmp.path().join("facecam").join("storage.json"), quota).unwrap()
    }

    #[test]
    fn test_missing_file_is_empty_store() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp, None);
        assert_eq!(store.get("recordedVideo").unwrap(), None);
        assert!(!store.path().exists());
    }

    #[test]
    fn test_value_survives_reopen() {
        let tmp = TempDir::new().unwrap();
        let mut store = store_in(&tmp, None);
        store.set("recordedVideo", "data:video/mp4;base64,AAAA").unwrap();

        let reopened = store_in(&tmp, None);

        assert_eq!(
            reopened.get("recordedVideo").unwrap().as_deref(),
            Some("data:video/mp4;base64,AAAA")
        );
    }

    #[test]
    fn test_set_overwrites_and_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let mut store = store_in(&tmp, None);
        store.set("k", "one").unwrap();
        store.set("k", "two").unwrap();

        let files: Vec<_> = fs::read_dir(tmp.path().join("facecam"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();

        assert_eq!(files, vec![std::ffi::OsString::from("storage.json")]);
        assert_eq!(store_in(&tmp, None).get("k").unwrap().as_deref(), Some("two"));
    }

    #[test]
    fn test_quota_keeps_previous_value_on_disk() {
        let tmp = TempDir::new().unwrap();
        let mut store = store_in(&tmp, Some(32));
        store.set("k", "tiny").unwrap();

        let err = store.set("k", &"x".repeat(64)).unwrap_err();

        assert!(matches!(err, StorageError::QuotaExceeded { quota: 32, .. }));
        assert_eq!(store.get("k").unwrap().as_deref(), Some("tiny"));
        assert_eq!(store_in(&tmp, None).get("k").unwrap().as_deref(), Some("tiny"));
    }

    #[test]
    fn test_corrupt_file_is_reported() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("storage.json");
        fs::write(&path, "{not json").unwrap();

        let err = FileStore::open(&path, None).unwrap_err();

        assert!(matches!(err, StorageError::Corrupt(_)));
    }

    #[test]
    fn test_default_path_is_under_facecam() {
        let path = FileStore::default_path().unwrap();
        assert!(path.ends_with("FaceCam/storage.json"));
    }
}
