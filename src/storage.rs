// ============================================================================
// KEY-VALUE STORAGE: the substrate the history lists are persisted to
// ============================================================================

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::StorageError;

/// String-keyed text store. Writes overwrite the whole value.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    /// Remove every record this store owns. Nothing else is touched.
    fn clear(&mut self) -> Result<(), StorageError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Box<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value)
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        (**self).clear()
    }
}

// ----------------------------------------------------------------------------
//  In-memory store
// ----------------------------------------------------------------------------

/// Volatile store, optionally capped at a total byte budget (keys + values),
/// mirroring a browser's local-storage quota.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: HashMap::new(),
            quota: Some(quota),
        }
    }

    pub fn used_bytes(&self) -> usize {
        self.entries.iter().map(|(k, v)| k.len() + v.len()).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(quota) = self.quota {
            let replaced = self.entries.get(key).map_or(0, |v| key.len() + v.len());
            let needed = self.used_bytes() - replaced + key.len() + value.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded { needed, quota });
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&mut self) -> Result<(), StorageError> {
        self.entries.clear();
        Ok(())
    }
}

// ----------------------------------------------------------------------------
//  File-backed store
// ----------------------------------------------------------------------------

/// One `<key>.json` file per key inside a directory. The directory may be shared
/// with other files; the store only ever deletes records of keys it owns.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    /// Keys claimed up front plus every key written through this store.
    owned: BTreeSet<String>,
}

const FILE_EXT: &str = "json";
const TMP_EXT: &str = "json.tmp";

impl FileStore {
    /// Use `dir` as the backing directory, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            owned: BTreeSet::new(),
        })
    }

    /// Claim `keys` so [`KeyValueStore::clear`] removes their records even when
    /// they were written by an earlier session.
    pub fn with_keys<'a>(mut self, keys: impl IntoIterator<Item = &'a str>) -> Self {
        self.owned.extend(keys.into_iter().map(str::to_owned));
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn owned_keys(&self) -> impl Iterator<Item = &str> {
        self.owned.iter().map(String::as_str)
    }

    fn path_for(&self, key: &str, ext: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{}.{}", key, ext)))
    }
}

fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key, FILE_EXT)?;
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key, FILE_EXT)?;
        let tmp = self.path_for(key, TMP_EXT)?;
        // Owned before the write so a half-written record is cleared too.
        self.owned.insert(key.to_string());
        // Readers only ever see a complete record.
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Remove the record and leftover temp file of every owned key. Keeps going
    /// past failures and reports the first one.
    fn clear(&mut self) -> Result<(), StorageError> {
        let mut first_err = None;
        for key in &self.owned {
            for ext in [FILE_EXT, TMP_EXT] {
                let result = self
                    .path_for(key, ext)
                    .and_then(|path| remove_if_present(&path).map_err(StorageError::from));
                if let Err(e) = result {
                    first_err.get_or_insert(e);
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "hexpick-storage-{}-{}",
            name,
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn memory_store_round_trips_and_clears() {
        let mut store = MemoryStore::new();
        assert_eq!(store.get("colorHistory").unwrap(), None);
        store.set("colorHistory", "[]").unwrap();
        assert_eq!(store.get("colorHistory").unwrap().as_deref(), Some("[]"));
        store.clear().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn boxed_store_forwards_calls() {
        let mut store: Box<dyn KeyValueStore> = Box::new(MemoryStore::new());
        store.set("colorHistory", "[1]").unwrap();
        assert_eq!(store.get("colorHistory").unwrap().as_deref(), Some("[1]"));
        store.clear().unwrap();
        assert_eq!(store.get("colorHistory").unwrap(), None);
    }

    #[test]
    fn memory_quota_counts_replaced_value_once() {
        let mut store = MemoryStore::with_quota(10);
        store.set("k", "123456789").unwrap();
        // Overwriting the same key only needs room for the new value.
        store.set("k", "abcdefghi").unwrap();
        let err = store.set("k", "abcdefghij").unwrap_err();
        assert!(matches!(
            err,
            StorageError::QuotaExceeded {
                needed: 11,
                quota: 10
            }
        ));
        assert_eq!(store.get("k").unwrap().as_deref(), Some("abcdefghi"));
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = scratch_dir("persist");
        let mut store = FileStore::open(&dir).unwrap();
        store.set("imageHistory", r#"[{"a":1}]"#).unwrap();

        let reopened = FileStore::open(&dir).unwrap();
        assert_eq!(
            reopened.get("imageHistory").unwrap().as_deref(),
            Some(r#"[{"a":1}]"#)
        );
        assert_eq!(reopened.get("colorHistory").unwrap(), None);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn file_store_clear_removes_records_only() {
        let dir = scratch_dir("clear");
        let mut store = FileStore::open(&dir).unwrap();
        store.set("colorHistory", "[]").unwrap();
        store.set("imageHistory", "[]").unwrap();
        fs::write(dir.join("notes.txt"), "keep me").unwrap();
        fs::write(dir.join("my_project.json"), "{}").unwrap();

        store.clear().unwrap();
        assert_eq!(store.get("colorHistory").unwrap(), None);
        assert_eq!(store.get("imageHistory").unwrap(), None);
        assert!(dir.join("notes.txt").exists());
        assert!(dir.join("my_project.json").exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn claimed_keys_are_cleared_across_sessions() {
        let dir = scratch_dir("claimed");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("colorHistory.json"), "[]").unwrap();
        fs::write(dir.join("colorHistory.json.tmp"), "[").unwrap();
        fs::write(dir.join("settings.json"), "{}").unwrap();

        let mut store = FileStore::open(&dir).unwrap().with_keys(["colorHistory"]);
        assert_eq!(store.owned_keys().collect::<Vec<_>>(), ["colorHistory"]);
        store.clear().unwrap();
        assert!(!dir.join("colorHistory.json").exists());
        assert!(!dir.join("colorHistory.json.tmp").exists());
        assert!(dir.join("settings.json").exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn clear_reports_failures_without_touching_other_files() {
        let dir = scratch_dir("stuck");
        fs::create_dir_all(dir.join("colorHistory.json.tmp")).unwrap();
        fs::write(dir.join("my_project.json"), "{}").unwrap();

        let mut store = FileStore::open(&dir).unwrap();
        assert!(store.set("colorHistory", "[]").is_err());
        assert!(store.clear().is_err());
        assert!(dir.join("my_project.json").exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let dir = scratch_dir("keys");
        let mut store = FileStore::open(&dir).unwrap();
        assert!(matches!(
            store.set("../escape", "x"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(store.get(""), Err(StorageError::InvalidKey(_))));
        let _ = fs::remove_dir_all(&dir);
    }
}
