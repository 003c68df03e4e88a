//! On-device key-value persistence
//!
//! Values are JSON strings. Readers treat absent or corrupt entries as the
//! type's default, so nothing here is fatal to the player.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{Error, Result};

pub const CHANNELS_KEY: &str = "channels";
pub const UPLOAD_HISTORY_KEY: &str = "uploadHistory";
pub const RECENT_PLAYS_KEY: &str = "recentPlays";
pub const THEME_KEY: &str = "theme";
const PROGRESS_PREFIX: &str = "progress-";

/// Key holding the last playback position for a stream URL
pub fn progress_key(url: &str) -> String {
    format!("{}{}", PROGRESS_PREFIX, url)
}

pub trait Storage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: String) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
    /// Wipe every key
    fn clear(&mut self) -> Result<()>;
    fn keys(&self) -> Vec<String>;
}

/// Read and deserialize a key, falling back to `T::default()` when the key
/// is missing or its content does not parse
pub fn load_or_default<T>(storage: &dyn Storage, key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    load(storage, key).unwrap_or_default()
}

/// Read and deserialize a key; corrupt content is logged and reported as absent
pub fn load<T: DeserializeOwned>(storage: &dyn Storage, key: &str) -> Option<T> {
    let raw = storage.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring corrupt '{}' entry: {}", key, e);
            None
        }
    }
}

/// Serialize a value in full and write it under `key`
pub fn save<T: Serialize + ?Sized>(storage: &mut dyn Storage, key: &str, value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    storage.set(key, json)
}

/// Volatile storage, used by tests and when no data directory is available
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    entries: BTreeMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

/// Storage backed by a single JSON object on disk. Every write rewrites the
/// whole file through a temporary sibling and an atomic rename.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStorage {
    /// Default location: `<data_dir>/pixstream/storage.json`
    pub fn default_path() -> PathBuf {
        let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("pixstream");
        path.push("storage.json");
        path
    }

    /// Open (or start) the storage file. An unreadable or corrupt file is
    /// treated as empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!("Storage file {} is corrupt, starting empty: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(_) => {
                debug!("No storage file at {}", path.display());
                BTreeMap::new()
            }
        };
        Self { path, entries }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the full contents to a temporary file beside the target
    fn stage(&self) -> Result<NamedTempFile> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent).map_err(|e| Error::Storage(format!("{}: {}", parent.display(), e)))?;

        let mut staged = NamedTempFile::new_in(parent)?;
        serde_json::to_writer_pretty(staged.as_file_mut(), &self.entries)?;
        staged.as_file_mut().sync_all()?;
        Ok(staged)
    }

    /// Replace the file in one rename so a crash leaves either the old or
    /// the new contents on disk
    fn flush(&self) -> Result<()> {
        self.stage()?
            .persist(&self.path)
            .map_err(|e| Error::Storage(format!("{}: {}", self.path.display(), e.error)))?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.flush()
    }

    fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_or_default_on_missing_and_corrupt() {
        let mut storage = MemoryStorage::new();
        let missing: Vec<String> = load_or_default(&storage, "nothing");
        assert!(missing.is_empty());

        storage.set("broken", "{not json".to_string()).unwrap();
        let corrupt: Vec<String> = load_or_default(&storage, "broken");
        assert!(corrupt.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let mut storage = MemoryStorage::new();
        save(&mut storage, "list", &vec!["a", "b"]).unwrap();
        let loaded: Vec<String> = load_or_default(&storage, "list");
        assert_eq!(loaded, vec!["a", "b"]);
    }

    #[test]
    fn test_file_storage_persists_across_opens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        let mut storage = FileStorage::open(&path);
        storage.set(THEME_KEY, "\"dark\"".to_string()).unwrap();
        storage.set(&progress_key("http://a/1.ts"), "{}".to_string()).unwrap();
        storage.remove(&progress_key("http://a/1.ts")).unwrap();

        let reopened = FileStorage::open(&path);
        assert_eq!(reopened.get(THEME_KEY).as_deref(), Some("\"dark\""));
        assert_eq!(reopened.keys(), vec![THEME_KEY.to_string()]);
    }

    #[test]
    fn test_interrupted_write_keeps_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");

        let mut storage = FileStorage::open(&path);
        storage.set(THEME_KEY, "dark".to_string()).unwrap();

        // Stage the next write but never rename it into place
        storage.entries.insert(THEME_KEY.to_string(), "light".to_string());
        let staged = storage.stage().unwrap();
        let staged_path = staged.path().to_path_buf();
        assert!(staged_path.exists());
        drop(staged);

        let reopened = FileStorage::open(&path);
        assert_eq!(reopened.get(THEME_KEY).as_deref(), Some("dark"));
        assert!(!staged_path.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_file_storage_corrupt_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "garbage").unwrap();

        let mut storage = FileStorage::open(&path);
        assert!(storage.keys().is_empty());

        storage.set(CHANNELS_KEY, "[]".to_string()).unwrap();
        storage.clear().unwrap();
        assert!(FileStorage::open(&path).keys().is_empty());
    }
}
