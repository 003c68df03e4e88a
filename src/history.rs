//! Bounded, newest-first activity ledgers (loaded playlists, recent plays)

use std::collections::VecDeque;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::Result;
use crate::storage::{self, Storage};

pub const HISTORY_CAPACITY: usize = 10;

/// Ring of at most `HISTORY_CAPACITY` entries persisted under one key.
/// Index 0 is the newest entry.
#[derive(Debug, Clone)]
pub struct HistoryLog<T> {
    key: &'static str,
    entries: VecDeque<T>,
}

impl<T> HistoryLog<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    pub fn new(key: &'static str) -> Self {
        Self {
            key,
            entries: VecDeque::with_capacity(HISTORY_CAPACITY),
        }
    }

    /// Load from storage; a missing or corrupt blob yields an empty log
    pub fn load(key: &'static str, storage: &dyn Storage) -> Self {
        let stored: Vec<T> = storage::load_or_default(storage, key);
        let mut entries: VecDeque<T> = stored.into();
        entries.truncate(HISTORY_CAPACITY);
        Self { key, entries }
    }

    /// Add a newest entry, evicting the oldest once full
    pub fn push(&mut self, entry: T, storage: &mut dyn Storage) -> Result<()> {
        self.entries.push_front(entry);
        self.entries.truncate(HISTORY_CAPACITY);
        self.persist(storage)
    }

    /// Remove the entry at `index` (0 = newest); out-of-range is a no-op
    pub fn remove(&mut self, index: usize, storage: &mut dyn Storage) -> Result<Option<T>> {
        let removed = self.entries.remove(index);
        if removed.is_none() {
            warn!("No history entry at index {}", index);
            return Ok(None);
        }
        self.persist(storage)?;
        Ok(removed)
    }

    pub fn clear(&mut self, storage: &mut dyn Storage) -> Result<()> {
        self.entries.clear();
        self.persist(storage)
    }

    /// Drop in-memory entries without touching storage
    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn persist(&self, storage: &mut dyn Storage) -> Result<()> {
        let snapshot: Vec<&T> = self.entries.iter().collect();
        storage::save(storage, self.key, &snapshot)
    }
}
