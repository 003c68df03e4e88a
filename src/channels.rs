//! In-memory channel collection and its derived views

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::{Channel, ChannelStatus};
use crate::storage::{self, Storage, CHANNELS_KEY};

/// Status dimension of the channel list filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Offline,
}

impl StatusFilter {
    pub fn matches(&self, status: ChannelStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => status == ChannelStatus::Active,
            StatusFilter::Offline => status == ChannelStatus::Offline,
        }
    }
}

/// Criteria for [`ChannelStore::filtered_view`]. The default matches everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelFilter {
    /// Exact group name to restrict to
    pub group: Option<String>,
    /// Case-insensitive substring of the channel name
    pub search: String,
    pub favorites_only: bool,
    pub status: StatusFilter,
}

impl ChannelFilter {
    pub fn matches(&self, channel: &Channel) -> bool {
        if let Some(group) = &self.group {
            if &channel.group != group {
                return false;
            }
        }
        if self.favorites_only && !channel.favorite {
            return false;
        }
        if !self.status.matches(channel.status) {
            return false;
        }
        contains_ignore_case(&channel.name, &self.search)
    }
}

/// Case-insensitive substring check
fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// One group of the filtered view, in original relative order
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelGroup<'a> {
    pub name: &'a str,
    pub channels: Vec<&'a Channel>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatusCounts {
    pub total: usize,
    pub active: usize,
    pub offline: usize,
}

/// Ordered channel collection, keyed by URL. Insertion order is parse order.
#[derive(Debug, Clone, Default)]
pub struct ChannelStore {
    channels: Vec<Channel>,
}

impl ChannelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore the persisted collection; missing or corrupt data gives an empty store
    pub fn load(storage: &dyn Storage) -> Self {
        let channels: Vec<Channel> = storage::load_or_default(storage, CHANNELS_KEY);
        Self {
            channels: dedup_by_url(channels),
        }
    }

    /// Swap in a whole new collection and persist it. Later duplicates of a
    /// URL are dropped so that URLs stay unique.
    pub fn replace_all(&mut self, channels: Vec<Channel>, storage: &mut dyn Storage) -> Result<()> {
        self.channels = dedup_by_url(channels);
        self.persist(storage)
    }

    /// Flip the favorite flag of the channel with `url`. Returns the new flag,
    /// or `None` without touching storage when no channel matches.
    pub fn toggle_favorite(&mut self, url: &str, storage: &mut dyn Storage) -> Result<Option<bool>> {
        let Some(channel) = self.find_mut(url) else {
            debug!("toggle_favorite: no channel with url {}", url);
            return Ok(None);
        };
        channel.favorite = !channel.favorite;
        let favorite = channel.favorite;
        self.persist(storage)?;
        Ok(Some(favorite))
    }

    /// Update a channel's status and persist
    pub fn set_status(&mut self, url: &str, status: ChannelStatus, storage: &mut dyn Storage) -> Result<bool> {
        if !self.update_status(url, status) {
            return Ok(false);
        }
        self.persist(storage)?;
        Ok(true)
    }

    /// Update a channel's status in memory only; callers batching several
    /// updates persist once afterwards
    pub fn update_status(&mut self, url: &str, status: ChannelStatus) -> bool {
        match self.find_mut(url) {
            Some(channel) => {
                channel.status = status;
                true
            }
            None => false,
        }
    }

    /// Empty the collection and drop its persisted blob
    pub fn clear_all(&mut self, storage: &mut dyn Storage) -> Result<()> {
        self.channels.clear();
        storage.remove(CHANNELS_KEY)
    }

    /// Forget channels in memory without touching storage
    pub fn reset(&mut self) {
        self.channels.clear();
    }

    /// Write the full collection under the `channels` key
    pub fn persist(&self, storage: &mut dyn Storage) -> Result<()> {
        storage::save(storage, CHANNELS_KEY, &self.channels)
    }

    /// Channels matching `filter`, partitioned by group. Groups appear in
    /// first-occurrence order among matching channels; empty groups are left out.
    pub fn filtered_view(&self, filter: &ChannelFilter) -> Vec<ChannelGroup<'_>> {
        let mut groups: Vec<ChannelGroup<'_>> = Vec::new();
        for channel in self.channels.iter().filter(|c| filter.matches(c)) {
            match groups.iter_mut().find(|g| g.name == channel.group) {
                Some(group) => group.channels.push(channel),
                None => groups.push(ChannelGroup {
                    name: &channel.group,
                    channels: vec![channel],
                }),
            }
        }
        groups
    }

    /// Distinct group names in first-occurrence order
    pub fn groups(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.channels
            .iter()
            .map(|c| c.group.as_str())
            .filter(|g| seen.insert(*g))
            .collect()
    }

    pub fn favorites(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter().filter(|c| c.favorite)
    }

    pub fn with_status(&self, status: ChannelStatus) -> impl Iterator<Item = &Channel> {
        self.channels.iter().filter(move |c| c.status == status)
    }

    pub fn counts(&self) -> StatusCounts {
        StatusCounts {
            total: self.channels.len(),
            active: self.with_status(ChannelStatus::Active).count(),
            offline: self.with_status(ChannelStatus::Offline).count(),
        }
    }

    pub fn find(&self, url: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.url == url)
    }

    fn find_mut(&mut self, url: &str) -> Option<&mut Channel> {
        self.channels.iter_mut().find(|c| c.url == url)
    }

    /// Uniformly random channel, if any
    pub fn random<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Channel> {
        self.channels.choose(rng)
    }

    pub fn urls(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.url.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel> {
        self.channels.iter()
    }

    pub fn as_slice(&self) -> &[Channel] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

fn dedup_by_url(channels: Vec<Channel>) -> Vec<Channel> {
    let before = channels.len();
    let mut seen = HashSet::new();
    let unique: Vec<Channel> = channels
        .into_iter()
        .filter(|c| seen.insert(c.url.clone()))
        .collect();
    if unique.len() != before {
        warn!("Dropped {} channels with duplicate URLs", before - unique.len());
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn channel(name: &str, url: &str, group: &str) -> Channel {
        Channel::new(name, url).with_group(group)
    }

    fn sample_store(storage: &mut MemoryStorage) -> ChannelStore {
        let mut store = ChannelStore::new();
        let mut channels = vec![
            channel("CNN", "http://a/cnn", "News"),
            channel("ESPN", "http://a/espn", "Sports"),
            channel("BBC News", "http://a/bbc", "News"),
            channel("Cartoon", "http://a/toon", "Kids"),
            channel("Sky Sports", "http://a/sky", "Sports"),
        ];
        channels[0].status = ChannelStatus::Active;
        channels[1].status = ChannelStatus::Offline;
        channels[2].favorite = true;
        channels[4].status = ChannelStatus::Active;
        store.replace_all(channels, storage).unwrap();
        store
    }

    fn names(groups: &[ChannelGroup<'_>]) -> Vec<(String, Vec<String>)> {
        groups
            .iter()
            .map(|g| (g.name.to_string(), g.channels.iter().map(|c| c.name.clone()).collect()))
            .collect()
    }

    #[test]
    fn test_filtered_view_groups_in_first_occurrence_order() {
        let mut storage = MemoryStorage::new();
        let store = sample_store(&mut storage);

        let view = store.filtered_view(&ChannelFilter::default());
        assert_eq!(
            names(&view),
            vec![
                ("News".to_string(), vec!["CNN".to_string(), "BBC News".to_string()]),
                ("Sports".to_string(), vec!["ESPN".to_string(), "Sky Sports".to_string()]),
                ("Kids".to_string(), vec!["Cartoon".to_string()]),
            ]
        );
    }

    #[test]
    fn test_filtered_view_omits_empty_groups() {
        let mut storage = MemoryStorage::new();
        let store = sample_store(&mut storage);

        let filter = ChannelFilter {
            search: "SPORT".to_string(),
            ..Default::default()
        };
        assert_eq!(
            names(&store.filtered_view(&filter)),
            vec![("Sports".to_string(), vec!["Sky Sports".to_string()])]
        );

        let filter = ChannelFilter {
            status: StatusFilter::Active,
            ..Default::default()
        };
        let view = store.filtered_view(&filter);
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].name, "News");
        assert_eq!(view[1].channels[0].name, "Sky Sports");

        let filter = ChannelFilter {
            favorites_only: true,
            ..Default::default()
        };
        assert_eq!(
            names(&store.filtered_view(&filter)),
            vec![("News".to_string(), vec!["BBC News".to_string()])]
        );

        let filter = ChannelFilter {
            group: Some("Kids".to_string()),
            status: StatusFilter::Offline,
            ..Default::default()
        };
        assert!(store.filtered_view(&filter).is_empty());
    }

    #[test]
    fn test_filtered_view_is_idempotent() {
        let mut storage = MemoryStorage::new();
        let store = sample_store(&mut storage);
        let filter = ChannelFilter {
            search: "s".to_string(),
            status: StatusFilter::All,
            ..Default::default()
        };
        assert_eq!(store.filtered_view(&filter), store.filtered_view(&filter));

        let unfiltered = ChannelFilter {
            search: "s".to_string(),
            ..Default::default()
        };
        assert_eq!(store.filtered_view(&filter), store.filtered_view(&unfiltered));
    }

    #[test]
    fn test_toggle_favorite_unknown_url_is_noop() {
        let mut storage = MemoryStorage::new();
        let mut store = sample_store(&mut storage);
        let blob_before = storage.get(CHANNELS_KEY);

        assert_eq!(store.toggle_favorite("http://missing", &mut storage).unwrap(), None);
        assert_eq!(store.len(), 5);
        assert_eq!(storage.get(CHANNELS_KEY), blob_before);
    }

    #[test]
    fn test_toggle_favorite_persists() {
        let mut storage = MemoryStorage::new();
        let mut store = sample_store(&mut storage);

        assert_eq!(store.toggle_favorite("http://a/cnn", &mut storage).unwrap(), Some(true));
        let reloaded = ChannelStore::load(&storage);
        assert!(reloaded.find("http://a/cnn").unwrap().favorite);

        assert_eq!(store.toggle_favorite("http://a/cnn", &mut storage).unwrap(), Some(false));
        assert!(!ChannelStore::load(&storage).find("http://a/cnn").unwrap().favorite);
    }

    #[test]
    fn test_set_status_and_counts() {
        let mut storage = MemoryStorage::new();
        let mut store = sample_store(&mut storage);
        assert_eq!(store.counts(), StatusCounts { total: 5, active: 2, offline: 1 });

        assert!(store.set_status("http://a/toon", ChannelStatus::Offline, &mut storage).unwrap());
        assert!(!store.set_status("http://missing", ChannelStatus::Active, &mut storage).unwrap());
        assert_eq!(store.counts(), StatusCounts { total: 5, active: 2, offline: 2 });
        assert_eq!(
            ChannelStore::load(&storage).find("http://a/toon").unwrap().status,
            ChannelStatus::Offline
        );
    }

    #[test]
    fn test_replace_all_drops_duplicate_urls() {
        let mut storage = MemoryStorage::new();
        let mut store = sample_store(&mut storage);
        store
            .replace_all(
                vec![
                    channel("First", "http://a/same", "A"),
                    channel("Second", "http://a/same", "B"),
                    channel("Other", "http://a/other", "A"),
                ],
                &mut storage,
            )
            .unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.find("http://a/same").unwrap().name, "First");
        assert!(store.find("http://a/cnn").is_none());
    }

    #[test]
    fn test_clear_all_removes_blob() {
        let mut storage = MemoryStorage::new();
        let mut store = sample_store(&mut storage);
        store.clear_all(&mut storage).unwrap();
        assert!(store.is_empty());
        assert!(storage.get(CHANNELS_KEY).is_none());
    }

    #[test]
    fn test_groups_and_random() {
        let mut storage = MemoryStorage::new();
        let store = sample_store(&mut storage);
        assert_eq!(store.groups(), vec!["News", "Sports", "Kids"]);

        let mut rng = StdRng::seed_from_u64(7);
        let picked = store.random(&mut rng).unwrap();
        assert!(store.find(&picked.url).is_some());
        assert!(ChannelStore::new().random(&mut rng).is_none());
    }
}
