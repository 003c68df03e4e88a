//! Process-scoped player state
//!
//! `AppState` owns the channel store, the two history ledgers, the theme and
//! the persistence substrate. Every mutation goes through it and rewrites the
//! affected blob in full. User-facing operations never fail hard: errors end
//! up as a notification and the previous state is kept.

use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::channels::{ChannelFilter, ChannelGroup, ChannelStore, StatusCounts};
use crate::error::{Error, Result};
use crate::history::HistoryLog;
use crate::http::TextFetcher;
use crate::models::{Channel, ChannelStatus, HistoryEntry, PlaybackProgress, RecentPlay, Theme};
use crate::notify::Notifier;
use crate::playlist::{self, PlaylistFormat};
use crate::storage::{self, Storage, RECENT_PLAYS_KEY, THEME_KEY, UPLOAD_HISTORY_KEY};

pub struct AppState {
    storage: Box<dyn Storage>,
    channels: ChannelStore,
    uploads: HistoryLog<HistoryEntry>,
    recent: HistoryLog<RecentPlay>,
    theme: Theme,
    notifier: Notifier,
}

impl AppState {
    /// Read channels, upload history, recent plays and theme from storage.
    /// Each blob falls back to empty on its own.
    pub fn load(storage: Box<dyn Storage>) -> Self {
        let channels = ChannelStore::load(storage.as_ref());
        let uploads = HistoryLog::load(UPLOAD_HISTORY_KEY, storage.as_ref());
        let recent = HistoryLog::load(RECENT_PLAYS_KEY, storage.as_ref());
        let theme = storage
            .get(THEME_KEY)
            .map(|raw| Theme::from_str_lossy(raw.trim_matches('"')))
            .unwrap_or_default();

        info!(
            "Loaded state: {} channels, {} playlists in history, {} recent plays",
            channels.len(),
            uploads.len(),
            recent.len()
        );

        Self {
            storage,
            channels,
            uploads,
            recent,
            theme,
            notifier: Notifier::default(),
        }
    }

    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn channels(&self) -> &ChannelStore {
        &self.channels
    }

    pub fn uploads(&self) -> &HistoryLog<HistoryEntry> {
        &self.uploads
    }

    pub fn recent_plays(&self) -> &HistoryLog<RecentPlay> {
        &self.recent
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn notify(&mut self, message: impl Into<String>) {
        self.notifier.show(message);
    }

    pub fn filtered_view(&self, filter: &ChannelFilter) -> Vec<ChannelGroup<'_>> {
        self.channels.filtered_view(filter)
    }

    pub fn counts(&self) -> StatusCounts {
        self.channels.counts()
    }

    /// Replace the whole channel collection
    pub fn replace_channels(&mut self, channels: Vec<Channel>) {
        let result = self.channels.replace_all(channels, self.storage.as_mut());
        log_storage_error("channels", result);
    }

    /// Flip a favorite; unknown URLs are ignored
    pub fn toggle_favorite(&mut self, url: &str) -> Option<bool> {
        match self.channels.toggle_favorite(url, self.storage.as_mut()) {
            Ok(flag) => flag,
            Err(e) => {
                warn!("Failed to persist favorite for {}: {}", url, e);
                self.channels.find(url).map(|c| c.favorite)
            }
        }
    }

    pub fn set_status(&mut self, url: &str, status: ChannelStatus) {
        let result = self.channels.set_status(url, status, self.storage.as_mut()).map(|_| ());
        log_storage_error("channels", result);
    }

    /// In-memory status update for batched probes; follow with `persist_channels`
    pub fn update_status(&mut self, url: &str, status: ChannelStatus) -> bool {
        self.channels.update_status(url, status)
    }

    pub fn persist_channels(&mut self) {
        let result = self.channels.persist(self.storage.as_mut());
        log_storage_error("channels", result);
    }

    pub fn record_upload(&mut self, source: &str) {
        let result = self.uploads.push(HistoryEntry::now(source), self.storage.as_mut());
        log_storage_error(UPLOAD_HISTORY_KEY, result);
    }

    pub fn record_play(&mut self, url: &str, name: &str) {
        let result = self.recent.push(RecentPlay::now(url, name), self.storage.as_mut());
        log_storage_error(RECENT_PLAYS_KEY, result);
    }

    pub fn delete_history_item(&mut self, index: usize) -> Option<HistoryEntry> {
        match self.uploads.remove(index, self.storage.as_mut()) {
            Ok(removed) => removed,
            Err(e) => {
                warn!("Failed to persist upload history: {}", e);
                None
            }
        }
    }

    pub fn clear_history(&mut self) {
        let result = self.uploads.clear(self.storage.as_mut());
        log_storage_error(UPLOAD_HISTORY_KEY, result);
    }

    pub fn save_progress(&mut self, url: &str, offset: f64, name: &str) {
        let progress = PlaybackProgress {
            offset,
            name: name.to_string(),
        };
        let result = storage::save(self.storage.as_mut(), &storage::progress_key(url), &progress);
        log_storage_error("progress", result);
    }

    pub fn progress_for(&self, url: &str) -> Option<PlaybackProgress> {
        storage::load(self.storage.as_ref(), &storage::progress_key(url))
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        let result = self.storage.set(THEME_KEY, theme.as_str().to_string());
        log_storage_error(THEME_KEY, result);
    }

    pub fn toggle_theme(&mut self) -> Theme {
        let theme = self.theme.toggled();
        self.set_theme(theme);
        theme
    }

    /// Forget everything: channels, both ledgers, playback positions and theme
    pub fn clear_all(&mut self) {
        self.channels.reset();
        self.uploads.reset();
        self.recent.reset();
        self.theme = Theme::default();
        let result = self.storage.clear();
        log_storage_error("all", result);
        self.notify("All data cleared!");
    }

    /// Parse playlist text and make it the current channel list. On a parse
    /// failure the previous list stays in place.
    pub fn load_playlist_text(&mut self, raw: &str, format: PlaylistFormat, source: &str) -> Result<usize> {
        let channels = match playlist::parse(raw, format) {
            Ok(channels) => channels,
            Err(e) => {
                warn!("Failed to parse playlist from {}: {}", source, e);
                let message = match format {
                    PlaylistFormat::Json => "Invalid JSON format.",
                    _ => "Failed to load playlist.",
                };
                self.notify(message);
                return Err(e);
            }
        };

        self.replace_channels(channels);
        self.record_upload(source);
        info!("Loaded {} channels from {}", self.channels.len(), source);
        Ok(self.channels.len())
    }

    /// Load a playlist file, classified by extension
    pub fn load_playlist_file(&mut self, path: &Path) -> Result<usize> {
        let format = match PlaylistFormat::from_path(path) {
            Ok(format) => format,
            Err(e) => {
                self.notify("Unsupported file format.");
                return Err(e);
            }
        };

        self.notify("Loading file...");
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                self.notify("Failed to load playlist.");
                return Err(e.into());
            }
        };

        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let count = self.load_playlist_text(&raw, format, &source)?;
        self.notify("File loaded!");
        Ok(count)
    }

    /// Download and load a playlist from a URL
    pub fn load_playlist_url(&mut self, fetcher: &dyn TextFetcher, url: &str) -> Result<usize> {
        let url = url.trim();
        if url.is_empty() {
            self.notify("Please enter a valid URL.");
            return Err(Error::Parse("empty playlist URL".to_string()));
        }

        self.notify("Loading playlist...");
        let raw = match fetcher.fetch_text(url) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Error loading playlist {}: {}", url, e);
                self.notify("Failed to load playlist.");
                return Err(e);
            }
        };

        let count = self.load_playlist_text(&raw, PlaylistFormat::for_url(url), url)?;
        self.notify("Playlist loaded!");
        Ok(count)
    }

    /// Reload a playlist from the upload history. Only URL sources can be
    /// fetched again; files must be supplied by the user.
    pub fn load_from_history(&mut self, fetcher: &dyn TextFetcher, index: usize) -> Result<usize> {
        let Some(entry) = self.uploads.get(index).cloned() else {
            return Err(Error::Parse(format!("no history entry at index {}", index)));
        };

        if !entry.is_remote() {
            self.notify("Please re-upload the file manually.");
            return Err(Error::UnsupportedFormat(entry.source));
        }

        self.load_playlist_url(fetcher, &entry.source)
    }
}

fn log_storage_error(what: &str, result: Result<()>) {
    if let Err(e) = result {
        warn!("Failed to persist {}: {}", what, e);
    }
}
