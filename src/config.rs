//! Configuration management

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::warn;

use crate::storage::FileStorage;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Executable used as the native playback sink; empty means ffplay
    #[serde(default)]
    pub external_player: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    /// Cap on probes in flight during a bulk check; 0 starts them all at once
    #[serde(default = "default_parallel_probes")]
    pub max_parallel_probes: usize,
    #[serde(default = "default_notification_secs")]
    pub notification_secs: u64,
    #[serde(default = "default_true")]
    pub adaptive_streaming: bool,
    /// Override for the persisted state file
    #[serde(default)]
    pub storage_path: String,
}

fn default_user_agent() -> String { DEFAULT_USER_AGENT.to_string() }
fn default_probe_timeout() -> u64 { 5 }
fn default_fetch_timeout() -> u64 { 60 }
fn default_parallel_probes() -> usize { 0 }
fn default_notification_secs() -> u64 { 3 }
fn default_true() -> bool { true }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            external_player: String::new(),
            user_agent: default_user_agent(),
            probe_timeout_secs: default_probe_timeout(),
            fetch_timeout_secs: default_fetch_timeout(),
            max_parallel_probes: default_parallel_probes(),
            notification_secs: default_notification_secs(),
            adaptive_streaming: true,
            storage_path: String::new(),
        }
    }
}

impl AppConfig {
    pub fn config_path() -> PathBuf {
        let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("pixstream");
        path.push("config.json");
        path
    }

    pub fn load() -> Self {
        Self::load_from(&Self::config_path())
    }

    /// Read a config file; missing or unparseable files give the defaults
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            if let Ok(content) = fs::read_to_string(path) {
                match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => warn!("Ignoring invalid config {}: {}", path.display(), e),
                }
            }
        }

        Self::default()
    }

    pub fn save(&self) {
        self.save_to(&Self::config_path());
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).ok();
        }
        if let Ok(content) = serde_json::to_string_pretty(self) {
            if let Err(e) = fs::write(path, content) {
                warn!("Failed to save config {}: {}", path.display(), e);
            }
        }
    }

    pub fn player(&self) -> &str {
        if self.external_player.trim().is_empty() {
            "ffplay"
        } else {
            self.external_player.trim()
        }
    }

    pub fn storage_path(&self) -> PathBuf {
        if self.storage_path.trim().is_empty() {
            FileStorage::default_path()
        } else {
            PathBuf::from(self.storage_path.trim())
        }
    }

    /// Root directory of the offline shell cache
    pub fn cache_root(&self) -> PathBuf {
        let mut path = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("pixstream");
        path
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.max(1))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }

    pub fn probe_cap(&self) -> Option<usize> {
        Some(self.max_parallel_probes).filter(|cap| *cap > 0)
    }

    pub fn notification_duration(&self) -> Duration {
        Duration::from_secs(self.notification_secs)
    }
}
