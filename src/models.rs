//! Data models for the PixStream player

use serde::{Deserialize, Serialize};

/// Display name used when a playlist entry carries none
pub const UNNAMED: &str = "Unnamed";
/// Group assigned when a playlist entry carries none
pub const DEFAULT_GROUP: &str = "General";
/// Artwork shown for channels without a logo
pub const DEFAULT_LOGO: &str = "https://pixstream.netlify.app/img/no-logo.png";

/// Reachability of a channel as last observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChannelStatus {
    #[default]
    Unknown,
    Active,
    Offline,
}

impl ChannelStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ChannelStatus::Unknown => "",
            ChannelStatus::Active => "active",
            ChannelStatus::Offline => "offline",
        }
    }
}

/// One playlist entry. `url` is its identity within a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    #[serde(default = "default_name")]
    pub name: String,
    pub url: String,
    #[serde(default = "default_group")]
    pub group: String,
    #[serde(default, rename = "favourite", alias = "favorite")]
    pub favorite: bool,
    #[serde(default)]
    pub logo: String,
    #[serde(default)]
    pub status: ChannelStatus,
}

fn default_name() -> String { UNNAMED.to_string() }
fn default_group() -> String { DEFAULT_GROUP.to_string() }

impl Channel {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            group: default_group(),
            favorite: false,
            logo: String::new(),
            status: ChannelStatus::Unknown,
        }
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_logo(mut self, logo: impl Into<String>) -> Self {
        self.logo = logo.into();
        self
    }

    /// Logo to render, falling back to the placeholder artwork
    pub fn display_logo(&self) -> &str {
        if self.logo.trim().is_empty() {
            DEFAULT_LOGO
        } else {
            &self.logo
        }
    }
}

/// A playlist that was loaded, either a URL or a file name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub source: String,
    #[serde(alias = "date")]
    pub timestamp: String,
}

impl HistoryEntry {
    pub fn now(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            timestamp: timestamp_now(),
        }
    }

    /// Whether the source can be re-fetched without the user supplying a file again
    pub fn is_remote(&self) -> bool {
        self.source.starts_with("http://") || self.source.starts_with("https://")
    }
}

/// A channel that started playing successfully
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentPlay {
    pub url: String,
    pub name: String,
    #[serde(alias = "date")]
    pub timestamp: String,
}

impl RecentPlay {
    pub fn now(url: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            name: name.into(),
            timestamp: timestamp_now(),
        }
    }
}

/// Last known playback position for a URL, stored under `progress-{url}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackProgress {
    #[serde(alias = "time")]
    pub offset: f64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("dark") {
            Theme::Dark
        } else {
            Theme::Light
        }
    }
}

/// Cosmetic quality badge, guessed from the stream URL only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Hd,
    Sd,
}

impl Quality {
    pub fn from_url(url: &str) -> Self {
        let lower = url.to_lowercase();
        if lower.contains("1080") || lower.contains("hd") {
            Quality::Hd
        } else {
            Quality::Sd
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Quality::Hd => "HD",
            Quality::Sd => "SD",
        }
    }
}

/// Local date and time, as shown in the history lists
pub fn timestamp_now() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_from_url() {
        assert_eq!(Quality::from_url("http://a/stream_1080p.m3u8"), Quality::Hd);
        assert_eq!(Quality::from_url("http://a/HD/news.ts"), Quality::Hd);
        assert_eq!(Quality::from_url("http://a/live/news.ts"), Quality::Sd);
    }

    #[test]
    fn test_channel_json_field_names() {
        let mut channel = Channel::new("CNN", "http://a/cnn.m3u8").with_group("News");
        channel.favorite = true;
        channel.status = ChannelStatus::Active;

        let json = serde_json::to_value(&channel).unwrap();
        assert_eq!(json["favourite"], true);
        assert_eq!(json["status"], "active");
        assert_eq!(json["group"], "News");
    }

    #[test]
    fn test_channel_deserialize_defaults() {
        let channel: Channel = serde_json::from_str(r#"{"url":"http://a/1.ts"}"#).unwrap();
        assert_eq!(channel.name, UNNAMED);
        assert_eq!(channel.group, DEFAULT_GROUP);
        assert!(!channel.favorite);
        assert_eq!(channel.status, ChannelStatus::Unknown);
        assert_eq!(channel.display_logo(), DEFAULT_LOGO);
    }

    #[test]
    fn test_progress_accepts_legacy_time_field() {
        let progress: PlaybackProgress =
            serde_json::from_str(r#"{"time":42.5,"name":"CNN"}"#).unwrap();
        assert_eq!(progress.offset, 42.5);
        assert_eq!(progress.name, "CNN");
    }

    #[test]
    fn test_theme_toggle() {
        assert_eq!(Theme::Light.toggled(), Theme::Dark);
        assert_eq!(Theme::from_str_lossy("dark"), Theme::Dark);
        assert_eq!(Theme::from_str_lossy("garbage"), Theme::Light);
    }
}
