//! Playlist parsing and export for M3U, JSON and plain-text lists
//!
//! Every parser returns a fresh channel list; callers replace their store
//! with it rather than merging.

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{Channel, ChannelStatus, DEFAULT_GROUP, UNNAMED};

const EXTINF: &str = "#EXTINF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistFormat {
    M3u,
    Json,
    Text,
}

impl PlaylistFormat {
    /// Classify by file extension (`m3u`, `json`, `txt`), case-insensitive
    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext.to_lowercase().as_str() {
            "m3u" => Ok(PlaylistFormat::M3u),
            "json" => Ok(PlaylistFormat::Json),
            "txt" => Ok(PlaylistFormat::Text),
            other => Err(Error::UnsupportedFormat(format!(".{}", other))),
        }
    }

    /// Classify a user-supplied file; anything without a known extension is rejected
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| Error::UnsupportedFormat(path.display().to_string()))?;
        Self::from_extension(ext)
    }

    /// Format of a remote playlist. URLs are read as M3U unless their path
    /// ends in `.json` or `.txt`.
    pub fn for_url(url: &str) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let ext = path.rsplit('/').next().and_then(|last| last.rsplit_once('.')).map(|(_, ext)| ext);
        match ext.map(str::to_lowercase).as_deref() {
            Some("json") => PlaylistFormat::Json,
            Some("txt") => PlaylistFormat::Text,
            _ => PlaylistFormat::M3u,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            PlaylistFormat::M3u => "m3u",
            PlaylistFormat::Json => "json",
            PlaylistFormat::Text => "txt",
        }
    }
}

/// Parse raw playlist text in the given format
pub fn parse(raw: &str, format: PlaylistFormat) -> Result<Vec<Channel>> {
    let channels = match format {
        PlaylistFormat::M3u => parse_m3u(raw),
        PlaylistFormat::Json => parse_json(raw)?,
        PlaylistFormat::Text => parse_text(raw),
    };
    debug!("Parsed {} channels from {:?} playlist", channels.len(), format);
    Ok(channels)
}

/// Parse M3U content. An `#EXTINF` line opens a pending entry that the next
/// URL line completes; URL lines without a pending entry are dropped, as is
/// a trailing entry that never receives a URL.
pub fn parse_m3u(content: &str) -> Vec<Channel> {
    let mut channels = Vec::new();
    let mut pending: Option<Channel> = None;

    for line in content.lines() {
        let line = line.trim();

        if let Some(rest) = line.strip_prefix(EXTINF) {
            let info = rest.strip_prefix(':').unwrap_or(rest);
            pending = Some(parse_extinf(info));
        } else if !line.is_empty() && !line.starts_with('#') {
            match pending.take() {
                Some(mut channel) => {
                    channel.url = line.to_string();
                    channels.push(channel);
                }
                None => debug!("Dropping URL without #EXTINF: {}", line),
            }
        }
    }

    channels
}

/// Build the pending channel described by the body of an `#EXTINF` line
fn parse_extinf(info: &str) -> Channel {
    let mut attrs = HashMap::new();
    extract_attrs(info, &mut attrs);

    // Channel name is after the last comma
    let name = info
        .rfind(',')
        .map(|pos| info[pos + 1..].trim())
        .filter(|name| !name.is_empty())
        .unwrap_or(UNNAMED);

    let group = attrs
        .remove("group-title")
        .filter(|g| !g.is_empty())
        .unwrap_or_else(|| DEFAULT_GROUP.to_string());

    Channel {
        name: name.to_string(),
        url: String::new(),
        group,
        favorite: false,
        logo: attrs.remove("tvg-logo").unwrap_or_default(),
        status: ChannelStatus::Unknown,
    }
}

/// Extract `key="value"` / `key=value` attributes from an EXTINF body,
/// stopping at the comma that introduces the display name
fn extract_attrs(info: &str, attrs: &mut HashMap<String, String>) {
    let mut chars = info.chars().peekable();

    // Skip the duration at the start (e.g. "-1")
    while let Some(&c) = chars.peek() {
        if c.is_ascii_digit() || c == '-' || c == '.' || c.is_whitespace() {
            chars.next();
        } else {
            break;
        }
    }

    loop {
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }

        let mut key = String::new();
        loop {
            match chars.peek() {
                None | Some(',') => return,
                Some('=') => {
                    chars.next();
                    break;
                }
                Some(&c) => {
                    key.push(c);
                    chars.next();
                }
            }
        }

        // Tolerate stray quotes in front of keys
        let key = key.trim().trim_start_matches('"').to_lowercase();

        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            while let Some(c) = chars.next() {
                match c {
                    '"' => break,
                    '\\' if chars.peek() == Some(&'"') => {
                        chars.next();
                        value.push('"');
                    }
                    _ => value.push(c),
                }
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() || c == ',' {
                    break;
                }
                value.push(c);
                chars.next();
            }
        }

        if !key.is_empty() {
            attrs.insert(key, value);
        }
    }
}

type JsonEntry = serde_json::Map<String, Value>;

/// String or number field as text; other types count as absent
fn text_field(entry: &JsonEntry, key: &str) -> Option<String> {
    match entry.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Loose truthiness: `1`, `"yes"` and `true` all mark a favorite
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Parse a JSON array of channel objects. Entries without a URL are skipped
/// and mistyped optional fields fall back to their defaults; status always
/// starts as unknown whatever the input says.
pub fn parse_json(content: &str) -> Result<Vec<Channel>> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let entries: Vec<JsonEntry> =
        serde_json::from_str(content).map_err(|e| Error::Parse(format!("Invalid JSON format: {}", e)))?;

    let mut skipped = 0usize;
    let channels: Vec<Channel> = entries
        .iter()
        .filter_map(|entry| {
            let url = text_field(entry, "url").filter(|u| !u.trim().is_empty());
            let Some(url) = url else {
                skipped += 1;
                return None;
            };
            let favourite = entry.get("favourite").or_else(|| entry.get("favorite"));
            Some(Channel {
                name: text_field(entry, "name").filter(|n| !n.is_empty()).unwrap_or_else(|| UNNAMED.to_string()),
                url,
                group: text_field(entry, "group").filter(|g| !g.is_empty()).unwrap_or_else(|| DEFAULT_GROUP.to_string()),
                favorite: truthy(favourite),
                logo: text_field(entry, "logo").unwrap_or_default(),
                status: ChannelStatus::Unknown,
            })
        })
        .collect();

    if skipped > 0 {
        warn!("Skipped {} JSON playlist entries without a URL", skipped);
    }

    Ok(channels)
}

/// Parse one URL per line; names are synthesized from the 1-based position
/// among the retained lines
pub fn parse_text(content: &str) -> Vec<Channel> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .enumerate()
        .map(|(i, url)| Channel::new(format!("Channel {}", i + 1), url))
        .collect()
}

/// JSON export shape, matching the persisted field names
#[derive(Serialize)]
struct JsonExport<'a> {
    name: &'a str,
    url: &'a str,
    group: &'a str,
    favourite: bool,
    logo: &'a str,
}

/// Serialize channels back into playlist text
pub fn write(channels: &[Channel], format: PlaylistFormat) -> Result<String> {
    match format {
        PlaylistFormat::M3u => Ok(write_m3u(channels)),
        PlaylistFormat::Json => {
            let entries: Vec<JsonExport> = channels
                .iter()
                .map(|c| JsonExport {
                    name: &c.name,
                    url: &c.url,
                    group: &c.group,
                    favourite: c.favorite,
                    logo: &c.logo,
                })
                .collect();
            Ok(serde_json::to_string_pretty(&entries)?)
        }
        PlaylistFormat::Text => Ok(channels.iter().map(|c| format!("{}\n", c.url)).collect()),
    }
}

fn write_m3u(channels: &[Channel]) -> String {
    let mut out = String::from("#EXTM3U\n");
    for channel in channels {
        out.push_str(EXTINF);
        out.push_str(":-1");
        if !channel.logo.is_empty() {
            out.push_str(&format!(" tvg-logo=\"{}\"", channel.logo.replace('"', "'")));
        }
        out.push_str(&format!(" group-title=\"{}\"", channel.group.replace('"', "'")));
        out.push(',');
        out.push_str(&channel.name);
        out.push('\n');
        out.push_str(&channel.url);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_m3u() {
        let content = r#"
#EXTM3U
#EXTINF:-1 tvg-id="cnn" group-title="News",CNN
http://example.com/live/user/pass/1.ts
#EXTINF:-1 tvg-id="bbc" group-title="News",BBC
http://example.com/live/user/pass/2.ts
"#;
        let channels = parse_m3u(content);
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].name, "CNN");
        assert_eq!(channels[0].group, "News");
    }

    #[test]
    fn test_parse_attrs_unquoted() {
        let content = r#"#EXTM3U
#EXTINF:-1 tvg-logo=http://example.com/l.png group-title="Quoted Group",Test Channel
http://example.com/stream.ts
"#;
        let channels = parse_m3u(content);
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].logo, "http://example.com/l.png");
        assert_eq!(channels[0].group, "Quoted Group");
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(PlaylistFormat::from_extension("M3U").unwrap(), PlaylistFormat::M3u);
        assert_eq!(PlaylistFormat::from_path(Path::new("list.txt")).unwrap(), PlaylistFormat::Text);
        assert!(matches!(
            PlaylistFormat::from_path(Path::new("list.xspf")),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(matches!(
            PlaylistFormat::from_path(Path::new("playlist")),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_format_for_url() {
        assert_eq!(PlaylistFormat::for_url("http://a/get.php?type=m3u_plus"), PlaylistFormat::M3u);
        assert_eq!(PlaylistFormat::for_url("https://a/lists/tv.json"), PlaylistFormat::Json);
        assert_eq!(PlaylistFormat::for_url("https://a/tv.TXT?x=1"), PlaylistFormat::Text);
        assert_eq!(PlaylistFormat::for_url("https://a.example.org/"), PlaylistFormat::M3u);
    }
}
