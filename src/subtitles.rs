//! SubRip (.srt) subtitle loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct Cue {
    pub index: usize,
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

/// A text track ready to attach to a playback sink
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleTrack {
    pub path: PathBuf,
    pub cues: Vec<Cue>,
}

impl SubtitleTrack {
    /// Cue on screen at `position`, if any
    pub fn cue_at(&self, position: Duration) -> Option<&Cue> {
        self.cues.iter().find(|c| c.start <= position && position < c.end)
    }
}

/// Load an `.srt` file. Other extensions are rejected before reading.
pub fn load_srt(path: &Path) -> Result<SubtitleTrack> {
    let is_srt = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("srt"));
    if !is_srt {
        return Err(Error::UnsupportedFormat(path.display().to_string()));
    }

    let content = fs::read_to_string(path)?;
    let cues = parse_srt(&content);
    if cues.is_empty() {
        return Err(Error::Parse(format!("no subtitle cues in {}", path.display())));
    }
    debug!("Loaded {} subtitle cues from {}", cues.len(), path.display());

    Ok(SubtitleTrack {
        path: path.to_path_buf(),
        cues,
    })
}

/// Parse SubRip text. Blocks without a valid timing line are skipped.
pub fn parse_srt(content: &str) -> Vec<Cue> {
    let content = content.trim_start_matches('\u{feff}');
    let mut cues = Vec::new();
    let mut lines = content.lines().map(str::trim_end).peekable();

    while lines.peek().is_some() {
        let block: Vec<&str> = lines.by_ref().take_while(|l| !l.trim().is_empty()).collect();
        if block.is_empty() {
            continue;
        }

        // The numeric counter is optional in the wild
        let (index, rest) = match block[0].trim().parse::<usize>() {
            Ok(n) => (n, &block[1..]),
            Err(_) => (cues.len() + 1, &block[..]),
        };
        let Some((timing, text)) = rest.split_first() else {
            continue;
        };
        let Some((start, end)) = parse_timing(timing) else {
            continue;
        };

        cues.push(Cue {
            index,
            start,
            end,
            text: text.join("\n"),
        });
    }

    cues
}

/// `00:01:02,345 --> 00:01:04,000`
fn parse_timing(line: &str) -> Option<(Duration, Duration)> {
    let (start, end) = line.split_once("-->")?;
    // Position hints may follow the end time
    let end = end.split_whitespace().next()?;
    Some((parse_timestamp(start.trim())?, parse_timestamp(end)?))
}

fn parse_timestamp(s: &str) -> Option<Duration> {
    let (hms, millis) = s.split_once([',', '.']).unwrap_or((s, "0"));
    let mut parts = hms.split(':').map(|p| p.parse::<u64>());
    let (h, m, sec) = match (parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(m), Some(s)) => (h.ok()?, m.ok()?, s.ok()?),
        (Some(m), Some(s), None) => (0, m.ok()?, s.ok()?),
        _ => return None,
    };
    let millis: u64 = millis.parse().ok()?;
    // Out-of-range values make the cue unusable rather than wrapping
    let total = h
        .checked_mul(60)?
        .checked_add(m)?
        .checked_mul(60)?
        .checked_add(sec)?
        .checked_mul(1000)?
        .checked_add(millis)?;
    Some(Duration::from_millis(total))
}
