//! Playback: the single active stream session and the collaborators it drives
//!
//! A [`PlaybackSink`] renders a stream (natively, by URL). A [`StreamEngine`]
//! handles adaptive (HLS) streams: it loads the manifest, attaches to a sink
//! and signals when the manifest is ready.

mod external;
mod hls;
mod session;

pub use external::ExternalPlayer;
pub use hls::{HlsEngine, HlsEngineFactory};
pub use session::{NowPlaying, PlaybackSession, PlaybackState};

use crate::error::Result;
use crate::subtitles::SubtitleTrack;

/// Native playback target
pub trait PlaybackSink {
    /// Assign a stream URL for direct playback
    fn set_source(&mut self, url: &str);

    /// Position playback at `offset` seconds
    fn seek(&mut self, offset: f64);

    fn play(&mut self) -> Result<()>;

    /// Stop playback and release the current source
    fn stop(&mut self);

    /// Attach a text track, or detach the current one with `None`
    fn set_subtitles(&mut self, track: Option<&SubtitleTrack>);

    /// Current playback position in seconds, when known
    fn position(&self) -> Option<f64>;

    /// Whether playback has ended on its own
    fn is_finished(&mut self) -> bool;
}

/// Adaptive streaming engine bound to one source for its whole life
pub trait StreamEngine {
    fn load_source(&mut self, url: &str) -> Result<()>;

    fn attach_to(&mut self, sink: &mut dyn PlaybackSink) -> Result<()>;

    /// Block until the manifest has been parsed
    fn wait_manifest_ready(&mut self) -> Result<()>;

    fn destroy(&mut self);
}

pub trait EngineFactory {
    /// Whether the environment can run the adaptive engine at all
    fn is_supported(&self) -> bool;

    fn create(&self) -> Box<dyn StreamEngine>;
}

/// URLs that need the adaptive engine
pub fn is_adaptive_url(url: &str) -> bool {
    url.to_lowercase().contains(".m3u8")
}
