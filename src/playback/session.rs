//! The single active playback session

use std::path::Path;

use rand::Rng;
use tracing::{debug, info, warn};

use super::{is_adaptive_url, EngineFactory, PlaybackSink, StreamEngine};
use crate::error::{Error, Result};
use crate::liveness::{LivenessChecker, Prober};
use crate::models::{ChannelStatus, Quality};
use crate::state::AppState;
use crate::subtitles::{self, SubtitleTrack};

#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackState {
    Idle,
    Loading,
    Playing,
    Stopped,
    Error(String),
}

/// Display metadata for the current stream
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    pub url: String,
    pub name: String,
    pub logo: String,
    pub quality: Quality,
}

/// The one active stream. Starting a new stream always tears down the
/// previous engine and sink first.
pub struct PlaybackSession<P> {
    sink: Box<dyn PlaybackSink>,
    engines: Option<Box<dyn EngineFactory>>,
    engine: Option<Box<dyn StreamEngine>>,
    checker: LivenessChecker<P>,
    state: PlaybackState,
    current: Option<NowPlaying>,
    subtitles: Option<SubtitleTrack>,
}

impl<P: Prober> PlaybackSession<P> {
    pub fn new(sink: Box<dyn PlaybackSink>, checker: LivenessChecker<P>) -> Self {
        Self {
            sink,
            engines: None,
            engine: None,
            checker,
            state: PlaybackState::Idle,
            current: None,
            subtitles: None,
        }
    }

    /// Enable adaptive streaming through `factory`
    pub fn with_engine_factory(mut self, factory: Box<dyn EngineFactory>) -> Self {
        self.engines = Some(factory);
        self
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn now_playing(&self) -> Option<&NowPlaying> {
        self.current.as_ref()
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current.as_ref().map(|n| n.url.as_str())
    }

    pub fn subtitles(&self) -> Option<&SubtitleTrack> {
        self.subtitles.as_ref()
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    /// Open and start a stream.
    ///
    /// The channel is probed first and its status updated whatever the
    /// outcome; playback is attempted regardless. A stored position for the
    /// URL is applied before play is issued.
    pub fn play(&mut self, state: &mut AppState, url: &str, name: &str, logo: &str) -> Result<()> {
        self.teardown();
        if self.subtitles.take().is_some() {
            self.sink.set_subtitles(None);
        }

        self.state = PlaybackState::Loading;
        self.current = Some(NowPlaying {
            url: url.to_string(),
            name: name.to_string(),
            logo: logo.to_string(),
            quality: Quality::from_url(url),
        });
        state.notify("Loading stream...");

        if self.checker.check_one(state, url) == ChannelStatus::Offline {
            state.notify("Channel is offline.");
        }

        let resume = state.progress_for(url).map(|p| p.offset).filter(|offset| *offset > 0.0);

        match self.start(url, resume) {
            Ok(()) => {
                self.state = PlaybackState::Playing;
                state.set_status(url, ChannelStatus::Active);
                state.record_play(url, name);
                state.notify("Stream loaded!");
                info!("Playing {} ({})", name, url);
                Ok(())
            }
            Err(e) => {
                warn!("Error playing {}: {}", url, e);
                self.state = PlaybackState::Error(e.to_string());
                state.set_status(url, ChannelStatus::Offline);
                state.notify("Error playing stream.");
                Err(e)
            }
        }
    }

    /// Play a uniformly random channel from the store
    pub fn play_random<R: Rng + ?Sized>(&mut self, state: &mut AppState, rng: &mut R) -> Result<()> {
        let Some(channel) = state.channels().random(rng).cloned() else {
            state.notify("No channels loaded.");
            return Err(Error::Playback("no channels loaded".to_string()));
        };
        self.play(state, &channel.url, &channel.name, &channel.logo)
    }

    fn start(&mut self, url: &str, resume: Option<f64>) -> Result<()> {
        let adaptive = self
            .engines
            .as_ref()
            .filter(|factory| is_adaptive_url(url) && factory.is_supported());

        match adaptive {
            Some(factory) => {
                // Owned by the session before anything can fail, so teardown sees it
                let engine = self.engine.insert(factory.create());
                engine.load_source(url)?;
                engine.attach_to(self.sink.as_mut())?;
                engine.wait_manifest_ready()?;
                debug!("Manifest ready for {}", url);
            }
            None => self.sink.set_source(url),
        }

        if let Some(offset) = resume {
            debug!("Resuming {} at {:.1}s", url, offset);
            self.sink.seek(offset);
        }

        self.sink.play()
    }

    pub fn stop(&mut self) {
        self.teardown();
        if self.state != PlaybackState::Idle {
            self.state = PlaybackState::Stopped;
        }
    }

    /// Destroy the engine handle, if any, and stop the sink
    fn teardown(&mut self) {
        if let Some(mut engine) = self.engine.take() {
            engine.destroy();
        }
        self.sink.stop();
    }

    /// Persist the playback position of the current stream
    pub fn record_progress(&self, state: &mut AppState, offset: f64) {
        if self.state != PlaybackState::Playing {
            return;
        }
        if let Some(now) = &self.current {
            state.save_progress(&now.url, offset, &now.name);
        }
    }

    /// Poll the sink: record its position and notice when playback ended.
    /// Returns whether the stream is still playing.
    pub fn tick(&mut self, state: &mut AppState) -> bool {
        if self.state != PlaybackState::Playing {
            return false;
        }
        if let Some(position) = self.sink.position() {
            self.record_progress(state, position);
        }
        if self.sink.is_finished() {
            info!("Playback finished");
            self.stop();
            return false;
        }
        true
    }

    /// Attach an `.srt` file to the current sink
    pub fn load_subtitles(&mut self, state: &mut AppState, path: &Path) -> Result<()> {
        match subtitles::load_srt(path) {
            Ok(track) => {
                self.sink.set_subtitles(Some(&track));
                self.subtitles = Some(track);
                state.notify("Subtitles loaded!");
                Ok(())
            }
            Err(e @ Error::UnsupportedFormat(_)) => {
                state.notify("Please upload an .srt file.");
                Err(e)
            }
            Err(e) => {
                warn!("Failed to load subtitles {}: {}", path.display(), e);
                state.notify("Failed to load subtitles.");
                Err(e)
            }
        }
    }
}
