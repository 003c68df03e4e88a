use std::cell::RefCell;
use std::collections::HashSet;
use std::fs;
use std::rc::Rc;

use pixstream::error::{Error, Result};
use pixstream::liveness::{LivenessChecker, Prober};
use pixstream::models::{Channel, ChannelStatus};
use pixstream::playback::{EngineFactory, PlaybackSession, PlaybackSink, PlaybackState, StreamEngine};
use pixstream::state::AppState;
use pixstream::storage::MemoryStorage;
use pixstream::subtitles::SubtitleTrack;

type Log = Rc<RefCell<Vec<String>>>;

struct RecordingSink {
    log: Log,
    position: Option<f64>,
    finished: Rc<RefCell<bool>>,
}

impl PlaybackSink for RecordingSink {
    fn set_source(&mut self, url: &str) {
        self.log.borrow_mut().push(format!("sink source {}", url));
    }

    fn seek(&mut self, offset: f64) {
        self.log.borrow_mut().push(format!("sink seek {}", offset));
    }

    fn play(&mut self) -> Result<()> {
        self.log.borrow_mut().push("sink play".to_string());
        Ok(())
    }

    fn stop(&mut self) {
        self.log.borrow_mut().push("sink stop".to_string());
    }

    fn set_subtitles(&mut self, track: Option<&SubtitleTrack>) {
        let entry = match track {
            Some(track) => format!("sink subtitles {}", track.cues.len()),
            None => "sink subtitles off".to_string(),
        };
        self.log.borrow_mut().push(entry);
    }

    fn position(&self) -> Option<f64> {
        self.position
    }

    fn is_finished(&mut self) -> bool {
        *self.finished.borrow()
    }
}

/// Engine whose manifest never becomes ready for URLs containing "broken"
struct RecordingEngine {
    log: Log,
    source: String,
}

impl StreamEngine for RecordingEngine {
    fn load_source(&mut self, url: &str) -> Result<()> {
        self.source = url.to_string();
        self.log.borrow_mut().push(format!("engine load {}", url));
        Ok(())
    }

    fn attach_to(&mut self, sink: &mut dyn PlaybackSink) -> Result<()> {
        self.log.borrow_mut().push("engine attach".to_string());
        sink.set_source(&self.source);
        Ok(())
    }

    fn wait_manifest_ready(&mut self) -> Result<()> {
        if self.source.contains("broken") {
            return Err(Error::Playback("manifest parse failed".to_string()));
        }
        Ok(())
    }

    fn destroy(&mut self) {
        self.log.borrow_mut().push(format!("engine destroy {}", self.source));
    }
}

struct RecordingFactory {
    log: Log,
    supported: bool,
}

impl EngineFactory for RecordingFactory {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn create(&self) -> Box<dyn StreamEngine> {
        self.log.borrow_mut().push("engine create".to_string());
        Box::new(RecordingEngine {
            log: self.log.clone(),
            source: String::new(),
        })
    }
}

/// Every URL except the listed ones answers the probe
struct DownProber(HashSet<String>);

impl Prober for DownProber {
    fn probe(&self, url: &str) -> Result<()> {
        if self.0.contains(url) {
            Err(Error::Timeout(url.to_string()))
        } else {
            Ok(())
        }
    }
}

struct Harness {
    state: AppState,
    session: PlaybackSession<DownProber>,
    log: Log,
    finished: Rc<RefCell<bool>>,
}

fn harness(down: &[&str], adaptive: bool, position: Option<f64>) -> Harness {
    let log: Log = Rc::new(RefCell::new(Vec::new()));
    let finished = Rc::new(RefCell::new(false));
    let sink = RecordingSink {
        log: log.clone(),
        position,
        finished: finished.clone(),
    };
    let checker = LivenessChecker::new(DownProber(down.iter().map(|u| u.to_string()).collect()));
    let session = PlaybackSession::new(Box::new(sink), checker).with_engine_factory(Box::new(RecordingFactory {
        log: log.clone(),
        supported: adaptive,
    }));

    let mut state = AppState::load(Box::new(MemoryStorage::new()));
    state.replace_channels(vec![
        Channel::new("News", "http://a/news.m3u8"),
        Channel::new("Sports", "http://a/sports.m3u8"),
        Channel::new("Movies", "http://a/movies.ts"),
        Channel::new("Broken", "http://a/broken.m3u8"),
    ]);

    Harness {
        state,
        session,
        log,
        finished,
    }
}

fn position_of(log: &[String], entry: &str) -> usize {
    log.iter()
        .position(|e| e == entry)
        .unwrap_or_else(|| panic!("{} not in {:?}", entry, log))
}

#[test]
fn previous_engine_is_destroyed_before_the_next_is_created() {
    let mut h = harness(&[], true, None);

    h.session.play(&mut h.state, "http://a/news.m3u8", "News", "").unwrap();
    h.log.borrow_mut().clear();
    h.session.play(&mut h.state, "http://a/sports.m3u8", "Sports", "").unwrap();

    let log = h.log.borrow();
    let destroyed = position_of(&log, "engine destroy http://a/news.m3u8");
    let created = position_of(&log, "engine create");
    assert!(destroyed < created);
    assert!(position_of(&log, "sink stop") < created);
    assert_eq!(log.last().map(String::as_str), Some("sink play"));
    assert_eq!(h.session.state(), &PlaybackState::Playing);
    assert!(h.session.has_engine());
}

#[test]
fn direct_urls_bypass_the_engine() {
    let mut h = harness(&[], true, None);
    h.session.play(&mut h.state, "http://a/movies.ts", "Movies", "").unwrap();

    let log = h.log.borrow();
    assert!(!log.iter().any(|e| e.starts_with("engine")));
    assert!(log.contains(&"sink source http://a/movies.ts".to_string()));
    assert!(!h.session.has_engine());
}

#[test]
fn unsupported_engine_falls_back_to_native_playback() {
    let mut h = harness(&[], false, None);
    h.session.play(&mut h.state, "http://a/news.m3u8", "News", "").unwrap();

    let log = h.log.borrow();
    assert!(!log.contains(&"engine create".to_string()));
    assert!(log.contains(&"sink source http://a/news.m3u8".to_string()));
}

#[test]
fn successful_play_marks_active_and_records_recent() {
    let mut h = harness(&[], true, None);
    h.session.play(&mut h.state, "http://a/news.m3u8", "News", "http://img/news.png").unwrap();

    assert_eq!(h.state.channels().find("http://a/news.m3u8").unwrap().status, ChannelStatus::Active);
    assert_eq!(h.state.notifier().last_message(), Some("Stream loaded!"));

    let recent: Vec<_> = h.state.recent_plays().iter().collect();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].url, "http://a/news.m3u8");
    assert_eq!(recent[0].name, "News");

    let now = h.session.now_playing().unwrap();
    assert_eq!(now.logo, "http://img/news.png");
    assert_eq!(h.session.current_url(), Some("http://a/news.m3u8"));
}

#[test]
fn manifest_failure_marks_offline_and_notifies() {
    let mut h = harness(&[], true, None);
    let result = h.session.play(&mut h.state, "http://a/broken.m3u8", "Broken", "");

    assert!(matches!(result, Err(Error::Playback(_))));
    assert!(matches!(h.session.state(), PlaybackState::Error(_)));
    assert_eq!(h.state.channels().find("http://a/broken.m3u8").unwrap().status, ChannelStatus::Offline);
    assert_eq!(h.state.notifier().last_message(), Some("Error playing stream."));
    assert!(h.state.recent_plays().is_empty());
    assert!(!h.log.borrow().contains(&"sink play".to_string()));

    // The failed engine is still torn down by the next play
    h.session.play(&mut h.state, "http://a/news.m3u8", "News", "").unwrap();
    assert!(h.log.borrow().contains(&"engine destroy http://a/broken.m3u8".to_string()));
}

#[test]
fn offline_probe_still_attempts_playback() {
    let mut h = harness(&["http://a/movies.ts"], true, None);
    h.session.play(&mut h.state, "http://a/movies.ts", "Movies", "").unwrap();

    assert!(h.log.borrow().contains(&"sink play".to_string()));
    assert_eq!(h.state.channels().find("http://a/movies.ts").unwrap().status, ChannelStatus::Active);
}

#[test]
fn stored_position_is_applied_before_play() {
    let mut h = harness(&[], true, None);
    h.state.save_progress("http://a/movies.ts", 42.5, "Movies");

    h.session.play(&mut h.state, "http://a/movies.ts", "Movies", "").unwrap();

    let log = h.log.borrow();
    let seek = position_of(&log, "sink seek 42.5");
    assert!(position_of(&log, "sink source http://a/movies.ts") < seek);
    assert!(seek < position_of(&log, "sink play"));
}

#[test]
fn tick_records_progress_until_the_player_finishes() {
    let mut h = harness(&[], true, Some(12.0));
    h.session.play(&mut h.state, "http://a/movies.ts", "Movies", "").unwrap();

    assert!(h.session.tick(&mut h.state));
    let progress = h.state.progress_for("http://a/movies.ts").unwrap();
    assert_eq!(progress.offset, 12.0);
    assert_eq!(progress.name, "Movies");

    *h.finished.borrow_mut() = true;
    assert!(!h.session.tick(&mut h.state));
    assert_eq!(h.session.state(), &PlaybackState::Stopped);
}

#[test]
fn random_play_on_empty_store() {
    let mut h = harness(&[], true, None);
    h.state.clear_all();

    let result = h.session.play_random(&mut h.state, &mut rand::thread_rng());
    assert!(result.is_err());
    assert_eq!(h.state.notifier().last_message(), Some("No channels loaded."));
    assert_eq!(h.session.state(), &PlaybackState::Idle);
}

#[test]
fn random_play_picks_a_stored_channel() {
    let mut h = harness(&[], true, None);
    h.session.play_random(&mut h.state, &mut rand::thread_rng()).unwrap();

    let url = h.session.current_url().unwrap().to_string();
    assert!(h.state.channels().find(&url).is_some());
}

#[test]
fn subtitles_attach_and_are_cleared_on_next_play() {
    let dir = tempfile::tempdir().unwrap();
    let srt = dir.path().join("movie.srt");
    fs::write(&srt, "1\n00:00:01,000 --> 00:00:02,500\nHello\n\n2\n00:00:03,000 --> 00:00:04,000\nWorld\n").unwrap();

    let mut h = harness(&[], true, None);
    h.session.play(&mut h.state, "http://a/movies.ts", "Movies", "").unwrap();
    h.session.load_subtitles(&mut h.state, &srt).unwrap();

    assert_eq!(h.state.notifier().last_message(), Some("Subtitles loaded!"));
    assert_eq!(h.session.subtitles().unwrap().cues.len(), 2);
    assert!(h.log.borrow().contains(&"sink subtitles 2".to_string()));

    h.session.play(&mut h.state, "http://a/news.m3u8", "News", "").unwrap();
    assert!(h.session.subtitles().is_none());
    assert!(h.log.borrow().contains(&"sink subtitles off".to_string()));
}

#[test]
fn non_srt_subtitles_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let vtt = dir.path().join("movie.vtt");
    fs::write(&vtt, "WEBVTT\n").unwrap();

    let mut h = harness(&[], true, None);
    let result = h.session.load_subtitles(&mut h.state, &vtt);

    assert!(matches!(result, Err(Error::UnsupportedFormat(_))));
    assert_eq!(h.state.notifier().last_message(), Some("Please upload an .srt file."));
    assert!(h.session.subtitles().is_none());
}
