//! PixStream - IPTV playlist player core
//!
//! Parses M3U, JSON and plain-text playlists, keeps a persistent channel list
//! with favorites and liveness status, probes channels for reachability and
//! drives one playback session at a time with resumable positions.

pub mod channels;
pub mod config;
pub mod error;
pub mod history;
pub mod http;
pub mod liveness;
pub mod models;
pub mod notify;
pub mod playback;
pub mod playlist;
pub mod shell_cache;
pub mod state;
pub mod storage;
pub mod subtitles;
pub mod view;


pub use error::{Error, Result};
