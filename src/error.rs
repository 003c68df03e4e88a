//! Error types shared across the player

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed playlist content or empty input where a source was required
    #[error("Parse error: {0}")]
    Parse(String),

    /// File extension outside the accepted set
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Engine attach, manifest or play rejection
    #[error("Playback error: {0}")]
    Playback(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Transport-level failures, the ones that mark a channel offline
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_) | Error::Timeout(_))
    }
}

impl From<ureq::Error> for Error {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Timeout(t) => Error::Timeout(t.to_string()),
            other => Error::Network(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
