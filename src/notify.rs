//! Transient user notifications. There is a single slot: a new message
//! replaces whatever is showing, and messages expire on their own.

use std::time::{Duration, Instant};

use tracing::info;

pub const DEFAULT_NOTIFICATION_DURATION: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    shown_at: Instant,
    duration: Duration,
}

impl Notification {
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.duration_since(self.shown_at) >= self.duration
    }
}

#[derive(Debug, Clone)]
pub struct Notifier {
    current: Option<Notification>,
    default_duration: Duration,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_NOTIFICATION_DURATION)
    }
}

impl Notifier {
    pub fn new(default_duration: Duration) -> Self {
        Self {
            current: None,
            default_duration,
        }
    }

    pub fn show(&mut self, message: impl Into<String>) {
        self.show_for(message, self.default_duration);
    }

    pub fn show_for(&mut self, message: impl Into<String>, duration: Duration) {
        let message = message.into();
        info!("{}", message);
        self.current = Some(Notification {
            message,
            shown_at: Instant::now(),
            duration,
        });
    }

    /// Message still on screen, if any
    pub fn current(&self) -> Option<&str> {
        self.current_at(Instant::now())
    }

    pub fn current_at(&self, now: Instant) -> Option<&str> {
        self.current
            .as_ref()
            .filter(|n| !n.is_expired_at(now))
            .map(|n| n.message.as_str())
    }

    /// Last message shown, expired or not
    pub fn last_message(&self) -> Option<&str> {
        self.current.as_ref().map(|n| n.message.as_str())
    }

    pub fn dismiss(&mut self) {
        self.current = None;
    }
}
