//! Channel reachability checks
//!
//! A probe is a header-only request. Any HTTP answer means the channel is
//! active; a transport error or timeout means it is offline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;

use tracing::{debug, info};

use crate::channels::StatusCounts;
use crate::error::Result;
use crate::http::HttpClient;
use crate::models::ChannelStatus;
use crate::state::AppState;

/// Reachability probe for a single URL. Implementations carry their own timeout.
pub trait Prober: Sync {
    fn probe(&self, url: &str) -> Result<()>;
}

impl Prober for HttpClient {
    fn probe(&self, url: &str) -> Result<()> {
        let status = self.head(url)?;
        debug!("HEAD {} -> {}", url, status);
        Ok(())
    }
}

impl<P: Prober + ?Sized> Prober for &P {
    fn probe(&self, url: &str) -> Result<()> {
        (**self).probe(url)
    }
}

pub struct LivenessChecker<P> {
    prober: P,
    /// Upper bound on in-flight probes; `None` probes every channel at once
    max_parallel: Option<usize>,
}

impl<P: Prober> LivenessChecker<P> {
    pub fn new(prober: P) -> Self {
        Self {
            prober,
            max_parallel: None,
        }
    }

    /// Bound the bulk check to `max_parallel` probes in flight
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = Some(max_parallel.max(1));
        self
    }

    pub fn prober(&self) -> &P {
        &self.prober
    }

    /// Outcome of one probe, without touching any store
    pub fn status_of(&self, url: &str) -> ChannelStatus {
        match self.prober.probe(url) {
            Ok(()) => ChannelStatus::Active,
            Err(e) => {
                debug!("Probe failed for {}: {}", url, e);
                ChannelStatus::Offline
            }
        }
    }

    /// Probe one channel and persist its new status
    pub fn check_one(&self, state: &mut AppState, url: &str) -> ChannelStatus {
        let status = self.status_of(url);
        state.set_status(url, status);
        status
    }

    /// Probe every channel concurrently and wait for all of them to settle.
    /// Without a cap every probe starts at once, so the whole check takes
    /// about one probe timeout. Statuses are applied as results arrive; the
    /// store is persisted once at the end.
    pub fn check_all(&self, state: &mut AppState) -> StatusCounts {
        let urls = state.channels().urls();
        let mut counts = StatusCounts {
            total: urls.len(),
            ..Default::default()
        };
        if urls.is_empty() {
            return counts;
        }

        let workers = self.max_parallel.map_or(urls.len(), |cap| cap.min(urls.len()));
        let next = AtomicUsize::new(0);
        let (tx, rx) = mpsc::channel::<(usize, ChannelStatus)>();

        thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                let next = &next;
                let urls = &urls;
                scope.spawn(move || loop {
                    let index = next.fetch_add(1, Ordering::Relaxed);
                    let Some(url) = urls.get(index) else {
                        break;
                    };
                    if tx.send((index, self.status_of(url))).is_err() {
                        break;
                    }
                });
            }
            drop(tx);

            for (index, status) in rx {
                match status {
                    ChannelStatus::Active => counts.active += 1,
                    _ => counts.offline += 1,
                }
                state.update_status(&urls[index], status);
            }
        });

        state.persist_channels();
        info!(
            "Liveness check: {} total, {} active, {} offline",
            counts.total, counts.active, counts.offline
        );
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::models::Channel;
    use crate::storage::MemoryStorage;
    use std::collections::HashSet;

    struct SetProber(HashSet<String>);

    impl Prober for SetProber {
        fn probe(&self, url: &str) -> Result<()> {
            if self.0.contains(url) {
                Ok(())
            } else {
                Err(Error::Timeout(url.to_string()))
            }
        }
    }

    #[test]
    fn test_empty_store() {
        let mut state = AppState::load(Box::new(MemoryStorage::new()));
        let checker = LivenessChecker::new(SetProber(HashSet::new()));
        assert_eq!(checker.check_all(&mut state), StatusCounts::default());
    }

    #[test]
    fn test_single_worker_matches_parallel_result() {
        let mut state = AppState::load(Box::new(MemoryStorage::new()));
        state.replace_channels(vec![
            Channel::new("A", "http://a"),
            Channel::new("B", "http://b"),
            Channel::new("C", "http://c"),
        ]);
        let up: HashSet<String> = ["http://b".to_string()].into_iter().collect();
        let checker = LivenessChecker::new(SetProber(up)).with_max_parallel(1);

        let counts = checker.check_all(&mut state);
        assert_eq!(counts, StatusCounts { total: 3, active: 1, offline: 2 });
        assert_eq!(state.channels().find("http://b").unwrap().status, ChannelStatus::Active);
        assert_eq!(state.channels().find("http://c").unwrap().status, ChannelStatus::Offline);
    }
}
