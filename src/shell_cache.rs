//! Offline shell cache
//!
//! Pre-fetches the app shell under a versioned cache name and answers
//! requests cache-first, then network, then with a small offline page.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::http::{Fetcher, Resource};

pub const CACHE_NAME: &str = "pixstream-shell-v1";

/// Shell assets; paths starting with `/` are resolved against the app origin
pub const SHELL_ASSETS: &[&str] = &[
    "/index.html",
    "/css/styles.css",
    "/js/script.js",
    "https://cdnjs.cloudflare.com/ajax/libs/font-awesome/5.15.4/css/all.min.css",
    "https://cdn.jsdelivr.net/npm/hls.js@latest",
    "https://pixstream.netlify.app/img/logo.png",
    "https://pixstream.netlify.app/img/no-logo.png",
];

pub const OFFLINE_PAGE: &str =
    "<h1>Offline</h1><p>Streaming is unavailable offline. Please connect to the internet.</p>";

#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    url: String,
    content_type: String,
}

pub struct ShellCache {
    root: PathBuf,
    name: String,
    controlling: bool,
}

impl ShellCache {
    pub fn new(root: impl Into<PathBuf>, name: &str) -> Self {
        Self {
            root: root.into(),
            name: name.to_string(),
            controlling: false,
        }
    }

    /// Cache rooted at `root` under the current version name
    pub fn current(root: impl Into<PathBuf>) -> Self {
        Self::new(root, CACHE_NAME)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether `activate` has run and requests are being served from here
    pub fn is_controlling(&self) -> bool {
        self.controlling
    }

    fn dir(&self) -> PathBuf {
        self.root.join(&self.name)
    }

    fn entry_paths(&self, url: &str) -> (PathBuf, PathBuf) {
        let key = urlencoding::encode(url).into_owned();
        let dir = self.dir();
        (dir.join(format!("{}.body", key)), dir.join(format!("{}.meta.json", key)))
    }

    /// Fetch every asset and store it. Nothing is written unless all fetches succeed.
    pub fn install(&self, fetcher: &dyn Fetcher, origin: &str, assets: &[&str]) -> Result<usize> {
        let fetched: Vec<(String, Resource)> = assets
            .iter()
            .map(|asset| {
                let url = resolve(origin, asset);
                debug!("Caching {}", url);
                fetcher.fetch(&url).map(|resource| (url, resource))
            })
            .collect::<Result<_>>()?;

        for (url, resource) in &fetched {
            self.put(url, resource)?;
        }
        info!("Cached app shell: {} assets in {}", fetched.len(), self.name);
        Ok(fetched.len())
    }

    /// Delete every cache under the root except the current one and start
    /// serving requests. Returns the names of the removed caches.
    pub fn activate(&mut self) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        if self.root.is_dir() {
            for entry in fs::read_dir(&self.root)? {
                let entry = entry?;
                let name = entry.file_name().to_string_lossy().into_owned();
                if name != self.name && entry.path().is_dir() {
                    fs::remove_dir_all(entry.path())?;
                    info!("Deleted old cache {}", name);
                    removed.push(name);
                }
            }
        }
        self.controlling = true;
        Ok(removed)
    }

    pub fn put(&self, url: &str, resource: &Resource) -> Result<()> {
        fs::create_dir_all(self.dir())?;
        let (body_path, meta_path) = self.entry_paths(url);
        fs::write(&body_path, &resource.body)?;
        let meta = EntryMeta {
            url: url.to_string(),
            content_type: resource.content_type.clone(),
        };
        fs::write(&meta_path, serde_json::to_vec(&meta)?)?;
        Ok(())
    }

    /// Cached response for `url`, if present and intact
    pub fn lookup(&self, url: &str) -> Option<Resource> {
        let (body_path, meta_path) = self.entry_paths(url);
        let meta: EntryMeta = read_json(&meta_path)?;
        let body = fs::read(&body_path).ok()?;
        Some(Resource {
            body,
            content_type: meta.content_type,
        })
    }

    /// Cache first, then network; a network failure yields the offline page
    pub fn respond(&self, fetcher: &dyn Fetcher, url: &str) -> Resource {
        if let Some(cached) = self.lookup(url) {
            debug!("Cache hit: {}", url);
            return cached;
        }
        match fetcher.fetch(url) {
            Ok(resource) => resource,
            Err(e) => {
                warn!("Offline fallback for {}: {}", url, e);
                offline_page()
            }
        }
    }
}

pub fn offline_page() -> Resource {
    Resource {
        body: OFFLINE_PAGE.as_bytes().to_vec(),
        content_type: "text/html".to_string(),
    }
}

fn resolve(origin: &str, asset: &str) -> String {
    if asset.starts_with('/') {
        format!("{}{}", origin.trim_end_matches('/'), asset)
    } else {
        asset.to_string()
    }
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Option<T> {
    let content = fs::read(path).ok()?;
    serde_json::from_slice(&content).ok()
}
