//! Adaptive (HLS) engine: fetches and validates the manifest, then hands the
//! stream to the sink

use m3u8_rs::Playlist;
use tracing::{debug, info};

use super::{EngineFactory, PlaybackSink, StreamEngine};
use crate::error::{Error, Result};
use crate::http::TextFetcher;

/// A variant stream from a master playlist
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    pub uri: String,
    pub bandwidth: u64,
    /// `WIDTHxHEIGHT`
    pub resolution: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct HlsManifest {
    /// Variant streams (master playlist)
    pub variants: Vec<Variant>,
    /// Media segment count (media playlist)
    pub segments: usize,
}

impl HlsManifest {
    pub fn is_master(&self) -> bool {
        !self.variants.is_empty()
    }

    pub fn best_variant(&self) -> Option<&Variant> {
        self.variants.iter().max_by_key(|v| v.bandwidth)
    }
}

/// Parse an HLS playlist, master or media, and summarize what playback needs
pub fn read_manifest(content: &str) -> Result<HlsManifest> {
    let bytes = content.trim_start_matches('\u{feff}').as_bytes();
    let (_, playlist) = m3u8_rs::parse_playlist(bytes).map_err(|e| {
        debug!("Manifest parse error: {}", e);
        Error::Playback("invalid HLS manifest".to_string())
    })?;

    let manifest = match playlist {
        Playlist::MasterPlaylist(master) => HlsManifest {
            variants: master
                .variants
                .into_iter()
                .filter(|v| !v.is_i_frame)
                .map(|v| Variant {
                    uri: v.uri,
                    bandwidth: v.bandwidth,
                    resolution: v.resolution.map(|r| format!("{}x{}", r.width, r.height)),
                })
                .collect(),
            segments: 0,
        },
        Playlist::MediaPlaylist(media) => HlsManifest {
            variants: Vec::new(),
            segments: media.segments.len(),
        },
    };

    if manifest.variants.is_empty() && manifest.segments == 0 {
        return Err(Error::Playback("manifest lists no variants or segments".to_string()));
    }

    Ok(manifest)
}

pub struct HlsEngine<F> {
    fetcher: F,
    source: Option<String>,
    attached: bool,
    manifest: Option<HlsManifest>,
}

impl<F: TextFetcher> HlsEngine<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            source: None,
            attached: false,
            manifest: None,
        }
    }

    pub fn manifest(&self) -> Option<&HlsManifest> {
        self.manifest.as_ref()
    }
}

impl<F: TextFetcher> StreamEngine for HlsEngine<F> {
    fn load_source(&mut self, url: &str) -> Result<()> {
        self.source = Some(url.to_string());
        self.manifest = None;
        Ok(())
    }

    fn attach_to(&mut self, sink: &mut dyn PlaybackSink) -> Result<()> {
        let Some(url) = &self.source else {
            return Err(Error::Playback("attach before load_source".to_string()));
        };
        sink.set_source(url);
        self.attached = true;
        Ok(())
    }

    fn wait_manifest_ready(&mut self) -> Result<()> {
        let Some(url) = &self.source else {
            return Err(Error::Playback("no source loaded".to_string()));
        };
        if !self.attached {
            return Err(Error::Playback("engine is not attached".to_string()));
        }

        let content = self
            .fetcher
            .fetch_text(url)
            .map_err(|e| Error::Playback(format!("manifest fetch failed: {}", e)))?;
        let manifest = read_manifest(&content)?;

        if let Some(best) = manifest.best_variant() {
            info!(
                "Manifest parsed: {} variants, best {} ({} bps)",
                manifest.variants.len(),
                best.resolution.as_deref().unwrap_or("?"),
                best.bandwidth
            );
        } else {
            debug!("Media playlist with {} segments", manifest.segments);
        }

        self.manifest = Some(manifest);
        Ok(())
    }

    fn destroy(&mut self) {
        self.source = None;
        self.attached = false;
        self.manifest = None;
    }
}

pub struct HlsEngineFactory<F> {
    fetcher: F,
    enabled: bool,
}

impl<F> HlsEngineFactory<F> {
    pub fn new(fetcher: F, enabled: bool) -> Self {
        Self { fetcher, enabled }
    }
}

impl<F: TextFetcher + Clone + 'static> EngineFactory for HlsEngineFactory<F> {
    fn is_supported(&self) -> bool {
        self.enabled
    }

    fn create(&self) -> Box<dyn StreamEngine> {
        Box::new(HlsEngine::new(self.fetcher.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct StaticFetcher(std::result::Result<String, String>);

    impl TextFetcher for StaticFetcher {
        fn fetch_text(&self, _url: &str) -> Result<String> {
            self.0.clone().map_err(Error::Network)
        }
    }

    const MASTER: &str = r#"#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360,CODECS="avc1.4d401e,mp4a.40.2"
low/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080
high/index.m3u8
"#;

    const MEDIA: &str = "#EXTM3U\n#EXT-X-TARGETDURATION:6\n#EXTINF:6.0,\nseg1.ts\n#EXTINF:6.0,\nseg2.ts\n";

    #[test]
    fn test_parse_master_playlist() {
        let manifest = read_manifest(MASTER).unwrap();
        assert!(manifest.is_master());
        assert_eq!(manifest.variants.len(), 2);
        assert_eq!(manifest.variants[0].resolution.as_deref(), Some("640x360"));
        let best = manifest.best_variant().unwrap();
        assert_eq!(best.uri, "high/index.m3u8");
        assert_eq!(best.bandwidth, 5_000_000);
    }

    #[test]
    fn test_parse_media_playlist() {
        let manifest = read_manifest(MEDIA).unwrap();
        assert!(!manifest.is_master());
        assert_eq!(manifest.segments, 2);
    }

    #[test]
    fn test_rejects_non_manifest() {
        assert!(matches!(read_manifest("<html>404</html>"), Err(Error::Playback(_))));
        assert!(matches!(read_manifest("#EXTM3U\n"), Err(Error::Playback(_))));
    }

    #[test]
    fn test_quoted_codecs_do_not_split_variants() {
        let manifest = read_manifest(MASTER).unwrap();
        assert_eq!(manifest.variants[0].uri, "low/index.m3u8");
        assert_eq!(manifest.variants[0].bandwidth, 800_000);
        assert_eq!(manifest.variants[1].resolution.as_deref(), Some("1920x1080"));
    }

    #[test]
    fn test_manifest_with_byte_order_mark() {
        let content = format!("\u{feff}{}", MEDIA);
        assert_eq!(read_manifest(&content).unwrap().segments, 2);
    }

    #[test]
    fn test_engine_requires_attach_before_ready() {
        let mut engine = HlsEngine::new(StaticFetcher(Ok(MEDIA.to_string())));
        engine.load_source("http://a/live.m3u8").unwrap();
        assert!(engine.wait_manifest_ready().is_err());
    }

    #[test]
    fn test_manifest_fetch_failure_is_playback_error() {
        let factory = HlsEngineFactory::new(StaticFetcher(Err("connection refused".to_string())), true);
        assert!(factory.is_supported());
        let mut engine = factory.create();
        engine.load_source("http://a/live.m3u8").unwrap();

        struct NullSink;
        impl PlaybackSink for NullSink {
            fn set_source(&mut self, _url: &str) {}
            fn seek(&mut self, _offset: f64) {}
            fn play(&mut self) -> Result<()> { Ok(()) }
            fn stop(&mut self) {}
            fn set_subtitles(&mut self, _track: Option<&crate::subtitles::SubtitleTrack>) {}
            fn position(&self) -> Option<f64> { None }
            fn is_finished(&mut self) -> bool { false }
        }

        engine.attach_to(&mut NullSink).unwrap();
        assert!(matches!(engine.wait_manifest_ready(), Err(Error::Playback(_))));
    }
}
