//! PixStream - IPTV playlist player
//! Command-line front end over the player core

// Use mimalloc for faster memory allocation (Linux, macOS)
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pixstream::channels::{ChannelFilter, StatusFilter};
use pixstream::config::AppConfig;
use pixstream::http::HttpClient;
use pixstream::liveness::LivenessChecker;
use pixstream::models::Theme;
use pixstream::notify::Notifier;
use pixstream::playback::{ExternalPlayer, HlsEngineFactory, PlaybackSession};
use pixstream::playlist::{self, PlaylistFormat};
use pixstream::shell_cache::{ShellCache, SHELL_ASSETS};
use pixstream::state::AppState;
use pixstream::storage::FileStorage;
use pixstream::view;

#[derive(Parser)]
#[command(name = "pixstream")]
#[command(about = "IPTV playlist player with favorites, liveness checks and resumable playback")]
#[command(version)]
struct Cli {
    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a playlist from a URL or a .m3u/.json/.txt file, then check every channel
    Load {
        source: String,
    },

    /// Show channels grouped by group title
    List {
        #[arg(short, long)]
        group: Option<String>,

        /// Case-insensitive name filter
        #[arg(short, long, default_value = "")]
        search: String,

        #[arg(short, long)]
        favorites: bool,

        #[arg(long, value_enum, default_value_t = StatusArg::All)]
        status: StatusArg,
    },

    /// Toggle the favorite flag of a channel
    Favorite {
        url: String,
    },

    /// Probe every channel and update its status
    Check,

    /// Play a channel with the configured player
    Play {
        #[arg(required_unless_present = "random")]
        url: Option<String>,

        /// Pick a random channel
        #[arg(long, conflicts_with = "url")]
        random: bool,

        /// .srt file to show with the stream
        #[arg(long)]
        subtitles: Option<PathBuf>,
    },

    /// Playlist upload history
    History {
        /// Reload entry N
        #[arg(long, conflicts_with_all = ["delete", "clear"])]
        reload: Option<usize>,

        /// Delete entry N
        #[arg(long, conflicts_with = "clear")]
        delete: Option<usize>,

        #[arg(long)]
        clear: bool,
    },

    /// Recently played channels
    Recent,

    /// Write the channel list as a playlist
    Export {
        #[arg(short, long, value_enum, default_value_t = FormatArg::M3u)]
        format: FormatArg,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show or change the theme
    Theme {
        #[arg(value_enum)]
        action: Option<ThemeArg>,
    },

    /// Remove all stored data
    Clear,

    /// Offline app shell cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Pre-fetch the app shell
    Install {
        #[arg(long, default_value = "https://pixstream.netlify.app")]
        origin: String,
    },
    /// Remove caches of older versions
    Activate,
    /// Fetch a URL through the cache
    Fetch {
        url: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    All,
    Active,
    Offline,
}

impl From<StatusArg> for StatusFilter {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::All => StatusFilter::All,
            StatusArg::Active => StatusFilter::Active,
            StatusArg::Offline => StatusFilter::Offline,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    M3u,
    Json,
    Txt,
}

impl From<FormatArg> for PlaylistFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::M3u => PlaylistFormat::M3u,
            FormatArg::Json => PlaylistFormat::Json,
            FormatArg::Txt => PlaylistFormat::Text,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ThemeArg {
    Dark,
    Light,
    Toggle,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };

    let storage = FileStorage::open(config.storage_path());
    info!("Using storage {}", storage.path().display());
    let mut state = AppState::load(Box::new(storage))
        .with_notifier(Notifier::new(config.notification_duration()));
    let client = HttpClient::from_config(&config);

    match cli.command {
        Commands::Load { source } => cmd_load(&mut state, &client, &config, &source)?,
        Commands::List { group, search, favorites, status } => {
            let filter = ChannelFilter {
                group,
                search,
                favorites_only: favorites,
                status: status.into(),
            };
            print_channels(&state, &filter);
        }
        Commands::Favorite { url } => match state.toggle_favorite(&url) {
            Some(true) => println!("Added to favorites: {}", url),
            Some(false) => println!("Removed from favorites: {}", url),
            None => bail!("No channel with URL {}", url),
        },
        Commands::Check => {
            let counts = checker(&client, &config).check_all(&mut state);
            println!("Total: {} | Active: {} | Offline: {}", counts.total, counts.active, counts.offline);
        }
        Commands::Play { url, random, subtitles } => {
            cmd_play(&mut state, &client, &config, url.as_deref(), random, subtitles.as_deref())?
        }
        Commands::History { reload, delete, clear } => {
            cmd_history(&mut state, &client, &config, reload, delete, clear)?
        }
        Commands::Recent => {
            for play in state.recent_plays().iter() {
                println!("{}  {}  {}", play.timestamp, play.name, play.url);
            }
        }
        Commands::Export { format, output } => {
            let content = playlist::write(state.channels().as_slice(), format.into())?;
            match output {
                Some(path) => {
                    fs::write(&path, content).with_context(|| format!("writing {}", path.display()))?;
                    println!("Exported {} channels to {}", state.channels().len(), path.display());
                }
                None => print!("{}", content),
            }
        }
        Commands::Theme { action } => {
            let theme = match action {
                Some(ThemeArg::Dark) => {
                    state.set_theme(Theme::Dark);
                    Theme::Dark
                }
                Some(ThemeArg::Light) => {
                    state.set_theme(Theme::Light);
                    Theme::Light
                }
                Some(ThemeArg::Toggle) => state.toggle_theme(),
                None => state.theme(),
            };
            println!("{}", theme.as_str());
        }
        Commands::Clear => {
            state.clear_all();
            print_notification(&state);
        }
        Commands::Cache { action } => cmd_cache(&client, &config, action)?,
    }

    Ok(())
}

fn checker<'a>(client: &'a HttpClient, config: &AppConfig) -> LivenessChecker<&'a HttpClient> {
    let checker = LivenessChecker::new(client);
    match config.probe_cap() {
        Some(cap) => checker.with_max_parallel(cap),
        None => checker,
    }
}

fn is_url(source: &str) -> bool {
    let lower = source.to_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn cmd_load(state: &mut AppState, client: &HttpClient, config: &AppConfig, source: &str) -> Result<()> {
    let loaded = if is_url(source) {
        state.load_playlist_url(client, source)
    } else {
        state.load_playlist_file(Path::new(source))
    };
    print_notification(state);
    let count = loaded?;
    println!("Loaded {} channels", count);

    let counts = checker(client, config).check_all(state);
    println!("Total: {} | Active: {} | Offline: {}", counts.total, counts.active, counts.offline);
    Ok(())
}

fn cmd_play(
    state: &mut AppState,
    client: &HttpClient,
    config: &AppConfig,
    url: Option<&str>,
    random: bool,
    subtitles: Option<&Path>,
) -> Result<()> {
    let sink = ExternalPlayer::new(config.player(), client.user_agent());
    let mut session = PlaybackSession::new(Box::new(sink), checker(client, config)).with_engine_factory(
        Box::new(HlsEngineFactory::new(client.clone(), config.adaptive_streaming)),
    );

    let started = match (url, random) {
        (_, true) => session.play_random(state, &mut rand::thread_rng()),
        (Some(url), false) => {
            let (name, logo) = state
                .channels()
                .find(url)
                .map(|c| (c.name.clone(), c.logo.clone()))
                .unwrap_or_else(|| (url.to_string(), String::new()));
            session.play(state, url, &name, &logo)
        }
        (None, false) => bail!("Either a URL or --random is required"),
    };
    print_notification(state);
    started?;

    if let Some(now) = session.now_playing() {
        println!("Now playing: {} [{}]", now.name, now.quality.label());
    }

    if let Some(path) = subtitles {
        // A bad subtitle file does not stop playback
        let _ = session.load_subtitles(state, path);
        print_notification(state);
    }

    while session.tick(state) {
        thread::sleep(Duration::from_secs(1));
    }
    Ok(())
}

fn cmd_history(
    state: &mut AppState,
    client: &HttpClient,
    config: &AppConfig,
    reload: Option<usize>,
    delete: Option<usize>,
    clear: bool,
) -> Result<()> {
    if let Some(index) = reload {
        let loaded = state.load_from_history(client, index);
        print_notification(state);
        let count = loaded?;
        println!("Loaded {} channels", count);
        let counts = checker(client, config).check_all(state);
        println!("Total: {} | Active: {} | Offline: {}", counts.total, counts.active, counts.offline);
        return Ok(());
    }

    if let Some(index) = delete {
        match state.delete_history_item(index) {
            Some(entry) => println!("Deleted {}", entry.source),
            None => bail!("No history entry at index {}", index),
        }
        return Ok(());
    }

    if clear {
        state.clear_history();
        println!("History cleared");
        return Ok(());
    }

    for row in view::project_history(state) {
        let marker = if row.reloadable { "url " } else { "file" };
        println!("{:>2}  {}  {}  {}", row.index, marker, row.timestamp, row.source);
    }
    Ok(())
}

fn cmd_cache(client: &HttpClient, config: &AppConfig, action: CacheAction) -> Result<()> {
    let mut cache = ShellCache::current(config.cache_root());
    match action {
        CacheAction::Install { origin } => {
            let count = cache.install(client, &origin, SHELL_ASSETS)?;
            println!("Cached {} assets in {}", count, cache.name());
        }
        CacheAction::Activate => {
            for name in cache.activate()? {
                println!("Deleted {}", name);
            }
        }
        CacheAction::Fetch { url } => {
            let resource = cache.respond(client, &url);
            println!("{} ({} bytes)", resource.content_type, resource.body.len());
        }
    }
    Ok(())
}

fn print_channels(state: &AppState, filter: &ChannelFilter) {
    let model = view::project(state, None, filter);
    for group in &model.groups {
        println!("{}", group.name);
        for row in &group.channels {
            let star = if row.favorite { "*" } else { " " };
            let status = if row.status.is_empty() { "-" } else { row.status };
            println!("  {} {:<8} {}  {}", star, status, row.name, row.url);
        }
    }
    let counts = model.status_bar.counts;
    println!("Total: {} | Active: {} | Offline: {}", counts.total, counts.active, counts.offline);
}

fn print_notification(state: &AppState) {
    if let Some(message) = state.notifier().last_message() {
        println!("{}", message);
    }
}
