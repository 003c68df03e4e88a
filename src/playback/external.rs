//! Native playback through an external player process (ffplay, mpv, vlc)

use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use super::PlaybackSink;
use crate::error::{Error, Result};
use crate::subtitles::SubtitleTrack;

pub struct ExternalPlayer {
    player: String,
    user_agent: String,
    source: Option<String>,
    start_offset: f64,
    subtitles: Option<PathBuf>,
    child: Option<Child>,
    launched_at: Option<Instant>,
}

impl ExternalPlayer {
    pub fn new(player: &str, user_agent: &str) -> Self {
        Self {
            player: player.to_string(),
            user_agent: user_agent.to_string(),
            source: None,
            start_offset: 0.0,
            subtitles: None,
            child: None,
            launched_at: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    /// Player-specific command line for `url`
    fn build_args(&self, url: &str) -> Vec<String> {
        let player_lower = self.player.to_lowercase();
        let stream_name = url.split('/').next_back().unwrap_or("stream");
        let mut args = vec![url.to_string()];

        if player_lower.contains("ffplay") {
            args.extend(["-autoexit".to_string(), "-window_title".to_string(), stream_name.to_string()]);
            if url.starts_with("http") {
                args.extend([
                    "-reconnect".to_string(), "1".to_string(),
                    "-reconnect_streamed".to_string(), "1".to_string(),
                ]);
            }
            args.extend(["-user_agent".to_string(), self.user_agent.clone()]);
            if self.start_offset > 0.0 {
                args.extend(["-ss".to_string(), format!("{:.1}", self.start_offset)]);
            }
            if self.subtitles.is_some() {
                debug!("ffplay cannot load external subtitle files; ignoring track");
            }
        } else if player_lower.contains("mpv") {
            args.extend([
                format!("--title={}", stream_name),
                "--cache=yes".to_string(),
                "--ytdl=no".to_string(),
                format!("--user-agent={}", self.user_agent),
            ]);
            if self.start_offset > 0.0 {
                args.push(format!("--start=+{:.1}", self.start_offset));
            }
            if let Some(subs) = &self.subtitles {
                args.push(format!("--sub-file={}", subs.display()));
            }
        } else if player_lower.contains("vlc") {
            args.extend([
                format!("--meta-title={}", stream_name),
                "--http-reconnect".to_string(),
                format!("--http-user-agent={}", self.user_agent),
            ]);
            if self.start_offset > 0.0 {
                args.push(format!("--start-time={:.1}", self.start_offset));
            }
            if let Some(subs) = &self.subtitles {
                args.push(format!("--sub-file={}", subs.display()));
            }
        }
        // Generic players just get the URL

        args
    }

    fn launch(&mut self) -> Result<()> {
        let Some(url) = self.source.clone() else {
            return Err(Error::Playback("no source set".to_string()));
        };

        let mut cmd = Command::new(&self.player);
        cmd.args(self.build_args(&url));
        // Some players read the user agent from the environment
        cmd.env("USER_AGENT", &self.user_agent);
        cmd.stderr(Stdio::piped());
        cmd.stdout(Stdio::null());

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::Playback(format!("Failed to launch player '{}': {}", self.player, e)))?;
        info!("Player launched successfully (PID: {})", child.id());

        if let Some(stderr) = child.stderr.take() {
            thread::spawn(move || {
                let reader = BufReader::new(stderr);
                for line in reader.lines().map_while(std::result::Result::ok) {
                    if !line.trim().is_empty() {
                        debug!("[PLAYER] {}", line);
                    }
                }
            });
        }

        self.child = Some(child);
        self.launched_at = Some(Instant::now());
        Ok(())
    }

    fn kill(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait(); // Reap the process
            debug!("Player process stopped");
        }
        self.launched_at = None;
    }
}

impl PlaybackSink for ExternalPlayer {
    fn set_source(&mut self, url: &str) {
        self.source = Some(url.to_string());
        self.start_offset = 0.0;
    }

    /// Takes effect on the next launch; a running process is restarted
    fn seek(&mut self, offset: f64) {
        self.start_offset = offset.max(0.0);
        if self.is_running() {
            self.kill();
            if let Err(e) = self.launch() {
                error!("{}", e);
            }
        }
    }

    fn play(&mut self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }
        self.launch()
    }

    fn stop(&mut self) {
        self.kill();
        self.source = None;
        self.start_offset = 0.0;
    }

    fn set_subtitles(&mut self, track: Option<&SubtitleTrack>) {
        self.subtitles = track.map(|t| t.path.clone());
        if self.is_running() {
            // Relaunch from the current position so the player picks up the track
            let position = self.position().unwrap_or(self.start_offset);
            self.seek(position);
        }
    }

    /// Estimated from wall-clock time since launch
    fn position(&self) -> Option<f64> {
        self.launched_at
            .map(|at| self.start_offset + at.elapsed().as_secs_f64())
    }

    fn is_finished(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return true;
        };
        match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    warn!("Player exited with status {:?}", status.code());
                }
                self.child = None;
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!("Failed to wait for player: {}", e);
                false
            }
        }
    }
}

impl Drop for ExternalPlayer {
    fn drop(&mut self) {
        self.kill();
    }
}
