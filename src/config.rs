//! Runtime configuration for splat-stream.
//!
//! Configuration can be loaded from a JSON file or constructed programmatically.
//! All playback, prefetch and upload knobs live here. Inconsistent values are
//! corrected by [`Config::normalize`] rather than rejected.

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::splat::MAX_SH_BANDS;

/// Lowest accepted playback rate.
pub const MIN_FRAMES_PER_SECOND: f64 = 0.01;

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "splat-stream", about = "Splat frame sequence streaming player")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// HTTP listen address for the control API (overrides config).
    #[arg(long)]
    pub listen: Option<String>,

    /// Play `.splat` / `.splat.zst` frames from this directory (overrides config).
    #[arg(long)]
    pub frames_dir: Option<PathBuf>,

    /// Play this many generated frames instead of files (overrides config).
    #[arg(long, conflicts_with = "frames_dir")]
    pub synthetic: Option<usize>,

    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(long)]
    pub duration_secs: Option<u64>,

    /// Do not start the HTTP control API.
    #[arg(long)]
    pub no_server: bool,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Control API settings.
    pub server: ServerConfig,

    /// Playback cursor settings.
    pub playback: PlaybackConfig,

    /// Prefetch window and cache capacity.
    pub prefetch: PrefetchConfig,

    /// Incremental upload settings.
    pub upload: UploadConfig,

    /// Where frames come from.
    pub source: SourceConfig,
}

/// HTTP control API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Start the control API.
    pub enabled: bool,

    /// Listen address (e.g. "127.0.0.1:8090").
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: "127.0.0.1:8090".to_string(),
        }
    }
}

/// Playback cursor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Sequence frame rate (clamped to >= 0.01).
    pub frames_per_second: f64,

    /// Wrap to the first frame after the last one.
    pub loop_playback: bool,

    /// Rate of the tick callback driving the player.
    pub tick_rate_hz: f64,

    /// Start playing as soon as the player is enabled.
    pub autoplay: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            frames_per_second: 12.0,
            loop_playback: true,
            tick_rate_hz: 60.0,
            autoplay: true,
        }
    }
}

/// Prefetch window and cache capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    /// Frames to keep loaded ahead of the cursor.
    pub preload_ahead: usize,

    /// Frames to keep loaded behind the cursor.
    pub preload_behind: usize,

    /// Cache capacity (clamped to >= window size).
    pub max_cached_frames: usize,

    /// Keep showing the last frame while the current one loads.
    pub hold_last_frame_while_loading: bool,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            preload_ahead: 2,
            preload_behind: 1,
            max_cached_frames: 6,
            hold_last_frame_while_loading: true,
        }
    }
}

impl PrefetchConfig {
    /// Full window size: `behind + ahead + 1`, saturating at `usize::MAX`.
    pub fn window_size(&self) -> usize {
        self.preload_behind
            .saturating_add(self.preload_ahead)
            .saturating_add(1)
    }

    /// Capacity after clamping to the window size.
    pub fn effective_capacity(&self) -> usize {
        self.max_cached_frames.max(self.window_size())
    }
}

/// Incremental upload settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Split uploads across ticks instead of uploading a frame in one go.
    pub async_upload: bool,

    /// Max splats uploaded per tick (clamped to >= 1).
    pub upload_batch_size: usize,

    /// Render the uploaded prefix while the rest of the frame is in flight.
    pub render_before_upload_complete: bool,

    /// Spherical-harmonics degree used at render time (0-3).
    pub sh_degree: u8,

    /// Convert colors from gamma to linear space when rendering.
    pub gamma_to_linear: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            async_upload: true,
            upload_batch_size: 100_000,
            render_before_upload_complete: true,
            sh_degree: 3,
            gamma_to_linear: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// An explicit list of frame files, played in the listed order.
    Manual,
    /// `.splat` / `.splat.zst` files in a directory.
    Directory,
    /// Generated frames (no disk I/O).
    Synthetic,
}

/// Frame source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,

    /// Frame file paths when `kind` is `manual`.
    pub frames: Vec<PathBuf>,

    /// Directory scanned when `kind` is `directory`.
    pub directory: PathBuf,

    /// Sort frames by name (ordinal) after listing.
    pub sort_by_name: bool,

    /// Number of generated frames when `kind` is `synthetic`.
    pub synthetic_frames: usize,

    /// Splats per generated frame.
    pub splats_per_frame: usize,

    /// SH bands of generated frames.
    pub sh_bands: u8,

    /// Simulated per-frame load latency for generated frames.
    pub load_latency_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Synthetic,
            frames: Vec::new(),
            directory: PathBuf::from("frames"),
            sort_by_name: true,
            synthetic_frames: 48,
            splats_per_frame: 250_000,
            sh_bands: 1,
            load_latency_ms: 40,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let data = std::fs::read_to_string(path)?;
            serde_json::from_str::<Config>(&data)?
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Config::default()
        };
        config.normalize();
        Ok(config)
    }

    /// Apply CLI overrides on top of the file configuration.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(listen) = &cli.listen {
            self.server.listen = listen.clone();
        }
        if cli.no_server {
            self.server.enabled = false;
        }
        if let Some(dir) = &cli.frames_dir {
            self.source.kind = SourceKind::Directory;
            self.source.directory = dir.clone();
        }
        if let Some(count) = cli.synthetic {
            self.source.kind = SourceKind::Synthetic;
            self.source.synthetic_frames = count;
        }
        self.normalize();
    }

    /// Clamp every setting into its valid range.
    ///
    /// Returns true if anything was corrected.
    pub fn normalize(&mut self) -> bool {
        let mut corrected = false;

        if !(self.playback.frames_per_second >= MIN_FRAMES_PER_SECOND) {
            debug!(
                frames_per_second = self.playback.frames_per_second,
                "Clamping frame rate"
            );
            self.playback.frames_per_second = MIN_FRAMES_PER_SECOND;
            corrected = true;
        }

        if !(self.playback.tick_rate_hz > 0.0) {
            self.playback.tick_rate_hz = PlaybackConfig::default().tick_rate_hz;
            corrected = true;
        }

        let window = self.prefetch.window_size();
        if self.prefetch.max_cached_frames < window {
            debug!(
                max_cached_frames = self.prefetch.max_cached_frames,
                window, "Clamping cache capacity to window size"
            );
            self.prefetch.max_cached_frames = window;
            corrected = true;
        }

        if self.upload.upload_batch_size == 0 {
            self.upload.upload_batch_size = 1;
            corrected = true;
        }

        if self.upload.sh_degree > MAX_SH_BANDS {
            self.upload.sh_degree = MAX_SH_BANDS;
            corrected = true;
        }

        if self.source.sh_bands > MAX_SH_BANDS {
            self.source.sh_bands = MAX_SH_BANDS;
            corrected = true;
        }

        corrected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.prefetch.preload_ahead, 2);
        assert_eq!(cfg.prefetch.window_size(), 4);
        assert_eq!(cfg.upload.upload_batch_size, 100_000);
    }

    #[test]
    fn test_capacity_clamped_to_window() {
        let mut cfg = Config::default();
        cfg.prefetch.preload_behind = 1;
        cfg.prefetch.preload_ahead = 2;
        cfg.prefetch.max_cached_frames = 3;

        assert_eq!(cfg.prefetch.effective_capacity(), 4);
        assert!(cfg.normalize());
        assert_eq!(cfg.prefetch.max_cached_frames, 4);
    }

    #[test]
    fn test_huge_preload_saturates() {
        let mut cfg: Config = serde_json::from_str(
            r#"{ "prefetch": { "preload_ahead": 18446744073709551615, "preload_behind": 1 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.prefetch.window_size(), usize::MAX);
        assert!(cfg.normalize());
        assert_eq!(cfg.prefetch.max_cached_frames, usize::MAX);
        assert_eq!(cfg.prefetch.effective_capacity(), usize::MAX);
    }

    #[test]
    fn test_frame_rate_floor() {
        let mut cfg = Config::default();
        cfg.playback.frames_per_second = 0.0;
        cfg.normalize();
        assert_eq!(cfg.playback.frames_per_second, MIN_FRAMES_PER_SECOND);

        cfg.playback.frames_per_second = f64::NAN;
        cfg.normalize();
        assert_eq!(cfg.playback.frames_per_second, MIN_FRAMES_PER_SECOND);
    }

    #[test]
    fn test_normalize_is_noop_on_defaults() {
        let mut cfg = Config::default();
        assert!(!cfg.normalize());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let cfg: Config =
            serde_json::from_str(r#"{ "prefetch": { "preload_ahead": 5 } }"#).unwrap();
        assert_eq!(cfg.prefetch.preload_ahead, 5);
        assert_eq!(cfg.prefetch.preload_behind, 1);
        assert!(cfg.playback.loop_playback);
    }

    #[test]
    fn test_manual_source_from_json() {
        let cfg: Config = serde_json::from_str(
            r#"{ "source": { "kind": "manual", "frames": ["b.splat", "a.splat.zst"] } }"#,
        )
        .unwrap();
        assert_eq!(cfg.source.kind, SourceKind::Manual);
        assert_eq!(
            cfg.source.frames,
            vec![PathBuf::from("b.splat"), PathBuf::from("a.splat.zst")]
        );
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from(["splat-stream", "--frames-dir", "/tmp/frames", "--no-server"]);
        let mut cfg = Config::default();
        cfg.apply_cli(&cli);
        assert_eq!(cfg.source.kind, SourceKind::Directory);
        assert_eq!(cfg.source.directory, PathBuf::from("/tmp/frames"));
        assert!(!cfg.server.enabled);
    }
}
