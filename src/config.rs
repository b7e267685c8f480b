use clap::{ArgAction, Parser, ValueHint};
use dirs_next::home_dir;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}, time::Duration};
use thiserror::Error;

use crate::audio::{DEFAULT_CHANNELS, DEFAULT_CHUNK_FRAMES, DEFAULT_SAMPLE_RATE};
use crate::dimmer::DimmerConfig;
use crate::display::drivers::spidev::DEFAULT_SPI_SPEED_HZ;
use crate::display::layout::{GRID_COUNT, GRID_SPECIAL};
use crate::display::DisplayMode;
use crate::modes::SpectrumSettings;
use crate::spectrum::{Band, BandSpec, BandSpecError, DEFAULT_GAIN, DEFAULT_THRESHOLD};

pub const DEFAULT_SPI_DEVICE: &str = "/dev/spidev0.0";
pub const DEFAULT_METRICS_INTERVAL_SECS: u64 = 3;

/// Error type for config loading/validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Band error: {0}")]
    Bands(#[from] BandSpecError),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Top-level app configuration. Every field is optional so YAML and CLI
/// can be layered; the accessors below fill in the defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub log_level: Option<String>,     // e.g., "info" | "debug"
    pub mode: Option<DisplayMode>,
    pub transport: Option<TransportConfig>,
    pub audio: Option<AudioConfig>,
    pub dimmer: Option<DimmerSettings>,
    pub metrics: Option<MetricsConfig>,
    /// grid lit bit by bit in scan mode
    pub scan_grid: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    Spidev {
        device: String,             // e.g. "/dev/spidev0.0"
        speed_hz: Option<u32>,
    },
    /// no hardware, frames are logged at debug
    Mock,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AudioConfig {
    /// raw s16le PCM path, "-" for stdin, "none" for silence
    pub source: Option<String>,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    pub chunk_frames: Option<usize>,
    pub gain: Option<f32>,
    pub threshold: Option<f32>,
    pub bands: Option<Vec<Band>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DimmerSettings {
    pub idle_timeout_ms: Option<u64>,
    pub step_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetricsConfig {
    pub interval_secs: Option<u64>,
}

/// CLI overrides. All fields are Options so we can layer them over YAML.
#[derive(Debug, Parser, Clone, Default)]
#[command(name = "vfdmon", version, about = "Spectrum, system metrics and key echo on a PT6315 VFD")]
pub struct Cli {
    /// Path to a YAML config file (overrides search)
    #[arg(long, short = 'c', value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub log_level: Option<String>,
    /// Enable debug log level
    #[arg(long, short = 'v', alias = "verbose", action = ArgAction::SetTrue)]
    pub debug: bool,
    /// What to show
    #[arg(long, short = 'm', value_enum)]
    pub mode: Option<DisplayMode>,
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub spi_device: Option<String>,
    #[arg(long)]
    pub spi_speed_hz: Option<u32>,
    /// run without hardware, frames go to the debug log
    #[arg(long, action = ArgAction::SetTrue)]
    pub dry_run: bool,
    /// raw s16le PCM source, "-" for stdin, "none" for silence
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub audio_source: Option<String>,
    #[arg(long)]
    pub sample_rate: Option<u32>,
    #[arg(long)]
    pub channels: Option<u16>,
    #[arg(long)]
    pub chunk_frames: Option<usize>,
    #[arg(long)]
    pub gain: Option<f32>,
    #[arg(long, allow_negative_numbers = true)]
    pub threshold: Option<f32>,
    #[arg(long)]
    pub idle_timeout_ms: Option<u64>,
    #[arg(long)]
    pub step_delay_ms: Option<u64>,
    #[arg(long)]
    pub metrics_interval_secs: Option<u64>,
    #[arg(long)]
    pub scan_grid: Option<usize>,
    /// dump fully merged config (after overrides) and exit
    #[arg(long, action = ArgAction::SetTrue)]
    pub dump_config: bool,
}

/// Public entry point: parse CLI, read YAML, merge, validate.
pub fn load() -> Result<Config, ConfigError> {
    let cli = Cli::parse();
    let cfg = load_from(&cli)?;

    if cli.dump_config {
        // Pretty YAML of effective config (nice for debugging)
        let s = serde_yaml::to_string(&cfg)?;
        println!("{s}");
        std::process::exit(0);
    }

    Ok(cfg)
}

/// Layer defaults, YAML and `cli`, then validate.
pub fn load_from(cli: &Cli) -> Result<Config, ConfigError> {
    // 1) defaults (from `Default` impl)
    let mut cfg = Config::default();

    // 2) YAML file (explicit path or search)
    if let Some(p) = cli.config.as_ref() {
        if p.exists() {
            let y = read_yaml(p)?;
            merge(&mut cfg, y);
        } else {
            return Err(ConfigError::Validation(format!(
                "Config file not found: {}",
                p.display()
            )));
        }
    } else if let Some(p) = find_config_file() {
        let y = read_yaml(&p)?;
        merge(&mut cfg, y);
    }

    // 3) CLI overrides (highest precedence)
    apply_cli_overrides(&mut cfg, cli);

    // 4) Validate
    validate(&cfg)?;

    Ok(cfg)
}

/// Try common locations in order (first hit wins).
fn find_config_file() -> Option<PathBuf> {
    // XDG-style: ~/.config/vfdmon/config.yaml
    if let Some(home) = home_dir() {
        let p = home.join(".config/vfdmon/config.yaml");
        if p.exists() { return Some(p) }
        let p = home.join(".config/vfdmon.yaml");
        if p.exists() { return Some(p) }
    }
    // project local
    for candidate in &["vfdmon.yaml", "config.yaml", "config/vfdmon.yaml"] {
        let p = PathBuf::from(candidate);
        if p.exists() { return Some(p) }
    }
    None
}

fn read_yaml(path: &Path) -> Result<Config, ConfigError> {
    let s = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&s)?;
    Ok(cfg)
}

/// Shallow merge `src` into `dst`, Option-by-Option.
fn merge(dst: &mut Config, src: Config) {
    // top-level
    if src.log_level.is_some()  { dst.log_level = src.log_level; }
    if src.mode.is_some()       { dst.mode = src.mode; }
    if src.transport.is_some()  { dst.transport = src.transport; }
    if src.scan_grid.is_some()  { dst.scan_grid = src.scan_grid; }
    // audio
    match (&mut dst.audio, src.audio) {
        (None, Some(c)) => dst.audio = Some(c),
        (Some(d), Some(s)) => merge_audio(d, s),
        _ => {}
    }
    // dimmer
    match (&mut dst.dimmer, src.dimmer) {
        (None, Some(c)) => dst.dimmer = Some(c),
        (Some(d), Some(s)) => {
            if s.idle_timeout_ms.is_some() { d.idle_timeout_ms = s.idle_timeout_ms; }
            if s.step_delay_ms.is_some()   { d.step_delay_ms = s.step_delay_ms; }
        }
        _ => {}
    }
    // metrics
    match (&mut dst.metrics, src.metrics) {
        (None, Some(c)) => dst.metrics = Some(c),
        (Some(d), Some(s)) => {
            if s.interval_secs.is_some() { d.interval_secs = s.interval_secs; }
        }
        _ => {}
    }
}

fn merge_audio(dst: &mut AudioConfig, src: AudioConfig) {
    if src.source.is_some()        { dst.source = src.source; }
    if src.sample_rate.is_some()   { dst.sample_rate = src.sample_rate; }
    if src.channels.is_some()      { dst.channels = src.channels; }
    if src.chunk_frames.is_some()  { dst.chunk_frames = src.chunk_frames; }
    if src.gain.is_some()          { dst.gain = src.gain; }
    if src.threshold.is_some()     { dst.threshold = src.threshold; }
    if src.bands.is_some()         { dst.bands = src.bands; }
}

fn apply_cli_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.log_level.is_some()  { cfg.log_level = cli.log_level.clone(); }
    if cli.debug                { cfg.log_level = Some("debug".into()); }
    if cli.mode.is_some()       { cfg.mode = cli.mode; }
    if cli.scan_grid.is_some()  { cfg.scan_grid = cli.scan_grid; }

    // transport
    if cli.dry_run {
        cfg.transport = Some(TransportConfig::Mock);
    } else if cli.spi_device.is_some() || cli.spi_speed_hz.is_some() {
        let (device, speed_hz) = match cfg.transport.take() {
            Some(TransportConfig::Spidev { device, speed_hz }) => (device, speed_hz),
            _ => (DEFAULT_SPI_DEVICE.to_string(), None),
        };
        cfg.transport = Some(TransportConfig::Spidev {
            device: cli.spi_device.clone().unwrap_or(device),
            speed_hz: cli.spi_speed_hz.or(speed_hz),
        });
    }

    // audio
    let any_audio = cli.audio_source.is_some()
        || cli.sample_rate.is_some()
        || cli.channels.is_some()
        || cli.chunk_frames.is_some()
        || cli.gain.is_some()
        || cli.threshold.is_some();
    if any_audio && cfg.audio.is_none() {
        cfg.audio = Some(AudioConfig::default());
    }
    if let Some(audio) = cfg.audio.as_mut() {
        if cli.audio_source.is_some()  { audio.source = cli.audio_source.clone(); }
        if cli.sample_rate.is_some()   { audio.sample_rate = cli.sample_rate; }
        if cli.channels.is_some()      { audio.channels = cli.channels; }
        if cli.chunk_frames.is_some()  { audio.chunk_frames = cli.chunk_frames; }
        if cli.gain.is_some()          { audio.gain = cli.gain; }
        if cli.threshold.is_some()     { audio.threshold = cli.threshold; }
    }

    // dimmer
    if (cli.idle_timeout_ms.is_some() || cli.step_delay_ms.is_some()) && cfg.dimmer.is_none() {
        cfg.dimmer = Some(DimmerSettings::default());
    }
    if let Some(dimmer) = cfg.dimmer.as_mut() {
        if cli.idle_timeout_ms.is_some() { dimmer.idle_timeout_ms = cli.idle_timeout_ms; }
        if cli.step_delay_ms.is_some()   { dimmer.step_delay_ms = cli.step_delay_ms; }
    }

    // metrics
    if let Some(secs) = cli.metrics_interval_secs {
        cfg.metrics.get_or_insert_with(MetricsConfig::default).interval_secs = Some(secs);
    }
}

/// Put any invariants here (required fields, ranges, etc.)
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(level) = cfg.log_level.as_deref() {
        if level.parse::<log::LevelFilter>().is_err() {
            return Err(ConfigError::Validation(format!("unknown log_level {level:?}")));
        }
    }
    if let Some(TransportConfig::Spidev { device, speed_hz }) = cfg.transport.as_ref() {
        if device.is_empty() {
            return Err(ConfigError::Validation("transport device must be set".into()));
        }
        if *speed_hz == Some(0) {
            return Err(ConfigError::Validation("transport speed_hz must be > 0".into()));
        }
    }
    if let Some(audio) = cfg.audio.as_ref() {
        if audio.sample_rate == Some(0) {
            return Err(ConfigError::Validation("audio sample_rate must be > 0".into()));
        }
        if let Some(ch) = audio.channels {
            if !(1..=2).contains(&ch) {
                return Err(ConfigError::Validation("audio channels must be 1|2".into()));
            }
        }
        if let Some(n) = audio.chunk_frames {
            if n < 2 {
                return Err(ConfigError::Validation("audio chunk_frames must be >= 2".into()));
            }
        }
        if let Some(g) = audio.gain {
            if !g.is_finite() || g <= 0.0 {
                return Err(ConfigError::Validation("audio gain must be > 0".into()));
            }
        }
        if let Some(t) = audio.threshold {
            if !t.is_finite() {
                return Err(ConfigError::Validation("audio threshold must be finite".into()));
            }
        }
        if let Some(bands) = audio.bands.as_ref() {
            BandSpec::new(bands.clone())?;
        }
    }
    if let Some(dimmer) = cfg.dimmer.as_ref() {
        if dimmer.step_delay_ms == Some(0) {
            return Err(ConfigError::Validation("dimmer step_delay_ms must be > 0".into()));
        }
    }
    if cfg.metrics.as_ref().and_then(|m| m.interval_secs) == Some(0) {
        return Err(ConfigError::Validation("metrics interval_secs must be > 0".into()));
    }
    if let Some(grid) = cfg.scan_grid {
        if grid >= GRID_COUNT {
            return Err(ConfigError::Validation(format!("scan_grid must be 0..{GRID_COUNT}")));
        }
    }
    Ok(())
}

// effective values, defaults filled in
impl Config {
    pub fn log_filter(&self) -> &str {
        self.log_level.as_deref().unwrap_or("info")
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode.unwrap_or(DisplayMode::Spectrum)
    }

    pub fn transport(&self) -> TransportConfig {
        self.transport.clone().unwrap_or_else(|| TransportConfig::Spidev {
            device: DEFAULT_SPI_DEVICE.to_string(),
            speed_hz: None,
        })
    }

    pub fn spi_speed_hz(&self) -> u32 {
        match self.transport.as_ref() {
            Some(TransportConfig::Spidev { speed_hz: Some(hz), .. }) => *hz,
            _ => DEFAULT_SPI_SPEED_HZ,
        }
    }

    fn audio(&self) -> AudioConfig {
        self.audio.clone().unwrap_or_default()
    }

    pub fn audio_source(&self) -> String {
        self.audio().source.unwrap_or_else(|| "-".to_string())
    }

    pub fn sample_rate(&self) -> u32 {
        self.audio().sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    pub fn channels(&self) -> u16 {
        self.audio().channels.unwrap_or(DEFAULT_CHANNELS)
    }

    pub fn chunk_frames(&self) -> usize {
        self.audio().chunk_frames.unwrap_or(DEFAULT_CHUNK_FRAMES)
    }

    pub fn spectrum_settings(&self) -> Result<SpectrumSettings, ConfigError> {
        let audio = self.audio();
        let bands = match audio.bands {
            Some(b) => BandSpec::new(b)?,
            None => BandSpec::default(),
        };
        Ok(SpectrumSettings {
            bands,
            gain: audio.gain.unwrap_or(DEFAULT_GAIN),
            threshold: audio.threshold.unwrap_or(DEFAULT_THRESHOLD),
        })
    }

    pub fn dimmer_config(&self) -> DimmerConfig {
        let defaults = DimmerConfig::default();
        let d = self.dimmer.clone().unwrap_or_default();
        DimmerConfig {
            idle_timeout: d.idle_timeout_ms.map_or(defaults.idle_timeout, Duration::from_millis),
            step_delay: d.step_delay_ms.map_or(defaults.step_delay, Duration::from_millis),
        }
    }

    pub fn metrics_interval(&self) -> Duration {
        let secs = self
            .metrics
            .as_ref()
            .and_then(|m| m.interval_secs)
            .unwrap_or(DEFAULT_METRICS_INTERVAL_SECS);
        Duration::from_secs(secs)
    }

    pub fn scan_grid(&self) -> usize {
        self.scan_grid.unwrap_or(GRID_SPECIAL)
    }
}
