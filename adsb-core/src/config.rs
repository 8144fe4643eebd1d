//! Configuration file management for adsb-stream.
//!
//! Reads/writes `~/.adsb-stream/config.json`: feed address, receiver
//! location, decoder limits, publisher mode, and the optional archive path.
//! Every field has a default, so a partial file is fine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::buffer::{DEFAULT_CAPACITY, DEFAULT_TTL_MS};
use crate::framer::DEFAULT_SCAN_LIMIT;
use crate::store::DEFAULT_STALE_TIMEOUT_MS;
use crate::types::{AdsbError, Result};

/// Full configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub receiver: ReceiverConfig,
    pub decoder: DecoderConfig,
    pub publisher: PublisherConfig,
    pub archive: ArchiveConfig,
}

/// Upstream TCP feed of `*<hex>;` frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub host: String,
    pub port: u16,
    /// Connect timeout in seconds.
    pub timeout_secs: f64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig {
            host: "127.0.0.1".into(),
            port: 30002,
            timeout_secs: 10.0,
        }
    }
}

/// Longest accepted connect timeout (seconds).
pub const MAX_TIMEOUT_SECS: f64 = 3600.0;

impl SourceConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    pub name: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        ReceiverConfig {
            name: "default".into(),
            lat: None,
            lon: None,
        }
    }
}

impl ReceiverConfig {
    /// Receiver location, if both coordinates are set.
    pub fn reference(&self) -> Option<(f64, f64)> {
        Some((self.lat?, self.lon?))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub buffer_ttl_ms: u64,
    pub buffer_capacity: usize,
    pub scan_limit: usize,
    /// Aircraft silent for longer than this are dropped from the store.
    pub stale_timeout_ms: u64,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        DecoderConfig {
            buffer_ttl_ms: DEFAULT_TTL_MS,
            buffer_capacity: DEFAULT_CAPACITY,
            scan_limit: DEFAULT_SCAN_LIMIT,
            stale_timeout_ms: DEFAULT_STALE_TIMEOUT_MS,
        }
    }
}

/// What subscribers receive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishMode {
    /// One shared record: whichever aircraft changed last.
    #[default]
    Latest,
    /// One record per aircraft that changed.
    PerAircraft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    pub poll_interval_ms: u64,
    pub mode: PublishMode,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        PublisherConfig {
            poll_interval_ms: 50,
            mode: PublishMode::Latest,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    pub path: Option<PathBuf>,
}

/// Get the config directory path (`~/.adsb-stream/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".adsb-stream")
}

/// Get the config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.json")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load config from `path`.
///
/// A missing file yields the defaults; an unreadable or malformed one is an error.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| AdsbError::Config(format!("{}: {e}", path.display())))?;
    parse_config(&text)
}

/// Parse JSON config text.
pub fn parse_config(text: &str) -> Result<Config> {
    let config: Config = serde_json::from_str(text)?;
    config.validate()?;
    Ok(config)
}

/// Write config as pretty JSON, creating the parent directory.
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| AdsbError::Config(e.to_string()))?;
    }
    let text = serde_json::to_string_pretty(config)?;
    std::fs::write(path, text).map_err(|e| AdsbError::Config(e.to_string()))?;
    Ok(())
}

impl Config {
    fn validate(&self) -> Result<()> {
        if self.source.host.is_empty() {
            return Err(AdsbError::Config("source.host is empty".into()));
        }
        let timeout = self.source.timeout_secs;
        if timeout.is_nan() || timeout <= 0.0 || timeout > MAX_TIMEOUT_SECS {
            return Err(AdsbError::Config(format!(
                "source.timeout_secs must be in (0, {MAX_TIMEOUT_SECS}]"
            )));
        }
        if self.decoder.buffer_ttl_ms == 0 {
            return Err(AdsbError::Config("decoder.buffer_ttl_ms must be positive".into()));
        }
        if self.decoder.stale_timeout_ms == 0 {
            return Err(AdsbError::Config("decoder.stale_timeout_ms must be positive".into()));
        }
        if self.publisher.poll_interval_ms == 0 {
            return Err(AdsbError::Config("publisher.poll_interval_ms must be positive".into()));
        }
        if let Some(lat) = self.receiver.lat {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(AdsbError::Config(format!("receiver.lat {lat} out of range")));
            }
        }
        if let Some(lon) = self.receiver.lon {
            if !(-180.0..=180.0).contains(&lon) {
                return Err(AdsbError::Config(format!("receiver.lon {lon} out of range")));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
