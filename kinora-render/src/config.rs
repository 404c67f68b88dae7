//! Render settings persistence
//!
//! Stores the effect chain settings in a simple key=value file.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

/// Render configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Output sample rate; the input is resampled when it differs
    pub sample_rate: u32,
    pub playback_rate: f32,
    /// -1.0 (left) to 1.0 (right)
    pub pan: f32,
    pub reverb: bool,
    pub reverb_amount: f32,
    pub wet_mix: f32,
    pub isolation: bool,
    pub intensity: f32,
    pub bass_boost: f32,
    /// Samples pulled from the chain per read
    pub block_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            playback_rate: 1.0,
            pan: 0.0,
            reverb: false,
            reverb_amount: 0.5,
            wet_mix: 0.35,
            isolation: false,
            intensity: 1.0,
            bass_boost: 0.5,
            block_size: 4096,
        }
    }
}

impl Config {
    /// Load config from the default location
    ///
    /// Returns default config if file doesn't exist or can't be read.
    pub fn load() -> Self {
        let path = Self::config_path();
        Self::load_from(&path).unwrap_or_default()
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(path, self.serialize())
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("kinora")
            .join("render.conf")
    }

    /// Parse config from simple key=value format
    pub fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                warn!(line, "Ignoring config line without '='");
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "sample_rate" => parse_into(key, value, &mut config.sample_rate),
                "playback_rate" => parse_into(key, value, &mut config.playback_rate),
                "pan" => parse_into(key, value, &mut config.pan),
                "reverb" => parse_into(key, value, &mut config.reverb),
                "reverb_amount" => parse_into(key, value, &mut config.reverb_amount),
                "wet_mix" => parse_into(key, value, &mut config.wet_mix),
                "isolation" => parse_into(key, value, &mut config.isolation),
                "intensity" => parse_into(key, value, &mut config.intensity),
                "bass_boost" => parse_into(key, value, &mut config.bass_boost),
                "block_size" => parse_into(key, value, &mut config.block_size),
                _ => {} // Ignore unknown keys
            }
        }

        config
    }

    /// Serialize config to simple key=value format
    pub fn serialize(&self) -> String {
        let lines = [
            "# Kinora render configuration".to_string(),
            format!("sample_rate={}", self.sample_rate),
            format!("playback_rate={}", self.playback_rate),
            format!("pan={}", self.pan),
            format!("reverb={}", self.reverb),
            format!("reverb_amount={}", self.reverb_amount),
            format!("wet_mix={}", self.wet_mix),
            format!("isolation={}", self.isolation),
            format!("intensity={}", self.intensity),
            format!("bass_boost={}", self.bass_boost),
            format!("block_size={}", self.block_size),
        ];

        lines.join("\n")
    }
}

/// Overwrite `target` with the parsed value, keeping the default on failure
fn parse_into<T: FromStr>(key: &str, value: &str, target: &mut T) {
    match value.parse() {
        Ok(parsed) => *target = parsed,
        Err(_) => warn!(key, value, "Malformed config value, keeping default"),
    }
}
