//! Simple configuration persistence for retempo
//!
//! Stores default transform settings and the last output folder.

use retempo_audio::StretchSettings;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

/// Application configuration. `None` means "not set, use the engine default".
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Config {
    pub tempo: Option<f64>,
    pub pitch: Option<f64>,
    pub rate: Option<f64>,
    pub sequence_ms: Option<u32>,
    pub seek_window_ms: Option<u32>,
    pub overlap_ms: Option<u32>,
    pub quick_seek: Option<bool>,
    pub anti_alias: Option<bool>,
    /// Folder the last output file was written to
    pub last_output_dir: Option<PathBuf>,
}

impl Config {
    /// Load config from the default location
    ///
    /// Returns default config if file doesn't exist or can't be parsed.
    pub fn load() -> Self {
        let path = Self::config_path();
        Self::load_from(&path).unwrap_or_default()
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Save config to the default location
    pub fn save(&self) -> io::Result<()> {
        let path = Self::config_path();
        self.save_to(&path)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = self.serialize();
        fs::write(path, content)
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("retempo")
            .join("config.txt")
    }

    /// Time-stretch settings with unset keys left at their defaults
    pub fn stretch_settings(&self) -> StretchSettings {
        let defaults = StretchSettings::default();
        StretchSettings {
            sequence_ms: self.sequence_ms.or(defaults.sequence_ms),
            seek_window_ms: self.seek_window_ms.or(defaults.seek_window_ms),
            overlap_ms: self.overlap_ms.unwrap_or(defaults.overlap_ms),
            quick_seek: self.quick_seek.unwrap_or(defaults.quick_seek),
        }
    }

    /// Parse config from simple key=value format
    fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim();

                match key {
                    "tempo" => config.tempo = parse_value(key, value),
                    "pitch" => config.pitch = parse_value(key, value),
                    "rate" => config.rate = parse_value(key, value),
                    "sequence_ms" => config.sequence_ms = parse_value(key, value),
                    "seek_window_ms" => config.seek_window_ms = parse_value(key, value),
                    "overlap_ms" => config.overlap_ms = parse_value(key, value),
                    "quick_seek" => config.quick_seek = parse_value(key, value),
                    "anti_alias" => config.anti_alias = parse_value(key, value),
                    "last_output_dir" => {
                        if !value.is_empty() {
                            config.last_output_dir = Some(PathBuf::from(value));
                        }
                    }
                    _ => {} // Ignore unknown keys
                }
            }
        }

        config
    }

    /// Serialize config to simple key=value format
    fn serialize(&self) -> String {
        let mut lines = Vec::new();
        lines.push("# retempo configuration".to_string());

        push_value(&mut lines, "tempo", self.tempo);
        push_value(&mut lines, "pitch", self.pitch);
        push_value(&mut lines, "rate", self.rate);
        push_value(&mut lines, "sequence_ms", self.sequence_ms);
        push_value(&mut lines, "seek_window_ms", self.seek_window_ms);
        push_value(&mut lines, "overlap_ms", self.overlap_ms);
        push_value(&mut lines, "quick_seek", self.quick_seek);
        push_value(&mut lines, "anti_alias", self.anti_alias);

        if let Some(ref folder) = self.last_output_dir {
            lines.push(format!("last_output_dir={}", folder.display()));
        }

        lines.join("\n")
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Option<T> {
    match value.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring config key {} with unreadable value {:?}", key, value);
            None
        }
    }
}

fn push_value<T: std::fmt::Display>(lines: &mut Vec<String>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        lines.push(format!("{}={}", key, value));
    }
}
