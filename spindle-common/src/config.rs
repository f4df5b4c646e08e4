//! Configuration loading and config file resolution
//!
//! The configuration is a plain value owned by the application context.
//! Nothing here is global: front ends load a `SpindleConfig` once at startup
//! and hand it to the components that need it.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "SPINDLE_CONFIG";

/// Output sample rate requested from the device
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Number of buffers cycling between the engine and the output device
pub const DEFAULT_BUFFER_COUNT: usize = 3;

/// Capacity of each queue buffer in stereo frames
pub const DEFAULT_QUEUE_FRAMES: usize = 50_000;

/// Initial playback volume (0.0-1.0)
pub const DEFAULT_VOLUME: f32 = 0.75;

/// Events buffered per subscriber before the slowest one starts lagging
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Player configuration
///
/// Every field has a built-in default, so a partial TOML file (or none at
/// all) is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpindleConfig {
    /// Initial volume, clamped to 0.0-1.0 on validation
    pub volume: f32,

    /// Requested output sample rate in Hz
    pub sample_rate: u32,

    /// Buffers in the output queue ring
    pub buffer_count: usize,

    /// Frames per queue buffer
    pub queue_frames: usize,

    /// Play the playlist in shuffled order
    pub shuffle: bool,

    /// Replay the current module when it finishes instead of advancing
    pub repeat: bool,

    /// Add successfully opened modules to the playlist
    pub auto_add_modules: bool,

    /// Copy opened modules into `music_folder`
    pub manage_modules: bool,

    /// Managed module folder (None = platform default)
    pub music_folder: Option<PathBuf>,

    /// Event bus channel capacity
    pub event_capacity: usize,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// tracing filter directive used when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "spindle_ap=info,spindle_common=info".to_string(),
        }
    }
}

impl Default for SpindleConfig {
    fn default() -> Self {
        Self {
            volume: DEFAULT_VOLUME,
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_count: DEFAULT_BUFFER_COUNT,
            queue_frames: DEFAULT_QUEUE_FRAMES,
            shuffle: false,
            repeat: false,
            auto_add_modules: true,
            manage_modules: false,
            music_folder: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            logging: LoggingConfig::default(),
        }
    }
}

/// Where the active configuration came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// `--config` argument
    CommandLine,
    /// `SPINDLE_CONFIG` environment variable
    Environment,
    /// Platform config directory
    DefaultLocation,
    /// No file found, built-in defaults
    BuiltIn,
}

impl SpindleConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SpindleConfig = toml::from_str(content)?;
        config.validate()
    }

    /// Load and validate a config file
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load configuration following the resolution priority:
    /// 1. Command-line argument (highest priority)
    /// 2. `SPINDLE_CONFIG` environment variable
    /// 3. `<config_dir>/spindle/config.toml`
    /// 4. Built-in defaults
    ///
    /// An explicitly named file (1 or 2) must exist. The default location is
    /// optional; a malformed file is always an error.
    pub fn load(cli_arg: Option<&Path>) -> Result<(Self, ConfigSource)> {
        if let Some(path) = cli_arg {
            info!("Loading config from command line: {}", path.display());
            return Ok((Self::load_file(path)?, ConfigSource::CommandLine));
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(path);
            info!("Loading config from {}: {}", CONFIG_ENV_VAR, path.display());
            return Ok((Self::load_file(&path)?, ConfigSource::Environment));
        }

        if let Some(path) = default_config_path() {
            if path.exists() {
                info!("Loading config from {}", path.display());
                return Ok((Self::load_file(&path)?, ConfigSource::DefaultLocation));
            }
            debug!("No config file at {}, using defaults", path.display());
        }

        Ok((Self::default(), ConfigSource::BuiltIn))
    }

    /// Check structural limits and clamp the volume into range
    pub fn validate(mut self) -> Result<Self> {
        if self.buffer_count == 0 {
            return Err(Error::Config("buffer_count must be at least 1".to_string()));
        }
        if self.queue_frames == 0 {
            return Err(Error::Config("queue_frames must be at least 1".to_string()));
        }
        if self.sample_rate == 0 {
            return Err(Error::Config("sample_rate must be non-zero".to_string()));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.volume) {
            warn!("Volume {} out of range, clamping", self.volume);
            self.volume = if self.volume.is_nan() { DEFAULT_VOLUME } else { self.volume.clamp(0.0, 1.0) };
        }
        Ok(self)
    }

    /// Managed module folder, falling back to a platform default
    pub fn music_folder(&self) -> PathBuf {
        self.music_folder.clone().unwrap_or_else(default_music_folder)
    }
}

/// Platform config file location (`~/.config/spindle/config.toml` on Linux)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("spindle").join("config.toml"))
}

/// OS-dependent default managed module folder
fn default_music_folder() -> PathBuf {
    dirs::audio_dir()
        .map(|d| d.join("Spindle"))
        .or_else(|| dirs::data_local_dir().map(|d| d.join("spindle").join("modules")))
        .unwrap_or_else(|| PathBuf::from("./spindle_modules"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SpindleConfig::default();
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.buffer_count, 3);
        assert_eq!(config.queue_frames, 50_000);
        assert!(config.auto_add_modules);
        assert!(!config.manage_modules);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SpindleConfig::from_toml_str("volume = 0.5\nrepeat = true\n").unwrap();
        assert_eq!(config.volume, 0.5);
        assert!(config.repeat);
        assert_eq!(config.buffer_count, DEFAULT_BUFFER_COUNT);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_validate_rejects_zero_buffers() {
        let result = SpindleConfig::from_toml_str("buffer_count = 0");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_clamps_volume() {
        let config = SpindleConfig::from_toml_str("volume = 1.5").unwrap();
        assert_eq!(config.volume, 1.0);

        let config = SpindleConfig::from_toml_str("volume = -0.2").unwrap();
        assert_eq!(config.volume, 0.0);
    }

    #[test]
    fn test_malformed_toml() {
        let result = SpindleConfig::from_toml_str("volume = [");
        assert!(matches!(result, Err(Error::TomlParse(_))));
    }

    #[test]
    fn test_music_folder_override() {
        let config = SpindleConfig {
            music_folder: Some(PathBuf::from("/tmp/mods")),
            ..Default::default()
        };
        assert_eq!(config.music_folder(), PathBuf::from("/tmp/mods"));
    }
}
