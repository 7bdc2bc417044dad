use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::MetaError;

/// Verbosity of the engine's diagnostic output.
///
/// The level is process-wide: it is stored in the `log` crate's global
/// max-level filter, which is an atomic read by every logging call. Set it
/// once before opening images (see [`Config::init`]); changing it later is
/// allowed and becomes visible to all threads, but only ever affects what
/// gets logged, never how metadata is read or written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    #[default]
    Warn,
    Error,
    Mute,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Mute => log::LevelFilter::Off,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Mute => "mute",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric levels: 0 debug, 1 info, 2 warn, 3 error, 4 mute.
impl TryFrom<u8> for LogLevel {
    type Error = MetaError;

    fn try_from(level: u8) -> std::result::Result<Self, MetaError> {
        match level {
            0 => Ok(LogLevel::Debug),
            1 => Ok(LogLevel::Info),
            2 => Ok(LogLevel::Warn),
            3 => Ok(LogLevel::Error),
            4 => Ok(LogLevel::Mute),
            other => Err(MetaError::invalid_value("log level", other.to_string())),
        }
    }
}

impl FromStr for LogLevel {
    type Err = MetaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "mute" | "off" => Ok(LogLevel::Mute),
            _ => Err(MetaError::invalid_value("log level", s)),
        }
    }
}

/// Set the process-wide diagnostic level.
pub fn set_log_level(level: LogLevel) {
    log::set_max_level(level.to_level_filter());
}

/// Engine configuration.
///
/// # Loading
///
/// ```rust,no_run
/// use imgmeta::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("imgmeta.json".as_ref())).unwrap();
/// config.init();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.backup_originals = true;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Diagnostic verbosity applied by [`Config::init`].
    pub log_level: LogLevel,
    /// If `true`, copy a path-backed image to `<name>.<ext>.bak` before its
    /// first in-place rewrite.
    pub backup_originals: bool,
    /// Bytes of whitespace padding written inside serialized XMP packets.
    pub xmp_padding: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Warn,
            backup_originals: false,
            xmp_padding: 2048,
        }
    }
}

impl Config {
    /// Resolve the config file path, next to the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("imgmeta.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Apply the process-wide settings carried by this config.
    pub fn init(&self) {
        set_log_level(self.log_level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // ── LogLevel ─────────────────────────────────────────────────────

    #[test]
    fn numeric_levels() {
        assert_eq!(LogLevel::try_from(0).unwrap(), LogLevel::Debug);
        assert_eq!(LogLevel::try_from(2).unwrap(), LogLevel::Warn);
        assert_eq!(LogLevel::try_from(4).unwrap(), LogLevel::Mute);
        assert!(LogLevel::try_from(5).is_err());
    }

    #[test]
    fn mute_turns_logging_off() {
        assert_eq!(LogLevel::Mute.to_level_filter(), log::LevelFilter::Off);
        assert_eq!(LogLevel::Info.to_level_filter(), log::LevelFilter::Info);
    }

    #[test]
    fn parse_level_names() {
        assert_eq!("DEBUG".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("off".parse::<LogLevel>().unwrap(), LogLevel::Mute);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    // ── Config ───────────────────────────────────────────────────────

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(Some(&dir.path().join("nope.json"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("imgmeta.json");

        let config = Config {
            log_level: LogLevel::Debug,
            backup_originals: true,
            xmp_padding: 0,
        };
        config.save(Some(&path)).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"debug\""));

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("partial.json");
        std::fs::write(&path, r#"{"log_level": "error"}"#).unwrap();

        let loaded = Config::load(Some(&path)).unwrap();
        assert_eq!(loaded.log_level, LogLevel::Error);
        assert_eq!(loaded.xmp_padding, 2048);
    }

    #[test]
    fn invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }
}
