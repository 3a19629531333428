//! Core configuration structures and loading logic

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Error type for configuration operations
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file
    Io(std::io::Error),
    /// TOML parsing error
    Parse(toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "Failed to read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "Failed to parse config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

/// Drive-related configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriveConfig {
    /// Device path of the optical drive
    #[serde(default = "default_device")]
    pub device: PathBuf,
    /// Seconds to sleep between drive poll cycles
    #[serde(default = "default_drive_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Leave the disc in the tray after ripping
    #[serde(default)]
    pub skip_eject: bool,
}

fn default_device() -> PathBuf {
    PathBuf::from("/dev/sr0")
}

fn default_drive_poll_interval_secs() -> u64 {
    2
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            poll_interval_secs: default_drive_poll_interval_secs(),
            skip_eject: false,
        }
    }
}

/// Filesystem roots shared by the ripper and the transcode watcher
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathsConfig {
    /// Work-in-progress tree (rip staging)
    #[serde(default = "default_wip_root")]
    pub wip_root: PathBuf,
    /// Finished DVD output root
    #[serde(default = "default_dvd_output_root")]
    pub dvd_output_root: PathBuf,
    /// Finished audio (redbook) output root
    #[serde(default = "default_redbook_output_root")]
    pub redbook_output_root: PathBuf,
    /// Finished data-disc image output root
    #[serde(default = "default_iso_output_root")]
    pub iso_output_root: PathBuf,
    /// Root under which drives are mounted for classification
    #[serde(default = "default_mount_root")]
    pub mount_root: PathBuf,
}

fn default_wip_root() -> PathBuf {
    PathBuf::from("./wip")
}

fn default_dvd_output_root() -> PathBuf {
    PathBuf::from("./dvd")
}

fn default_redbook_output_root() -> PathBuf {
    PathBuf::from("./redbook")
}

fn default_iso_output_root() -> PathBuf {
    PathBuf::from("./iso")
}

fn default_mount_root() -> PathBuf {
    PathBuf::from("./mnt")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            wip_root: default_wip_root(),
            dvd_output_root: default_dvd_output_root(),
            redbook_output_root: default_redbook_output_root(),
            iso_output_root: default_iso_output_root(),
            mount_root: default_mount_root(),
        }
    }
}

/// Ripping-tool configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RipperConfig {
    /// Refresh the ripping tool's access key before each DVD rip
    #[serde(default)]
    pub update_key: bool,
    /// Settings file the key updater writes into
    #[serde(default = "default_key_settings_path")]
    pub key_settings_path: PathBuf,
}

fn default_key_settings_path() -> PathBuf {
    PathBuf::from("~/.MakeMKV/settings.conf")
}

impl Default for RipperConfig {
    fn default() -> Self {
        Self {
            update_key: false,
            key_settings_path: default_key_settings_path(),
        }
    }
}

/// Transcode-watcher configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscodeConfig {
    /// Seconds to sleep between watcher scan cycles
    #[serde(default = "default_transcode_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Seconds between the two size samples of the write-stability check
    #[serde(default = "default_settle_secs")]
    pub settle_secs: u64,
    /// Files smaller than this are not yet meaningful rip output
    #[serde(default = "default_min_file_bytes")]
    pub min_file_bytes: u64,
    /// Encoding arguments placed between the ffmpeg input and output paths
    #[serde(default = "default_ffmpeg_args")]
    pub ffmpeg_args: Vec<String>,
}

fn default_transcode_poll_interval_secs() -> u64 {
    60
}

fn default_settle_secs() -> u64 {
    30
}

fn default_min_file_bytes() -> u64 {
    1024 * 1024
}

fn default_ffmpeg_args() -> Vec<String> {
    ["-map", "0", "-c:v", "libx264", "-crf", "20", "-c:a", "copy", "-c:s", "copy"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_transcode_poll_interval_secs(),
            settle_secs: default_settle_secs(),
            min_file_bytes: default_min_file_bytes(),
            ffmpeg_args: default_ffmpeg_args(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub drive: DriveConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub ripper: RipperConfig,
    #[serde(default)]
    pub transcode: TranscodeConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Parses the config.toml file and handles missing optional fields with defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration
    ///
    /// Overrides the following values if environment variables are set:
    /// - SPINDLE_DRIVE -> drive.device
    /// - SPINDLE_POLL_INTERVAL_SECS -> drive.poll_interval_secs
    /// - SPINDLE_SKIP_EJECT -> drive.skip_eject
    /// - SPINDLE_WIP_ROOT -> paths.wip_root
    /// - SPINDLE_SETTLE_SECS -> transcode.settle_secs
    /// - SPINDLE_UPDATE_KEY -> ripper.update_key
    pub fn apply_env_overrides(&mut self) {
        // SPINDLE_DRIVE
        if let Ok(val) = env::var("SPINDLE_DRIVE") {
            if !val.is_empty() {
                self.drive.device = PathBuf::from(val);
            }
        }

        // SPINDLE_POLL_INTERVAL_SECS
        if let Ok(val) = env::var("SPINDLE_POLL_INTERVAL_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                self.drive.poll_interval_secs = secs;
            }
        }

        // SPINDLE_SKIP_EJECT
        if let Ok(val) = env::var("SPINDLE_SKIP_EJECT") {
            // Accept "true", "1", "yes" as true; "false", "0", "no" as false
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" => self.drive.skip_eject = true,
                "false" | "0" | "no" => self.drive.skip_eject = false,
                _ => {} // Invalid value, keep existing
            }
        }

        // SPINDLE_WIP_ROOT
        if let Ok(val) = env::var("SPINDLE_WIP_ROOT") {
            if !val.is_empty() {
                self.paths.wip_root = PathBuf::from(val);
            }
        }

        // SPINDLE_SETTLE_SECS
        if let Ok(val) = env::var("SPINDLE_SETTLE_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                self.transcode.settle_secs = secs;
            }
        }

        // SPINDLE_UPDATE_KEY
        if let Ok(val) = env::var("SPINDLE_UPDATE_KEY") {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" => self.ripper.update_key = true,
                "false" | "0" | "no" => self.ripper.update_key = false,
                _ => {}
            }
        }
    }

    /// Load configuration from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }
}
