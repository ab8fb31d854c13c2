//! # Config - Recorder Settings
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. built-in defaults,
//! 2. an optional TOML file named by `MDREC_CONFIG`,
//! 3. individual `MDREC_*` environment variables.
//!
//! ```text
//! MDREC_CONFIG             TOML file with any of the keys below
//! MDREC_JOURNAL_DIR        journal_dir          (default: "data/journal")
//! MDREC_JOURNAL_CAPACITY   journal_capacity     (default: 67108864 = 64 MiB)
//! MDREC_JOURNAL_SCHEMA     journal_schema       (default: 1)
//! MDREC_TICKSTORE_DIR      tickstore_dir        (default: "data/ticks")
//! MDREC_TIMESTAMP_COLUMN   timestamp_column     (default: "time")
//! MDREC_SPLAY_EXTENSION    splay_extension      (default: "tick")
//! MDREC_COMPRESSION_LEVEL  compression_level    (default: 3)
//! ```
//!
//! A value that is present but cannot be parsed is an error; it never
//! falls back to the default.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Environment variable naming the optional TOML file.
pub const CONFIG_FILE_VAR: &str = "MDREC_CONFIG";

const DEFAULT_JOURNAL_CAPACITY: usize = 64 * 1024 * 1024;
const SCHEMA_VERSIONS: [u8; 2] = [1, 2];

/// Columns that journal ingestion writes next to the timestamp column.
pub const TICK_VALUE_COLUMNS: [&str; 5] = ["sequence", "trade_id", "side", "size", "price"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse TOML {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// An environment variable held something unparseable.
    #[error("{key}={value:?}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    /// The combined settings are inconsistent.
    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Base directory of the journal day files.
    pub journal_dir: PathBuf,
    /// Size of each day file in bytes, header included.
    pub journal_capacity: usize,
    /// Tick record layout version (1 = with timestamp, 2 = without).
    pub journal_schema: u8,
    /// Base directory of the tickstore (index side-file and splay tree).
    pub tickstore_dir: PathBuf,
    pub timestamp_column: String,
    pub splay_extension: String,
    /// zstd level for splay files.
    pub compression_level: i32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            journal_dir: PathBuf::from("data/journal"),
            journal_capacity: DEFAULT_JOURNAL_CAPACITY,
            journal_schema: 1,
            tickstore_dir: PathBuf::from("data/ticks"),
            timestamp_column: "time".to_string(),
            splay_extension: "tick".to_string(),
            compression_level: 3,
        }
    }
}

impl StoreConfig {
    /// Reads a TOML file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Builds the configuration from the process environment and validates it.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(CONFIG_FILE_VAR) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };

        if let Some(v) = lookup("MDREC_JOURNAL_DIR") {
            config.journal_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("MDREC_TICKSTORE_DIR") {
            config.tickstore_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("MDREC_TIMESTAMP_COLUMN") {
            config.timestamp_column = v;
        }
        if let Some(v) = lookup("MDREC_SPLAY_EXTENSION") {
            config.splay_extension = v;
        }
        parse_into(&lookup, "MDREC_JOURNAL_CAPACITY", &mut config.journal_capacity)?;
        parse_into(&lookup, "MDREC_JOURNAL_SCHEMA", &mut config.journal_schema)?;
        parse_into(&lookup, "MDREC_COMPRESSION_LEVEL", &mut config.compression_level)?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.journal_capacity <= 4 || self.journal_capacity > i32::MAX as usize {
            return Err(ConfigError::Invalid(format!(
                "journal_capacity must be in (4, {}], got {}",
                i32::MAX,
                self.journal_capacity
            )));
        }
        if !SCHEMA_VERSIONS.contains(&self.journal_schema) {
            return Err(ConfigError::Invalid(format!(
                "unknown journal_schema {}",
                self.journal_schema
            )));
        }
        if self.timestamp_column.trim().is_empty() {
            return Err(ConfigError::Invalid("timestamp_column is empty".into()));
        }
        if TICK_VALUE_COLUMNS.contains(&self.timestamp_column.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "timestamp_column {:?} collides with a tick column",
                self.timestamp_column
            )));
        }
        let ext = &self.splay_extension;
        if ext.is_empty() || ext.contains(['.', '/', '\\']) {
            return Err(ConfigError::Invalid(format!(
                "splay_extension {ext:?} must be a bare extension"
            )));
        }
        if !(1..=22).contains(&self.compression_level) {
            return Err(ConfigError::Invalid(format!(
                "compression_level must be in 1..=22, got {}",
                self.compression_level
            )));
        }
        Ok(())
    }
}

fn parse_into<F, T>(lookup: &F, key: &str, slot: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(value) = lookup(key) {
        *slot = value
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                value: value.clone(),
                reason: e.to_string(),
            })?;
    }
    Ok(())
}
