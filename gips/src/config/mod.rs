//! Engine configuration from `~/.gips/config.ini`.
//!
//! ```ini
//! [repository]
//! root = ~/gips/repository
//!
//! [processing]
//! workers = 8
//! timeout_secs = 3600
//!
//! [project]
//! root = ~/gips/projects
//! interpolation = bilinear
//! tile_priority = ranked
//! tile_ranking = 023035, 023034
//!
//! [logging]
//! directory = logs
//! file = gips.log
//! ```
//!
//! Every key is optional; a missing file yields [`EngineConfig::default`].

mod parser;

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::project::TilePriority;
use crate::raster::Interpolation;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but is not valid INI.
    #[error("failed to read config file: {0}")]
    Read(#[from] ini::Error),

    /// A key holds a value outside its domain.
    #[error("invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// Default log directory, relative to the working directory.
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "gips.log";

/// Where data sources store their files.
#[derive(Debug, Clone, PartialEq)]
pub struct RepositorySettings {
    pub root: PathBuf,
}

/// Processing pool settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingSettings {
    pub workers: usize,
    /// Deadline after which no new generation task starts.
    pub timeout: Option<Duration>,
}

/// Project assembly defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSettings {
    pub root: PathBuf,
    pub interpolation: Interpolation,
    pub tile_priority: TilePriority,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub repository: RepositorySettings,
    pub processing: ProcessingSettings,
    pub project: ProjectSettings,
    pub logging: LoggingSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            repository: RepositorySettings {
                root: config_directory().join("repository"),
            },
            processing: ProcessingSettings {
                workers: default_workers(),
                timeout: None,
            },
            project: ProjectSettings {
                root: config_directory().join("projects"),
                interpolation: Interpolation::default(),
                tile_priority: TilePriority::default(),
            },
            logging: LoggingSettings {
                directory: PathBuf::from(DEFAULT_LOG_DIR),
                file: DEFAULT_LOG_FILE.to_string(),
            },
        }
    }
}

impl EngineConfig {
    /// Load from the default path (`~/.gips/config.ini`).
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&config_file_path())
    }

    /// Load from a specific path; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path)?;
        parser::parse_ini(&ini)
    }

    /// Parse INI text.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Read(ini::Error::Parse(e)))?;
        parser::parse_ini(&ini)
    }
}

/// Number of workers when none is configured: one per available core.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// The configuration directory (`~/.gips`).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".gips")
}

/// The configuration file (`~/.gips/config.ini`).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
