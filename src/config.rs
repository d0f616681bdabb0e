//! Configuration for the lastlog store
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LastlogError, Result};

/// Conventional system location of the database
pub const DEFAULT_DB_PATH: &str = "/var/lib/lastlog/lastlog2.db";

/// Main configuration for a lastlog store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Database file holding one entry per user
    pub path: PathBuf,

    /// Permission bits for a newly created database file (unix only)
    pub file_mode: u32,

    /// Commit durability level
    pub synchronous: SyncMode,

    // -------------------------------------------------------------------------
    // Locking Configuration
    // -------------------------------------------------------------------------
    /// How long a transaction waits on another process's lock (milliseconds)
    /// before failing with a storage error
    pub busy_timeout_ms: u64,
}

/// Commit durability level, mapped onto the engine's `synchronous` pragma
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Sync at critical moments only
    Normal,

    /// Sync on every commit (safest)
    Full,
}

impl SyncMode {
    pub(crate) fn pragma_value(self) -> &'static str {
        match self {
            SyncMode::Normal => "NORMAL",
            SyncMode::Full => "FULL",
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_PATH),
            file_mode: 0o640,
            synchronous: SyncMode::Full,
            busy_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Default config pointing at `path`
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Lock wait bound as a Duration
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    /// Check the config is usable
    pub fn validate(&self) -> Result<()> {
        if self.path.as_os_str().is_empty() {
            return Err(LastlogError::Config("database path is empty".to_string()));
        }
        if self.file_mode > 0o7777 {
            return Err(LastlogError::Config(format!(
                "file mode {:o} is not a permission mask",
                self.file_mode
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the database file path
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Set the permission bits used when creating the file
    pub fn file_mode(mut self, mode: u32) -> Self {
        self.config.file_mode = mode;
        self
    }

    /// Set the commit durability level
    pub fn synchronous(mut self, mode: SyncMode) -> Self {
        self.config.synchronous = mode;
        self
    }

    /// Set the lock wait bound (in milliseconds)
    pub fn busy_timeout_ms(mut self, ms: u64) -> Self {
        self.config.busy_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
