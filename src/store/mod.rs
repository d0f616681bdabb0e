//! Store Module
//!
//! The record store: one embedded database file, one entry per username.
//!
//! ## Responsibilities
//! - Own the connection lifecycle ([`StoreHandle`])
//! - Run each record operation as one atomic transaction
//! - Scan all entries under a single read transaction
//!
//! ## Concurrency Model
//! No state is shared in-process. Every [`Store`] call opens its own handle,
//! runs one transaction and closes it again, so all coordination between
//! login processes happens through the engine's file locks. Lock waits are
//! bounded by `Config::busy_timeout_ms` and surface as storage errors.
//!
//! ## Layout
//! ```text
//! records
//! ┌──────────────────────┬──────────────────────────────┐
//! │ username (TEXT, key) │ payload (BLOB, see codec)    │
//! └──────────────────────┴──────────────────────────────┘
//! ```

mod handle;
mod ops;
mod scan;

pub use handle::{OpenMode, StoreHandle, APPLICATION_ID, SCHEMA_VERSION};

use std::error::Error;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::Config;
use crate::error::{LastlogError, Result};
use crate::record::{self, LastLogin, LoginRecord};

/// Path-bound entry point: every method is a self-contained operation
#[derive(Debug, Clone)]
pub struct Store {
    config: Config,
}

impl Store {
    /// Create a store for the given config
    ///
    /// Nothing is opened here; the file is created by the first write.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Store with default settings at `path`
    pub fn at(path: impl AsRef<Path>) -> Result<Self> {
        Self::new(Config::for_path(path.as_ref()))
    }

    /// Open a handle for callers doing several operations in a row
    pub fn open(&self, mode: OpenMode) -> Result<StoreHandle> {
        StoreHandle::open(&self.config, mode)
    }

    /// Run `op` on a fresh handle and close it on success.
    /// On failure the handle is dropped, which releases it as well.
    ///
    /// `op` has committed by the time the handle is closed, so a failing
    /// close does not undo it: the failure is logged and `op`'s result is
    /// returned. The dropped connection is released by the engine.
    fn with_handle<T>(
        &self,
        mode: OpenMode,
        op: impl FnOnce(&mut StoreHandle) -> Result<T>,
    ) -> Result<T> {
        let mut handle = self.open(mode)?;
        let value = op(&mut handle)?;
        if let Err(e) = handle.close() {
            tracing::warn!(
                path = %self.config.path.display(),
                error = %e,
                "closing lastlog database failed after commit"
            );
        }
        Ok(value)
    }

    /// Like `with_handle` for operations that never create the file.
    /// A file that does not exist yet holds no entries, so `empty` answers
    /// for it and the file stays uncreated.
    fn with_existing<T>(
        &self,
        mode: OpenMode,
        empty: impl FnOnce() -> Result<T>,
        op: impl FnOnce(&mut StoreHandle) -> Result<T>,
    ) -> Result<T> {
        let exists = self
            .config
            .path
            .try_exists()
            .map_err(|e| LastlogError::open(&self.config.path, e))?;
        if !exists {
            tracing::trace!(path = %self.config.path.display(), "database not created yet");
            return empty();
        }
        self.with_handle(mode, op)
    }

    // =========================================================================
    // Record Operations
    // =========================================================================

    /// Insert or replace the entry for `username`, creating the file if needed
    ///
    /// Inputs are validated before the file is touched. The entry is committed
    /// before the handle is closed; a failing close is logged, not returned.
    pub fn write(&self, username: &str, login: &LastLogin) -> Result<()> {
        ops::check_username(username)?;
        let payload = record::encode(login)?;
        self.with_handle(OpenMode::Create, |h| h.write_payload(username, &payload))?;

        tracing::trace!(username, timestamp = login.timestamp, "wrote entry");
        Ok(())
    }

    /// Record a login happening now
    pub fn record_login(&self, username: &str, tty: &str, rhost: Option<&str>) -> Result<()> {
        self.write(username, &LastLogin::new(now_secs()?, tty, rhost))
    }

    /// Look up the entry for `username`
    ///
    /// A database that was never created has no entries: `NotFound`.
    pub fn read(&self, username: &str) -> Result<LastLogin> {
        self.with_existing(
            OpenMode::ReadOnly,
            || Err(LastlogError::NotFound(username.to_string())),
            |h| h.read(username),
        )
    }

    /// Delete the entry for `username`
    pub fn remove(&self, username: &str) -> Result<()> {
        self.with_existing(
            OpenMode::ReadWrite,
            || Err(LastlogError::NotFound(username.to_string())),
            |h| h.remove(username),
        )
    }

    /// Move the entry of `from` to `to`; refused if `to` has an entry
    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        ops::check_username(to)?;
        self.with_existing(
            OpenMode::ReadWrite,
            || Err(LastlogError::NotFound(from.to_string())),
            |h| h.rename(from, to),
        )
    }

    // =========================================================================
    // Iteration
    // =========================================================================

    /// Visit every entry; see [`StoreHandle::for_each`]
    pub fn for_each<F, E>(&self, visitor: F) -> Result<()>
    where
        F: FnMut(LoginRecord) -> std::result::Result<(), E>,
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        self.with_existing(OpenMode::ReadOnly, || Ok(()), |h| h.for_each(visitor))
    }

    /// Collect every entry
    pub fn records(&self) -> Result<Vec<LoginRecord>> {
        self.with_existing(OpenMode::ReadOnly, || Ok(Vec::new()), |h| h.records())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.config.path
    }
}

pub(crate) fn now_secs() -> Result<i64> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| LastlogError::Encode(format!("system clock before epoch: {}", e)))?;
    i64::try_from(elapsed.as_secs())
        .map_err(|_| LastlogError::Encode("system clock out of range".to_string()))
}
