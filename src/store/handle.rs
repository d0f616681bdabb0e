//! Store Handle
//!
//! Owns one connection to the database file and its schema lifecycle.
//!
//! ## Responsibilities
//! - Open the file in the mode the operation needs (creating it for writes)
//! - Establish the schema and format marker exactly once
//! - Reject files that are not a lastlog store
//! - Release the connection (and any lock) on drop or explicit close

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, ErrorCode, OpenFlags, TransactionBehavior};

use crate::config::Config;
use crate::error::{LastlogError, Result};

/// `PRAGMA application_id` identifying a lastlog store ("LL22")
pub const APPLICATION_ID: i32 = 0x4C4C_3232;

/// Schema version written into `PRAGMA user_version`
pub const SCHEMA_VERSION: i32 = 1;

const CREATE_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS records (
    username TEXT PRIMARY KEY NOT NULL,
    payload  BLOB NOT NULL
) WITHOUT ROWID;";

/// How a handle may touch the database file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Reads and scans; the file must exist
    ReadOnly,

    /// Updates to existing entries; the file must exist
    ReadWrite,

    /// Writes; the file is created if missing
    Create,
}

/// What an open found in the file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchemaState {
    /// Marker and table present
    Ready,

    /// Valid but blank database (never initialised)
    Blank,
}

/// An open connection to one lastlog database
///
/// The handle is `Send` but not `Sync`: move it between threads freely, but
/// share it only behind external synchronization. Concurrent access from
/// other processes is coordinated by the engine's file locks.
pub struct StoreHandle {
    conn: Connection,
    path: PathBuf,
    mode: OpenMode,
    schema: SchemaState,
}

impl StoreHandle {
    /// Open the database at `config.path`
    ///
    /// On open:
    /// 1. Create the file with `config.file_mode` (Create mode only)
    /// 2. Connect and apply busy timeout / durability pragmas
    /// 3. Verify the format marker, initialising a blank database if allowed
    pub fn open(config: &Config, mode: OpenMode) -> Result<Self> {
        config.validate()?;
        let path = config.path.clone();

        if mode == OpenMode::Create {
            precreate_file(&path, config.file_mode)
                .map_err(|e| LastlogError::open(&path, e))?;
        }

        let conn = Connection::open_with_flags(&path, open_flags(mode))
            .map_err(|e| open_error(&path, e))?;

        conn.busy_timeout(config.busy_timeout())
            .map_err(|e| open_error(&path, e))?;
        if mode != OpenMode::ReadOnly {
            conn.pragma_update(None, "synchronous", config.synchronous.pragma_value())
                .map_err(|e| open_error(&path, e))?;
        }

        let mut handle = Self {
            conn,
            path,
            mode,
            schema: SchemaState::Blank,
        };
        handle.schema = handle.prepare_schema()?;

        tracing::debug!(
            path = %handle.path.display(),
            mode = ?mode,
            "opened lastlog database"
        );

        Ok(handle)
    }

    /// Open with default settings for `path`
    pub fn open_path(path: &Path, mode: OpenMode) -> Result<Self> {
        Self::open(&Config::for_path(path), mode)
    }

    /// Close the connection, reporting any failure to release it
    pub fn close(self) -> Result<()> {
        let path = self.path;
        self.conn.close().map_err(|(_, e)| LastlogError::from(e))?;
        tracing::debug!(path = %path.display(), "closed lastlog database");
        Ok(())
    }

    // =========================================================================
    // Schema
    // =========================================================================

    /// Check the format marker; create the schema on a blank database unless
    /// the handle is read-only
    fn prepare_schema(&mut self) -> Result<SchemaState> {
        let state = self.inspect_schema()?;
        if state == SchemaState::Ready || self.mode == OpenMode::ReadOnly {
            return Ok(state);
        }

        // Another process may be initialising the same file; the immediate
        // transaction serializes us behind it and we re-check inside.
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| open_error(&self.path, e))?;

        if inspect(&tx, &self.path)? == SchemaState::Blank {
            tx.execute_batch(CREATE_SCHEMA)
                .map_err(|e| open_error(&self.path, e))?;
            tx.pragma_update(None, "application_id", APPLICATION_ID)
                .map_err(|e| open_error(&self.path, e))?;
            tx.pragma_update(None, "user_version", SCHEMA_VERSION)
                .map_err(|e| open_error(&self.path, e))?;
            tracing::debug!(path = %self.path.display(), "initialised lastlog schema");
        }

        tx.commit().map_err(|e| open_error(&self.path, e))?;
        Ok(SchemaState::Ready)
    }

    fn inspect_schema(&self) -> Result<SchemaState> {
        inspect(&self.conn, &self.path)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mode the handle was opened in
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    /// True when the file holds no schema yet (read-only handles only)
    pub(crate) fn is_blank(&self) -> bool {
        self.schema == SchemaState::Blank
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

impl std::fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreHandle")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .finish()
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn open_flags(mode: OpenMode) -> OpenFlags {
    let base = OpenFlags::SQLITE_OPEN_NO_MUTEX;
    match mode {
        OpenMode::ReadOnly => base | OpenFlags::SQLITE_OPEN_READ_ONLY,
        OpenMode::ReadWrite => base | OpenFlags::SQLITE_OPEN_READ_WRITE,
        OpenMode::Create => {
            base | OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
        }
    }
}

/// Classify the file: ready, blank, or not ours
fn inspect(conn: &Connection, path: &Path) -> Result<SchemaState> {
    let app_id: i32 = conn
        .pragma_query_value(None, "application_id", |row| row.get(0))
        .map_err(|e| open_error(path, e))?;
    let version: i32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .map_err(|e| open_error(path, e))?;

    if app_id == APPLICATION_ID {
        if version < 1 || version > SCHEMA_VERSION {
            return Err(LastlogError::open(
                path,
                format!("unsupported schema version {}", version),
            ));
        }
        return Ok(SchemaState::Ready);
    }

    if app_id != 0 {
        return Err(LastlogError::open(
            path,
            format!("foreign application id 0x{:08x}", app_id),
        ));
    }

    let objects: i64 = conn
        .query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get(0))
        .map_err(|e| open_error(path, e))?;
    if objects > 0 {
        return Err(LastlogError::open(path, "not a lastlog database"));
    }

    Ok(SchemaState::Blank)
}

/// Create the file with restrictive permissions before the engine sees it.
/// An existing file is left untouched.
fn precreate_file(path: &Path, mode: u32) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create_new(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    match options.open(path) {
        Ok(_) => {
            tracing::debug!(path = %path.display(), "created lastlog database file");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

/// Errors while establishing a connection are open failures, except lock
/// contention which stays a storage failure
fn open_error(path: &Path, err: rusqlite::Error) -> LastlogError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
            LastlogError::from(err)
        }
        Some(ErrorCode::NotADatabase) => LastlogError::open(path, "file is not a database"),
        _ => LastlogError::open(path, err),
    }
}
