//! # lastlog-store
//!
//! Per-user "last successful login" records kept in an embedded,
//! transactional database file:
//! - Usernames of any length as keys
//! - 64-bit timestamps (safe past 2038)
//! - Atomic write / read / remove / rename, one transaction each
//! - Safe concurrent use of one file by many login processes
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │        Callers (login hooks, lastlog tools, importers)      │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  Store / path functions                     │
//! │         (open per operation, one transaction each)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ StoreHandle │          │   Record    │
//!   │ (SQLite tx) │◄─────────│   Codec     │
//!   └──────┬──────┘          └─────────────┘
//!          │
//!          ▼
//!   ┌─────────────┐
//!   │  DB file    │
//!   └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use lastlog_store::{LastLogin, Store};
//!
//! # fn main() -> lastlog_store::Result<()> {
//! let store = Store::at("/var/lib/lastlog/lastlog2.db")?;
//! store.write("alice", &LastLogin::new(1_700_000_000, "pts/0", Some("10.0.0.7")))?;
//! let last = store.read("alice")?;
//! assert_eq!(last.tty, "pts/0");
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod record;
pub mod store;
pub mod legacy;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ErrorKind, LastlogError, Result};
pub use config::{Config, SyncMode};
pub use record::{LastLogin, LoginRecord};
pub use store::{OpenMode, Store, StoreHandle};
pub use legacy::ImportSummary;

use std::error::Error;
use std::path::Path;

// =============================================================================
// Path-based Operations
// =============================================================================

/// Insert or replace the entry for `username` in the database at `path`
pub fn write_entry(
    path: impl AsRef<Path>,
    username: &str,
    timestamp: i64,
    tty: &str,
    rhost: Option<&str>,
) -> Result<()> {
    Store::at(path)?.write(username, &LastLogin::new(timestamp, tty, rhost))
}

/// Read the entry for `username` from the database at `path`
pub fn read_entry(path: impl AsRef<Path>, username: &str) -> Result<LastLogin> {
    Store::at(path)?.read(username)
}

/// Delete the entry for `username` from the database at `path`
pub fn remove_entry(path: impl AsRef<Path>, username: &str) -> Result<()> {
    Store::at(path)?.remove(username)
}

/// Move the entry of `from` to `to` in the database at `path`
pub fn rename_entry(path: impl AsRef<Path>, from: &str, to: &str) -> Result<()> {
    Store::at(path)?.rename(from, to)
}

/// Visit every entry in the database at `path`
pub fn for_each_entry<F, E>(path: impl AsRef<Path>, visitor: F) -> Result<()>
where
    F: FnMut(LoginRecord) -> std::result::Result<(), E>,
    E: Into<Box<dyn Error + Send + Sync>>,
{
    Store::at(path)?.for_each(visitor)
}

// =============================================================================
// Version Info
// =============================================================================

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
