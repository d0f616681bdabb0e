//! Legacy Module
//!
//! Migration from the fixed-offset lastlog file this store replaces.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Slot for uid 0                          │
//! │ ┌──────────┬───────────┬─────────────┐  │
//! │ │ Time (4) │ Line (32) │ Host (256)  │  │
//! │ └──────────┴───────────┴─────────────┘  │
//! ├─────────────────────────────────────────┤
//! │ Slot for uid 1                          │
//! │ ...                                     │
//! └─────────────────────────────────────────┘
//! ```
//!
//! The old format keys by uid with fixed-width text fields; the store keys by
//! username, so an import needs a uid → username lookup.

mod reader;

pub use reader::LegacyReader;

use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::record::LastLogin;
use crate::store::{OpenMode, Store, StoreHandle};

/// Width of the terminal field
pub const LEGACY_LINE_SIZE: usize = 32;

/// Width of the host field
pub const LEGACY_HOST_SIZE: usize = 256;

/// Size of one slot
pub const LEGACY_RECORD_SIZE: usize = 4 + LEGACY_LINE_SIZE + LEGACY_HOST_SIZE;

/// One used slot of a legacy file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyEntry {
    pub uid: u32,
    pub timestamp: i64,
    pub line: String,
    pub host: Option<String>,
}

impl LegacyEntry {
    pub fn to_login(&self) -> LastLogin {
        LastLogin::new(self.timestamp, &self.line, self.host.as_deref())
    }
}

/// Outcome of an import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Entries written to the store
    pub imported: u64,

    /// Slots whose uid has no username
    pub skipped_unknown: u64,

    /// Slots older than (or as old as) what the store already has
    pub skipped_newer: u64,
}

impl Store {
    /// Import a legacy lastlog file
    ///
    /// `resolve` maps a uid to its username. A slot is written only when the
    /// store has no entry for that user at least as recent. Each entry is its
    /// own transaction; on error, entries imported so far remain.
    pub fn import_legacy<F>(&self, legacy_path: &Path, resolve: F) -> Result<ImportSummary>
    where
        F: FnMut(u32) -> Option<String>,
    {
        let reader = LegacyReader::open(legacy_path)?;
        let mut handle = self.open(OpenMode::Create)?;
        let summary = import_entries(&mut handle, reader, resolve)?;
        handle.close()?;

        tracing::info!(
            source = %legacy_path.display(),
            imported = summary.imported,
            skipped_unknown = summary.skipped_unknown,
            skipped_newer = summary.skipped_newer,
            "imported legacy lastlog"
        );
        Ok(summary)
    }
}

/// Write every resolvable, newer entry from `entries` into `handle`
pub fn import_entries<I, F>(
    handle: &mut StoreHandle,
    entries: I,
    mut resolve: F,
) -> Result<ImportSummary>
where
    I: IntoIterator<Item = Result<LegacyEntry>>,
    F: FnMut(u32) -> Option<String>,
{
    let mut summary = ImportSummary::default();

    for entry in entries {
        let entry = entry?;
        let Some(username) = resolve(entry.uid) else {
            summary.skipped_unknown += 1;
            continue;
        };

        if handle.write_if_newer(&username, &entry.to_login())? {
            summary.imported += 1;
        } else {
            summary.skipped_newer += 1;
        }
    }

    Ok(summary)
}
