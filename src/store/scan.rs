//! Iteration
//!
//! Full-table scan handing every decoded record to a caller's visitor.

use std::error::Error;

use rusqlite::types::ValueRef;

use super::handle::StoreHandle;
use super::ops::payload_bytes;
use crate::error::{LastlogError, Result};
use crate::record::{self, LoginRecord};

const SELECT_ALL: &str = "SELECT username, payload FROM records";

impl StoreHandle {
    /// Visit every entry, in the engine's key order
    ///
    /// The whole scan runs inside one read transaction, so it sees a single
    /// committed state of the file. The first undecodable entry aborts the
    /// scan with [`LastlogError::CorruptRecord`]; a visitor error aborts it
    /// with [`LastlogError::Visitor`]. Entries already visited stay visited.
    pub fn for_each<F, E>(&mut self, mut visitor: F) -> Result<()>
    where
        F: FnMut(LoginRecord) -> std::result::Result<(), E>,
        E: Into<Box<dyn Error + Send + Sync>>,
    {
        if self.is_blank() {
            return Ok(());
        }

        let tx = self.conn_mut().transaction()?;
        let mut visited = 0usize;
        {
            let mut stmt = tx.prepare(SELECT_ALL)?;
            let mut rows = stmt.query([])?;

            while let Some(row) = rows.next()? {
                let username = username_text(row.get_ref(0)?)?;
                let payload = payload_bytes(row.get_ref(1)?).ok_or_else(|| {
                    LastlogError::CorruptRecord {
                        username: username.clone(),
                        reason: "payload is not a byte string".to_string(),
                    }
                })?;
                let login = record::decode(&payload).map_err(|e| e.into_corrupt(&username))?;

                visitor(LoginRecord::new(username, login))
                    .map_err(|e| LastlogError::Visitor(e.into()))?;
                visited += 1;
            }
        }
        tx.commit()?;

        tracing::trace!(visited, "scanned entries");
        Ok(())
    }

    /// Collect every entry
    pub fn records(&mut self) -> Result<Vec<LoginRecord>> {
        let mut out = Vec::new();
        self.for_each(|rec| {
            out.push(rec);
            Ok::<(), std::convert::Infallible>(())
        })?;
        Ok(out)
    }
}

fn username_text(value: ValueRef<'_>) -> Result<String> {
    match value {
        ValueRef::Text(b) => std::str::from_utf8(b).map(str::to_string).map_err(|e| {
            LastlogError::CorruptRecord {
                username: String::from_utf8_lossy(b).into_owned(),
                reason: format!("username is not valid UTF-8: {}", e),
            }
        }),
        other => Err(LastlogError::CorruptRecord {
            username: String::new(),
            reason: format!("username has type {}", other.data_type()),
        }),
    }
}
