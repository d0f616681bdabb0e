//! Record Operations
//!
//! Write, read, remove and rename on an open handle. Each call is exactly one
//! engine transaction; nothing is held between calls.

use rusqlite::types::ValueRef;
use rusqlite::{params, OptionalExtension, Transaction, TransactionBehavior};

use super::handle::{OpenMode, StoreHandle};
use crate::error::{LastlogError, Result};
use crate::record::{self, LastLogin};

const SELECT_PAYLOAD: &str = "SELECT payload FROM records WHERE username = ?1";

const UPSERT_PAYLOAD: &str = "INSERT INTO records (username, payload) VALUES (?1, ?2)
     ON CONFLICT(username) DO UPDATE SET payload = excluded.payload";

const DELETE_RECORD: &str = "DELETE FROM records WHERE username = ?1";

impl StoreHandle {
    /// Insert or fully replace the entry for `username`
    pub fn write(&mut self, username: &str, login: &LastLogin) -> Result<()> {
        check_username(username)?;
        let payload = record::encode(login)?;
        self.write_payload(username, &payload)?;

        tracing::trace!(username, timestamp = login.timestamp, "wrote entry");
        Ok(())
    }

    /// Upsert an already encoded payload
    ///
    /// Steps:
    /// 1. Take the write lock (immediate transaction)
    /// 2. Upsert the row
    /// 3. Commit
    pub(crate) fn write_payload(&mut self, username: &str, payload: &[u8]) -> Result<()> {
        self.ensure_writable()?;

        let tx = self
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(UPSERT_PAYLOAD, params![username, payload])?;
        tx.commit()?;
        Ok(())
    }

    /// Write `login` unless the stored entry is at least as recent
    ///
    /// Lookup, comparison and upsert share one immediate transaction, so no
    /// other writer can commit in between. Returns whether it wrote.
    pub(crate) fn write_if_newer(&mut self, username: &str, login: &LastLogin) -> Result<bool> {
        check_username(username)?;
        let payload = record::encode(login)?;
        self.ensure_writable()?;

        let tx = self
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = tx
            .query_row(SELECT_PAYLOAD, params![username], |row| {
                Ok(payload_bytes(row.get_ref(0)?))
            })
            .optional()?;

        if let Some(current) = current {
            let current = current.ok_or_else(|| LastlogError::CorruptRecord {
                username: username.to_string(),
                reason: "payload is not a byte string".to_string(),
            })?;
            let stored = record::decode(&current).map_err(|e| e.into_corrupt(username))?;
            if stored.timestamp >= login.timestamp {
                return Ok(false);
            }
        }

        tx.execute(UPSERT_PAYLOAD, params![username, &payload[..]])?;
        tx.commit()?;

        tracing::trace!(username, timestamp = login.timestamp, "wrote newer entry");
        Ok(true)
    }

    /// Look up the entry for `username`
    pub fn read(&self, username: &str) -> Result<LastLogin> {
        if self.is_blank() {
            return Err(LastlogError::NotFound(username.to_string()));
        }

        // A single SELECT runs in its own implicit read transaction.
        let payload = self
            .conn()
            .query_row(SELECT_PAYLOAD, params![username], |row| {
                Ok(payload_bytes(row.get_ref(0)?))
            })
            .optional()?
            .ok_or_else(|| LastlogError::NotFound(username.to_string()))?;

        let payload = payload.ok_or_else(|| LastlogError::CorruptRecord {
            username: username.to_string(),
            reason: "payload is not a byte string".to_string(),
        })?;

        tracing::trace!(username, "read entry");
        record::decode(&payload).map_err(|e| e.into_corrupt(username))
    }

    /// Delete the entry for `username`
    ///
    /// A missing entry is reported as [`LastlogError::NotFound`].
    pub fn remove(&mut self, username: &str) -> Result<()> {
        self.ensure_writable()?;

        let tx = self
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let deleted = tx.execute(DELETE_RECORD, params![username])?;
        if deleted == 0 {
            // Dropping the transaction rolls it back.
            return Err(LastlogError::NotFound(username.to_string()));
        }
        tx.commit()?;

        tracing::trace!(username, "removed entry");
        Ok(())
    }

    /// Move the entry of `from` to `to`, keeping its payload byte for byte
    ///
    /// The move is one transaction: readers see the entry under exactly one
    /// of the two names. If `to` already has an entry the rename is refused
    /// with [`LastlogError::Conflict`] and nothing changes. Renaming an
    /// existing entry to its own name is a no-op.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        check_username(to)?;
        self.ensure_writable()?;

        let tx = self
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let payload = select_raw(&tx, from)?
            .ok_or_else(|| LastlogError::NotFound(from.to_string()))?;

        if from == to {
            return Ok(());
        }

        if select_raw(&tx, to)?.is_some() {
            return Err(LastlogError::Conflict {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        tx.execute(UPSERT_PAYLOAD, params![to, payload])?;
        tx.execute(DELETE_RECORD, params![from])?;
        tx.commit()?;

        tracing::trace!(from, to, "renamed entry");
        Ok(())
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.mode() == OpenMode::ReadOnly {
            return Err(LastlogError::Storage(format!(
                "database {} is open read-only",
                self.path().display()
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Helpers
// =============================================================================

pub(crate) fn check_username(username: &str) -> Result<()> {
    if username.is_empty() {
        return Err(LastlogError::Encode("username is empty".to_string()));
    }
    if username.as_bytes().contains(&record::TERMINATOR) {
        return Err(LastlogError::Encode(
            "username contains a NUL byte".to_string(),
        ));
    }
    Ok(())
}

/// Stored payload as bytes; TEXT is accepted since the bytes are the same,
/// anything else (NULL, numbers) is not a payload
pub(crate) fn payload_bytes(value: ValueRef<'_>) -> Option<Vec<u8>> {
    match value {
        ValueRef::Blob(b) | ValueRef::Text(b) => Some(b.to_vec()),
        _ => None,
    }
}

/// Raw stored value for `username`, copied untouched
fn select_raw(tx: &Transaction<'_>, username: &str) -> Result<Option<rusqlite::types::Value>> {
    let value = tx
        .query_row(SELECT_PAYLOAD, params![username], |row| row.get(0))
        .optional()?;
    Ok(value)
}
