//! Legacy lastlog reader
//!
//! Streams entries out of the fixed-offset legacy file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use super::{LegacyEntry, LEGACY_HOST_SIZE, LEGACY_LINE_SIZE, LEGACY_RECORD_SIZE};
use crate::error::{LastlogError, Result};

/// Reads entries from a legacy lastlog file
pub struct LegacyReader<R> {
    inner: R,
    next_uid: u64,
    done: bool,
}

impl LegacyReader<BufReader<File>> {
    /// Open a legacy lastlog file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: Read> LegacyReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            next_uid: 0,
            done: false,
        }
    }

    /// Read the next slot that holds a login
    ///
    /// Slots with a zero time were never used and are skipped.
    pub fn next_entry(&mut self) -> Result<Option<LegacyEntry>> {
        let mut slot = [0u8; LEGACY_RECORD_SIZE];
        loop {
            let filled = read_slot(&mut self.inner, &mut slot)?;
            if filled == 0 {
                return Ok(None);
            }
            if filled < LEGACY_RECORD_SIZE {
                return Err(LastlogError::LegacyFormat(format!(
                    "truncated entry for uid {}: {} of {} bytes",
                    self.next_uid, filled, LEGACY_RECORD_SIZE
                )));
            }

            let uid = u32::try_from(self.next_uid).map_err(|_| {
                LastlogError::LegacyFormat("file extends past the largest uid".to_string())
            })?;
            self.next_uid += 1;

            if let Some(entry) = parse_slot(uid, &slot) {
                return Ok(Some(entry));
            }
        }
    }
}

impl<R: Read> Iterator for LegacyReader<R> {
    type Item = Result<LegacyEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Fill `slot` as far as the input allows; returns bytes read
fn read_slot<R: Read>(reader: &mut R, slot: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < slot.len() {
        match reader.read(&mut slot[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Decode one slot; `None` for an unused slot
///
/// ```text
/// ┌──────────┬───────────────┬─────────────────┐
/// │ time (4) │ line (32)     │ host (256)      │
/// └──────────┴───────────────┴─────────────────┘
/// ```
/// time is a native-endian signed 32-bit value; texts are NUL-padded.
pub(crate) fn parse_slot(uid: u32, slot: &[u8; LEGACY_RECORD_SIZE]) -> Option<LegacyEntry> {
    let time = i32::from_ne_bytes([slot[0], slot[1], slot[2], slot[3]]);
    if time == 0 {
        return None;
    }

    let line = padded_text(&slot[4..4 + LEGACY_LINE_SIZE]);
    let host = padded_text(&slot[4 + LEGACY_LINE_SIZE..4 + LEGACY_LINE_SIZE + LEGACY_HOST_SIZE]);

    Some(LegacyEntry {
        uid,
        timestamp: i64::from(time),
        line,
        host: if host.is_empty() { None } else { Some(host) },
    })
}

fn padded_text(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}
