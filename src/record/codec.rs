//! Payload codec
//!
//! Encoding and decoding of the bytes stored under each username.
//!
//! ## Payload Format
//! ```text
//! ┌───────────────┬───────────┬──────┬─────────────┬──────┐
//! │ Timestamp (8) │ tty bytes │ 0x00 │ rhost bytes │ 0x00 │
//! └───────────────┴───────────┴──────┴─────────────┴──────┘
//! ```
//!
//! - Timestamp: signed 64-bit, big-endian
//! - The rhost field and its terminator are omitted entirely when there is
//!   no remote host, so `rhost = None` ends the payload right after the tty
//!   terminator while `rhost = Some("")` ends it with two consecutive zeros
//! - Texts are UTF-8 and may not contain 0x00
//!
//! This layout is the on-disk contract: any reader must decode it identically.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::LastLogin;
use crate::error::{LastlogError, Result};

/// Size of the timestamp prefix
pub const TIMESTAMP_SIZE: usize = 8;

/// Byte ending each text field
pub const TERMINATOR: u8 = 0x00;

/// Smallest valid payload: timestamp plus an empty tty
pub const MIN_PAYLOAD_SIZE: usize = TIMESTAMP_SIZE + 1;

// =============================================================================
// Encoding
// =============================================================================

/// Encode a login into its stored payload
///
/// Fails only when a text field contains the terminator byte.
pub fn encode(login: &LastLogin) -> Result<Bytes> {
    check_text("tty", &login.tty)?;
    if let Some(rhost) = &login.rhost {
        check_text("rhost", rhost)?;
    }

    let rhost_len = login.rhost.as_ref().map(|r| r.len() + 1).unwrap_or(0);
    let mut buf = BytesMut::with_capacity(MIN_PAYLOAD_SIZE + login.tty.len() + rhost_len);

    buf.put_i64(login.timestamp);
    buf.put_slice(login.tty.as_bytes());
    buf.put_u8(TERMINATOR);
    if let Some(rhost) = &login.rhost {
        buf.put_slice(rhost.as_bytes());
        buf.put_u8(TERMINATOR);
    }

    Ok(buf.freeze())
}

fn check_text(field: &str, text: &str) -> Result<()> {
    if text.as_bytes().contains(&TERMINATOR) {
        return Err(LastlogError::Encode(format!(
            "{} contains a NUL byte",
            field
        )));
    }
    Ok(())
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode a stored payload
///
/// The input is untrusted: every length is checked and any malformation is
/// reported as [`LastlogError::Decode`].
pub fn decode(payload: &[u8]) -> Result<LastLogin> {
    if payload.len() < MIN_PAYLOAD_SIZE {
        return Err(LastlogError::Decode(format!(
            "payload too short: expected at least {} bytes, got {}",
            MIN_PAYLOAD_SIZE,
            payload.len()
        )));
    }

    let mut buf = payload;
    let timestamp = buf.get_i64();

    let tty = take_text(&mut buf, "tty")?;

    let rhost = if buf.has_remaining() {
        Some(take_text(&mut buf, "rhost")?)
    } else {
        None
    };

    if buf.has_remaining() {
        return Err(LastlogError::Decode(format!(
            "{} trailing bytes after rhost",
            buf.remaining()
        )));
    }

    Ok(LastLogin {
        timestamp,
        tty,
        rhost,
    })
}

/// Split one terminated text field off the front of `buf`
fn take_text(buf: &mut &[u8], field: &str) -> Result<String> {
    let end = buf
        .iter()
        .position(|&b| b == TERMINATOR)
        .ok_or_else(|| LastlogError::Decode(format!("{} is not terminated", field)))?;

    let text = std::str::from_utf8(&buf[..end])
        .map_err(|e| LastlogError::Decode(format!("{} is not valid UTF-8: {}", field, e)))?
        .to_string();

    buf.advance(end + 1);
    Ok(text)
}
