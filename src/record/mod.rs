//! Record Module
//!
//! The login record and its payload codec.
//!
//! ## Responsibilities
//! - Define the single entity kept per user
//! - Encode a record into the opaque payload stored under the username key
//! - Decode untrusted payload bytes with bounds checks and typed failures

mod codec;

pub use codec::{decode, encode, MIN_PAYLOAD_SIZE, TERMINATOR, TIMESTAMP_SIZE};

use serde::{Deserialize, Serialize};

/// The payload half of a login record: what is stored under a username
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LastLogin {
    /// Seconds since the epoch, full 64-bit range
    pub timestamp: i64,

    /// Terminal or session name, may be empty
    pub tty: String,

    /// Remote host, `None` for local logins
    pub rhost: Option<String>,
}

impl LastLogin {
    pub fn new(timestamp: i64, tty: &str, rhost: Option<&str>) -> Self {
        Self {
            timestamp,
            tty: tty.to_string(),
            rhost: rhost.map(str::to_string),
        }
    }
}

/// A username together with its last login
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoginRecord {
    pub username: String,
    pub timestamp: i64,
    pub tty: String,
    pub rhost: Option<String>,
}

impl LoginRecord {
    pub fn new(username: impl Into<String>, login: LastLogin) -> Self {
        Self {
            username: username.into(),
            timestamp: login.timestamp,
            tty: login.tty,
            rhost: login.rhost,
        }
    }

    /// The payload half of this record
    pub fn login(&self) -> LastLogin {
        LastLogin {
            timestamp: self.timestamp,
            tty: self.tty.clone(),
            rhost: self.rhost.clone(),
        }
    }

    pub fn into_parts(self) -> (String, LastLogin) {
        (
            self.username,
            LastLogin {
                timestamp: self.timestamp,
                tty: self.tty,
                rhost: self.rhost,
            },
        )
    }
}
