//! Wire-level protocol vocabulary.
//!
//! Constants and codecs shared by the handshake components: protocol
//! version markers, authentication plugin names, the capability bitset,
//! the collation table, length-encoded integers/strings and ERR-packet
//! decoding.

pub mod capability;
pub mod charset;
pub mod lenenc;

pub use capability::CapabilityFlags;

use crate::error::{ConnError, Result};

/// Protocol version byte opening a classic HandshakeV10 greeting.
pub const CLASSIC_PROTOCOL_VERSION: u8 = 10;

/// Version marker used by the X Protocol (mysqlx port).
///
/// Seen here only to produce a better diagnostic when a client is pointed
/// at the wrong port.
pub const X_PROTOCOL_VERSION: u8 = 11;

/// First payload byte of an ERR packet.
pub const ERR_HEADER: u8 = 0xff;

/// SQLSTATE marker inside a protocol-4.1 ERR packet.
const SQL_STATE_MARKER: u8 = b'#';

/// `mysql_native_password` plugin name.
pub const AUTH_NATIVE_PASSWORD: &str = "mysql_native_password";
/// `caching_sha2_password` plugin name (MySQL 8.0 default).
pub const AUTH_CACHING_SHA2_PASSWORD: &str = "caching_sha2_password";
/// `sha256_password` plugin name.
pub const AUTH_SHA256_PASSWORD: &str = "sha256_password";
/// MariaDB `client_ed25519` plugin name.
pub const AUTH_MARIADB_ED25519: &str = "client_ed25519";
/// `mysql_clear_password` plugin name.
pub const AUTH_CLEAR_PASSWORD: &str = "mysql_clear_password";

/// Plugin assumed when the server's greeting names none.
pub const DEFAULT_AUTH_PLUGIN: &str = AUTH_NATIVE_PASSWORD;

/// Decoded ERR packet.
///
/// The connection phase only ever sees an ERR packet in place of the
/// greeting (e.g. host not allowed, too many connections); later protocol
/// phases reuse the same layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrPacket {
    /// Server error code.
    pub code: u16,
    /// SQLSTATE, present on protocol-4.1 servers.
    pub sql_state: Option<String>,
    /// Error message, lossily decoded.
    pub message: String,
}

impl ErrPacket {
    /// Decode an ERR packet payload (first byte `0xff` included).
    pub fn parse(payload: &[u8]) -> Result<Self> {
        if payload.first() != Some(&ERR_HEADER) {
            return Err(ConnError::MalformedPacket(format!(
                "ERR packet must start with 0xff, got {:#04x?}",
                payload.first()
            )));
        }
        if payload.len() < 3 {
            return Err(ConnError::MalformedPacket(
                "ERR packet too short for error code".to_string(),
            ));
        }
        let code = u16::from_le_bytes([payload[1], payload[2]]);
        let mut rest = &payload[3..];

        // Protocol 4.1 inserts '#' + a 5-byte SQLSTATE before the message.
        let sql_state = if rest.first() == Some(&SQL_STATE_MARKER) && rest.len() >= 6 {
            let state = String::from_utf8_lossy(&rest[1..6]).into_owned();
            rest = &rest[6..];
            Some(state)
        } else {
            None
        };

        Ok(Self {
            code,
            sql_state,
            message: String::from_utf8_lossy(rest).into_owned(),
        })
    }

    /// Convert into the crate error, consuming the decoded fields.
    pub fn into_error(self) -> ConnError {
        ConnError::ServerError {
            code: self.code,
            sql_state: self.sql_state,
            message: self.message,
        }
    }
}
