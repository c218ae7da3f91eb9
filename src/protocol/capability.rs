//! Client/server capability flags.
//!
//! Both peers advertise optional protocol features through a 32-bit
//! bitset. The server sends its flags split across the greeting (lower 16
//! bits always, upper 16 bits only in the extended tail); the client
//! answers with the negotiated union in the handshake response.
//!
//! Represented as a newtype over `u32` with named bit constants and pure
//! set-algebra helpers so the negotiation formula stays independently
//! testable.

use std::fmt;

/// A 32-bit capability bitset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilityFlags(u32);

#[allow(missing_docs)]
impl CapabilityFlags {
    /// Old password hashing may exceed 8 bytes.
    pub const LONG_PASSWORD: u32 = 0x0000_0001;
    /// Return found rows instead of affected rows.
    pub const FOUND_ROWS: u32 = 0x0000_0002;
    /// Longer column flags in result metadata.
    pub const LONG_FLAG: u32 = 0x0000_0004;
    /// Schema name can be given in the handshake response.
    pub const CONNECT_WITH_DB: u32 = 0x0000_0008;
    /// Don't allow database.table.column.
    pub const NO_SCHEMA: u32 = 0x0000_0010;
    /// Switch to the compressed protocol after authentication.
    pub const COMPRESS: u32 = 0x0000_0020;
    /// Special handling of ODBC behavior.
    pub const ODBC: u32 = 0x0000_0040;
    /// LOAD DATA LOCAL INFILE support.
    pub const LOCAL_FILES: u32 = 0x0000_0080;
    /// Parser ignores spaces before '('.
    pub const IGNORE_SPACE: u32 = 0x0000_0100;
    /// Protocol 4.1 packets and semantics.
    pub const PROTOCOL_41: u32 = 0x0000_0200;
    /// Interactive client timeout handling.
    pub const INTERACTIVE: u32 = 0x0000_0400;
    /// Switch to SSL after sending the capability flags.
    pub const SSL: u32 = 0x0000_0800;
    /// Do not issue SIGPIPE on network failures (client only).
    pub const IGNORE_SIGPIPE: u32 = 0x0000_1000;
    /// Status flags carried in OK/EOF packets.
    pub const TRANSACTIONS: u32 = 0x0000_2000;
    pub const RESERVED: u32 = 0x0000_4000;
    /// Protocol-4.1 scramble exchange.
    pub const SECURE_CONNECTION: u32 = 0x0000_8000;
    /// Multiple statements per COM_QUERY.
    pub const MULTI_STATEMENTS: u32 = 0x0001_0000;
    /// Multiple result sets per COM_QUERY.
    pub const MULTI_RESULTS: u32 = 0x0002_0000;
    /// Multiple result sets in the prepared-statement protocol.
    pub const PS_MULTI_RESULTS: u32 = 0x0004_0000;
    /// Pluggable authentication.
    pub const PLUGIN_AUTH: u32 = 0x0008_0000;
    /// Connection attributes in the handshake response.
    pub const CONNECT_ATTRS: u32 = 0x0010_0000;
    /// Auth response length is a length-encoded integer.
    pub const PLUGIN_AUTH_LENENC_CLIENT_DATA: u32 = 0x0020_0000;
    /// Survive connecting with an expired password.
    pub const CAN_HANDLE_EXPIRED_PASSWORDS: u32 = 0x0040_0000;
    /// Session state change information in OK packets.
    pub const SESSION_TRACK: u32 = 0x0080_0000;
    /// OK packet instead of EOF after a text resultset.
    pub const DEPRECATE_EOF: u32 = 0x0100_0000;
    /// Optional resultset metadata.
    pub const OPTIONAL_RESULTSET_METADATA: u32 = 0x0200_0000;
    /// zstd compression with a negotiated level byte.
    pub const ZSTD_COMPRESSION_ALGORITHM: u32 = 0x0400_0000;
    /// Query parameters in COM_QUERY / COM_STMT_EXECUTE.
    pub const QUERY_ATTRIBUTES: u32 = 0x0800_0000;
    /// Multi-factor authentication packets.
    pub const MULTI_FACTOR_AUTHENTICATION: u32 = 0x1000_0000;
    pub const PROGRESS_OBSOLETE: u32 = 0x2000_0000;
    /// Verify the server certificate (client only, deprecated).
    pub const SSL_VERIFY_SERVER_CERT: u32 = 0x4000_0000;
    /// Keep options across a failed connect (client only).
    pub const REMEMBER_OPTIONS: u32 = 0x8000_0000;

    /// Empty set.
    pub fn empty() -> Self {
        Self(0)
    }

    /// Create from raw bits.
    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Get raw bits.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Check whether every bit in `mask` is set.
    pub fn has(self, mask: u32) -> bool {
        self.0 & mask == mask
    }

    /// Set every bit in `mask`.
    pub fn set(&mut self, mask: u32) {
        self.0 |= mask;
    }

    /// Clear every bit in `mask`.
    pub fn unset(&mut self, mask: u32) {
        self.0 &= !mask;
    }

    /// Merge the greeting's upper capability half into bits 16-31.
    pub fn merge_upper(&mut self, upper: u16) {
        self.0 = (u32::from(upper) << 16) | (self.0 & 0xffff);
    }
}

const FLAG_NAMES: &[(u32, &str)] = &[
    (CapabilityFlags::LONG_PASSWORD, "LONG_PASSWORD"),
    (CapabilityFlags::FOUND_ROWS, "FOUND_ROWS"),
    (CapabilityFlags::LONG_FLAG, "LONG_FLAG"),
    (CapabilityFlags::CONNECT_WITH_DB, "CONNECT_WITH_DB"),
    (CapabilityFlags::NO_SCHEMA, "NO_SCHEMA"),
    (CapabilityFlags::COMPRESS, "COMPRESS"),
    (CapabilityFlags::ODBC, "ODBC"),
    (CapabilityFlags::LOCAL_FILES, "LOCAL_FILES"),
    (CapabilityFlags::IGNORE_SPACE, "IGNORE_SPACE"),
    (CapabilityFlags::PROTOCOL_41, "PROTOCOL_41"),
    (CapabilityFlags::INTERACTIVE, "INTERACTIVE"),
    (CapabilityFlags::SSL, "SSL"),
    (CapabilityFlags::IGNORE_SIGPIPE, "IGNORE_SIGPIPE"),
    (CapabilityFlags::TRANSACTIONS, "TRANSACTIONS"),
    (CapabilityFlags::SECURE_CONNECTION, "SECURE_CONNECTION"),
    (CapabilityFlags::MULTI_STATEMENTS, "MULTI_STATEMENTS"),
    (CapabilityFlags::MULTI_RESULTS, "MULTI_RESULTS"),
    (CapabilityFlags::PS_MULTI_RESULTS, "PS_MULTI_RESULTS"),
    (CapabilityFlags::PLUGIN_AUTH, "PLUGIN_AUTH"),
    (CapabilityFlags::CONNECT_ATTRS, "CONNECT_ATTRS"),
    (
        CapabilityFlags::PLUGIN_AUTH_LENENC_CLIENT_DATA,
        "PLUGIN_AUTH_LENENC_CLIENT_DATA",
    ),
    (
        CapabilityFlags::CAN_HANDLE_EXPIRED_PASSWORDS,
        "CAN_HANDLE_EXPIRED_PASSWORDS",
    ),
    (CapabilityFlags::SESSION_TRACK, "SESSION_TRACK"),
    (CapabilityFlags::DEPRECATE_EOF, "DEPRECATE_EOF"),
    (
        CapabilityFlags::OPTIONAL_RESULTSET_METADATA,
        "OPTIONAL_RESULTSET_METADATA",
    ),
    (
        CapabilityFlags::ZSTD_COMPRESSION_ALGORITHM,
        "ZSTD_COMPRESSION_ALGORITHM",
    ),
    (CapabilityFlags::QUERY_ATTRIBUTES, "QUERY_ATTRIBUTES"),
    (
        CapabilityFlags::MULTI_FACTOR_AUTHENTICATION,
        "MULTI_FACTOR_AUTHENTICATION",
    ),
    (
        CapabilityFlags::SSL_VERIFY_SERVER_CERT,
        "SSL_VERIFY_SERVER_CERT",
    ),
    (CapabilityFlags::REMEMBER_OPTIONS, "REMEMBER_OPTIONS"),
];

impl fmt::Display for CapabilityFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for &(mask, name) in FLAG_NAMES {
            if self.0 & mask != 0 {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        if first {
            write!(f, "(none)")?;
        }
        Ok(())
    }
}
