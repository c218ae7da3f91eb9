//! Connection-phase error types.
//!
//! Every error is terminal for the current connection attempt: nothing in
//! this crate retries, and callers are expected to discard the connection
//! and reconnect. Variants carry enough context (offending byte values,
//! field names) to diagnose a protocol or configuration mismatch from the
//! message alone.

use thiserror::Error;

/// Errors raised while establishing a MySQL client connection.
#[derive(Error, Debug)]
pub enum ConnError {
    /// The greeting's first byte is not the classic protocol version.
    ///
    /// `detail` distinguishes "wrong protocol" (e.g. the X Protocol port)
    /// from "wrong version".
    #[error("invalid protocol version {version}, expected 10{detail}")]
    ProtocolMismatch {
        /// The version byte the server sent.
        version: u8,
        /// Extra diagnosis, e.g. an X Protocol hint. May be empty.
        detail: &'static str,
    },

    /// The server answered the connection attempt with an ERR packet.
    #[error("server error {code}: {message}")]
    ServerError {
        /// Server-side error code.
        code: u16,
        /// Five-character SQLSTATE, when the server included one.
        sql_state: Option<String>,
        /// Human-readable message from the server.
        message: String,
    },

    /// Structural violation: missing terminator, wrong challenge length,
    /// inconsistent length fields, out-of-order sequence numbers.
    #[error("malformed packet: {0}")]
    MalformedPacket(String),

    /// The server lacks a capability this client requires unconditionally.
    #[error("the server does not support protocol 4.1 required by this client")]
    UnsupportedServer,

    /// TLS is configured locally but the server does not advertise SSL.
    #[error("TLS required by client configuration but the server does not support SSL")]
    TlsUnsupportedByServer,

    /// The negotiated auth plugin is outside the supported set.
    #[error("auth plugin '{0}' is not supported")]
    UnsupportedAuthPlugin(String),

    /// Collation name not present in the collation table.
    #[error("invalid collation name {0}")]
    InvalidCollation(String),

    /// Replication position factory got an unknown flavor identifier.
    #[error("invalid flavor {0}")]
    InvalidFlavor(String),

    /// A GTID string did not parse under the requested flavor.
    #[error("invalid GTID set: {0}")]
    InvalidGtid(String),

    /// Configuration error (bad server name, unreadable CA bundle, ...).
    #[error("config error: {0}")]
    Config(String),

    /// TLS handshake or record-layer error, propagated unchanged.
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// I/O error, including read/write timeouts.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for connection-phase operations.
pub type Result<T> = std::result::Result<T, ConnError>;
