//! # Myconn - MySQL client connection phase
//!
//! Client side of the MySQL wire protocol's connection establishment:
//! parse the server greeting, negotiate capabilities, run a password
//! auth plugin, optionally upgrade the transport to TLS mid-handshake,
//! and serialize the handshake response byte-exactly.
//!
//! ## Protocol Overview
//!
//! ```text
//! Client                                   Server
//!    |<------ HandshakeV10 (greeting) --------|   seq 0
//!    |                                        |
//!    |------- SSLRequest (TLS only) --------->|   seq 1
//!    |<============ TLS handshake ===========>|   (raw stream)
//!    |                                        |
//!    |------- HandshakeResponse41 ----------->|   seq 1 (2 with TLS)
//!    |<------ OK / ERR / AuthSwitch ----------|   (later phases)
//! ```
//!
//! The sequence counter runs across the TLS swap: the upgrade replaces
//! the transport underneath the packet stream without resetting framing
//! state.
//!
//! ## Auth Plugins
//!
//! | Plugin                  | Response                                  |
//! |-------------------------|-------------------------------------------|
//! | `mysql_native_password` | SHA-1 challenge hash                      |
//! | `caching_sha2_password` | SHA-256 challenge hash                    |
//! | `sha256_password`       | cleartext under TLS/unix, else RSA request|
//! | `client_ed25519`        | Ed25519 signature of the challenge        |
//! | `mysql_clear_password`  | cleartext                                 |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use myconn::{ClientConfig, Conn};
//!
//! let config = ClientConfig::new("app", "secret").with_database("orders");
//! let conn = Conn::connect("127.0.0.1:3306", config)?;
//!
//! println!("server {}", conn.server_version());
//! println!("capabilities {}", conn.capability());
//! ```
//!
//! ## Modules
//!
//! - [`conn`]: connection establishment routine
//! - [`handshake`]: greeting parser, auth plugins, response builder
//! - [`packet`]: packet framing and the TLS-capable client stream
//! - [`protocol`]: capability flags, collations, length-encoded values
//! - [`config`]: client configuration and connect profiles
//! - [`replication`]: GTID set contract and flavor factory
//! - [`error`]: error types and result alias

pub mod config;
pub mod conn;
pub mod error;
pub mod handshake;
pub mod packet;
pub mod protocol;
pub mod replication;

// Re-exports for convenience
pub use config::{ClientConfig, ConnectProfile};
pub use conn::Conn;
pub use error::{ConnError, Result};
pub use handshake::{AuthPlugin, AuthResponse, Greeting, HandshakeResponse};
pub use packet::net::{NetStream, TlsOptions};
pub use packet::PacketStream;
pub use protocol::CapabilityFlags;
pub use replication::{parse_gtid_set, GtidSet};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
