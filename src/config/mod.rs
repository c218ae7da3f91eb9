//! Client configuration.
//!
//! [`ClientConfig`] is the immutable identity/configuration consumed by
//! the handshake. [`ConnectProfile`] is its file/environment counterpart:
//! a TOML-friendly description of a target server that the CLI (or an
//! application bootstrap) turns into a `ClientConfig` plus an address.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConnError, Result};
use crate::packet::net::TlsOptions;
use crate::protocol::CapabilityFlags;

/// Identity and negotiation options for one connection attempt.
///
/// Immutable for the handshake's duration; build it with the `with_*`
/// methods.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    /// Username sent in the handshake response.
    pub user: String,
    /// Password fed to the auth plugin.
    pub password: String,
    /// Default database; empty means none.
    pub database: String,
    /// Collation name; `None` selects the library default.
    pub collation: Option<String>,
    /// Connection attributes, sent when non-empty. Order is irrelevant
    /// on the wire.
    pub attributes: Vec<(String, String)>,
    /// Optional capabilities to request on top of the baseline.
    pub requested_caps: CapabilityFlags,
    /// Capabilities to force off even when requested.
    pub disabled_caps: CapabilityFlags,
    /// TLS settings; presence makes the handshake upgrade the transport.
    pub tls: Option<TlsOptions>,
    /// Whether the transport is a local (unix) socket, which changes
    /// `sha256_password` behavior.
    pub unix_socket: bool,
    /// Socket read timeout applied before the handshake.
    pub read_timeout: Option<Duration>,
    /// Socket write timeout applied before the handshake.
    pub write_timeout: Option<Duration>,
}

impl ClientConfig {
    /// Config with credentials and library defaults for everything else.
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Select the default database.
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    /// Select a collation by name.
    pub fn with_collation(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }

    /// Add one connection attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Request optional capabilities (mask of `CapabilityFlags` bits).
    pub fn with_requested_caps(mut self, mask: u32) -> Self {
        self.requested_caps.set(mask);
        self
    }

    /// Force capabilities off (mask of `CapabilityFlags` bits).
    pub fn with_excluded_caps(mut self, mask: u32) -> Self {
        self.disabled_caps.set(mask);
        self
    }

    /// Enable the mid-handshake TLS upgrade.
    pub fn with_tls(mut self, tls: TlsOptions) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Mark the transport as a local socket.
    pub fn via_unix_socket(mut self) -> Self {
        self.unix_socket = true;
        self
    }

    /// Apply read/write timeouts to the socket before the handshake.
    pub fn with_timeouts(mut self, read: Option<Duration>, write: Option<Duration>) -> Self {
        self.read_timeout = read;
        self.write_timeout = write;
        self
    }
}

/// TLS section of a connection profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsProfile {
    /// Upgrade the connection to TLS during the handshake.
    pub enabled: bool,
    /// PEM bundle of trusted roots.
    pub ca_file: Option<PathBuf>,
    /// Encrypt without authenticating the server.
    pub insecure_skip_verify: bool,
    /// Name for SNI/validation; defaults to the profile host.
    pub server_name: Option<String>,
}

/// A target server described in TOML and/or environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectProfile {
    /// Server hostname or address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Username.
    pub user: String,
    /// Password.
    pub password: String,
    /// Default database.
    pub database: String,
    /// Collation name.
    pub collation: Option<String>,
    /// Connection attributes.
    pub attributes: BTreeMap<String, String>,
    /// TLS settings.
    pub tls: TlsProfile,
}

impl Default for ConnectProfile {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3306,
            user: String::new(),
            password: String::new(),
            database: String::new(),
            collation: None,
            attributes: BTreeMap::new(),
            tls: TlsProfile::default(),
        }
    }
}

impl ConnectProfile {
    /// Load a profile from a TOML file.
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            ConnError::Config(format!("failed to read profile {}: {e}", path.display()))
        })?;
        toml::from_str(&content)
            .map_err(|e| ConnError::Config(format!("failed to parse profile: {e}")))
    }

    /// Overlay `MYCONN_*` environment variables onto this profile.
    pub fn apply_env(mut self) -> Self {
        if let Ok(host) = std::env::var("MYCONN_HOST") {
            self.host = host;
        }
        if let Ok(port) = std::env::var("MYCONN_PORT") {
            if let Ok(port) = port.parse() {
                self.port = port;
            }
        }
        if let Ok(user) = std::env::var("MYCONN_USER") {
            self.user = user;
        }
        if let Ok(password) = std::env::var("MYCONN_PASSWORD") {
            self.password = password;
        }
        if let Ok(database) = std::env::var("MYCONN_DATABASE") {
            self.database = database;
        }
        self
    }

    /// `host:port` for `TcpStream::connect`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Turn the profile into handshake configuration.
    pub fn client_config(&self) -> Result<ClientConfig> {
        let mut config = ClientConfig::new(self.user.clone(), self.password.clone())
            .with_database(self.database.clone());
        if let Some(collation) = &self.collation {
            config = config.with_collation(collation.clone());
        }
        for (key, value) in &self.attributes {
            config = config.with_attribute(key.clone(), value.clone());
        }
        if !self.attributes.is_empty() {
            config = config.with_requested_caps(CapabilityFlags::CONNECT_ATTRS);
        }

        if self.tls.enabled {
            let server_name = self.tls.server_name.clone().unwrap_or_else(|| self.host.clone());
            let tls = if self.tls.insecure_skip_verify {
                TlsOptions::insecure(server_name)
            } else if let Some(ca_file) = &self.tls.ca_file {
                TlsOptions::from_ca_file(server_name, ca_file)?
            } else {
                return Err(ConnError::Config(
                    "tls.ca_file is required unless tls.insecure_skip_verify is set".to_string(),
                ));
            };
            config = config.with_tls(tls);
        }

        Ok(config)
    }
}
