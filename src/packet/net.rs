//! Client network stream, plain or TLS.
//!
//! The connection exclusively owns one stream at a time. The TLS upgrade
//! consumes the plain stream and produces the encrypted one over the same
//! socket, so socket-level timeouts configured before the upgrade keep
//! applying afterwards.

use std::io::{self, BufReader, Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use rustls::client::{ServerCertVerified, ServerCertVerifier};
use rustls::{Certificate, ClientConnection, RootCertStore, ServerName, StreamOwned};

use crate::error::{ConnError, Result};

/// TLS settings for the mid-handshake upgrade.
#[derive(Clone)]
pub struct TlsOptions {
    config: Arc<rustls::ClientConfig>,
    /// Name presented for SNI and certificate validation.
    pub server_name: String,
}

impl std::fmt::Debug for TlsOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsOptions")
            .field("server_name", &self.server_name)
            .finish_non_exhaustive()
    }
}

impl TlsOptions {
    /// Validate the server against a PEM bundle of trusted roots.
    pub fn from_ca_file(server_name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| ConnError::Config(format!("cannot read CA file {}: {e}", path.display())))?;
        let certs = rustls_pemfile::certs(&mut BufReader::new(file))
            .map_err(|e| ConnError::Config(format!("cannot parse CA file {}: {e}", path.display())))?;

        let mut roots = RootCertStore::empty();
        let (added, _ignored) = roots.add_parsable_certificates(&certs);
        if added == 0 {
            return Err(ConnError::Config(format!(
                "no usable certificates in CA file {}",
                path.display()
            )));
        }

        let config = rustls::ClientConfig::builder()
            .with_safe_defaults()
            .with_root_certificates(roots)
            .with_no_client_auth();
        Ok(Self::from_client_config(server_name, Arc::new(config)))
    }

    /// Skip certificate validation entirely.
    ///
    /// The channel is still encrypted but the peer is not authenticated;
    /// only suitable for test setups and networks trusted end to end.
    pub fn insecure(server_name: impl Into<String>) -> Self {
        let config = rustls::ClientConfig::builder()
            .with_safe_defaults()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCert))
            .with_no_client_auth();
        Self::from_client_config(server_name, Arc::new(config))
    }

    /// Use a caller-built rustls configuration.
    pub fn from_client_config(
        server_name: impl Into<String>,
        config: Arc<rustls::ClientConfig>,
    ) -> Self {
        Self {
            config,
            server_name: server_name.into(),
        }
    }
}

struct AcceptAnyCert;

impl ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}

/// The client's transport: a TCP stream, before or after the TLS upgrade.
pub enum NetStream {
    /// Unencrypted TCP.
    Plain(TcpStream),
    /// TLS over the original socket.
    Tls(Box<StreamOwned<ClientConnection, TcpStream>>),
}

impl std::fmt::Debug for NetStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain(s) => f.debug_tuple("Plain").field(s).finish(),
            Self::Tls(s) => f.debug_tuple("Tls").field(&s.sock).finish(),
        }
    }
}

impl NetStream {
    /// Whether the TLS upgrade has happened.
    pub fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }

    /// Run the client TLS handshake and wrap the socket.
    ///
    /// Consumes the plain stream; the handshake is driven to completion
    /// here so that a failure surfaces before any further packet is
    /// written. Upgrading an already-encrypted stream is a config error.
    pub fn upgrade_tls(self, tls: &TlsOptions) -> Result<Self> {
        match self {
            Self::Plain(mut tcp) => {
                let server_name = ServerName::try_from(tls.server_name.as_str())
                    .map_err(|e| ConnError::Config(format!("invalid TLS server name: {e}")))?;
                let mut conn = ClientConnection::new(tls.config.clone(), server_name)?;
                while conn.is_handshaking() {
                    conn.complete_io(&mut tcp)?;
                }
                Ok(Self::Tls(Box::new(StreamOwned::new(conn, tcp))))
            }
            Self::Tls(_) => Err(ConnError::Config(
                "connection is already encrypted".to_string(),
            )),
        }
    }
}

impl Read for NetStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(s) => s.read(buf),
            Self::Tls(s) => s.read(buf),
        }
    }
}

impl Write for NetStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(s) => s.write(buf),
            Self::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(s) => s.flush(),
            Self::Tls(s) => s.flush(),
        }
    }
}
