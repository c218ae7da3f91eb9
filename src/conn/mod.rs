//! Connection establishment.
//!
//! Ties the handshake components together over a framed packet stream:
//! read greeting, parse, build the response, optionally upgrade to TLS,
//! transmit. The handshake runs synchronously on the calling thread; a
//! timeout or error at any step leaves the connection unusable and the
//! caller is expected to discard it.

use std::net::{TcpStream, ToSocketAddrs};

use tracing::debug;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::handshake::{Greeting, HandshakeResponse};
use crate::packet::net::NetStream;
use crate::packet::PacketStream;
use crate::protocol::CapabilityFlags;

/// An established connection, past the handshake response.
///
/// Later protocol phases (auth result, commands) continue on the packet
/// stream exposed here; the negotiated state stays available for
/// capability-gated behavior.
#[derive(Debug)]
pub struct Conn {
    stream: PacketStream<NetStream>,
    greeting: Greeting,
    capability: CapabilityFlags,
}

impl Conn {
    /// Connect over TCP and run the handshake.
    pub fn connect(addr: impl ToSocketAddrs, config: ClientConfig) -> Result<Self> {
        let tcp = TcpStream::connect(addr)?;
        Self::establish(tcp, config)
    }

    /// Run the handshake over an already-connected socket.
    ///
    /// Applies the configured timeouts first; they survive the TLS
    /// upgrade because the upgrade wraps the same socket.
    pub fn establish(tcp: TcpStream, config: ClientConfig) -> Result<Self> {
        tcp.set_read_timeout(config.read_timeout)?;
        tcp.set_write_timeout(config.write_timeout)?;

        let mut pipe = PacketStream::new(NetStream::Plain(tcp));
        let payload = pipe.read_packet()?;
        let greeting = Greeting::parse(&payload, config.tls.is_some())?;

        let response = HandshakeResponse::build(&greeting, &config)?;
        let capability = response.capability();
        let stream = response.send(pipe)?;

        debug!(
            server = %greeting.server_version,
            connection_id = greeting.connection_id,
            tls = stream.get_ref().is_tls(),
            "handshake response sent"
        );

        Ok(Self {
            stream,
            greeting,
            capability,
        })
    }

    /// Server version from the greeting.
    pub fn server_version(&self) -> &str {
        &self.greeting.server_version
    }

    /// Connection (thread) id assigned by the server.
    pub fn connection_id(&self) -> u32 {
        self.greeting.connection_id
    }

    /// Capabilities the server advertised.
    pub fn server_capabilities(&self) -> CapabilityFlags {
        self.greeting.capabilities
    }

    /// Capabilities this client answered with.
    pub fn capability(&self) -> CapabilityFlags {
        self.capability
    }

    /// Status flags from the greeting, when the server sent them.
    pub fn status_flags(&self) -> Option<u16> {
        self.greeting.status
    }

    /// Auth plugin the handshake settled on.
    pub fn auth_plugin(&self) -> &str {
        &self.greeting.auth_plugin
    }

    /// Whether the transport was upgraded to TLS.
    pub fn is_tls(&self) -> bool {
        self.stream.get_ref().is_tls()
    }

    /// Borrow the packet stream for the next protocol phase.
    pub fn stream_mut(&mut self) -> &mut PacketStream<NetStream> {
        &mut self.stream
    }

    /// Split into the packet stream and the greeting it was built from.
    pub fn into_parts(self) -> (PacketStream<NetStream>, Greeting) {
        (self.stream, self.greeting)
    }
}
