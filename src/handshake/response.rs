//! Handshake response construction and transmission.
//!
//! Computes the final client capability set, serializes the
//! HandshakeResponse41 payload byte-exactly, and performs the SSLRequest /
//! transport-upgrade dance before the full response goes out when TLS is
//! configured.

use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{ConnError, Result};
use crate::handshake::auth::{AuthPlugin, AuthResponse};
use crate::handshake::greeting::Greeting;
use crate::packet::net::{NetStream, TlsOptions};
use crate::packet::PacketStream;
use crate::protocol::charset::{collation_id, DEFAULT_COLLATION_NAME};
use crate::protocol::{lenenc, CapabilityFlags};

/// Compression level sent when zstd compression was negotiated.
const ZSTD_COMPRESSION_LEVEL: u8 = 3;

/// Optional capabilities honored from the client's request set.
const REQUESTABLE_CAPS: u32 = CapabilityFlags::FOUND_ROWS
    | CapabilityFlags::IGNORE_SPACE
    | CapabilityFlags::MULTI_STATEMENTS
    | CapabilityFlags::MULTI_RESULTS
    | CapabilityFlags::PS_MULTI_RESULTS
    | CapabilityFlags::CONNECT_ATTRS
    | CapabilityFlags::COMPRESS
    | CapabilityFlags::ZSTD_COMPRESSION_ALGORITHM
    | CapabilityFlags::LOCAL_FILES;

/// A fully computed handshake response, ready to serialize.
#[derive(Debug)]
pub struct HandshakeResponse {
    capability: CapabilityFlags,
    collation: u16,
    user: String,
    database: String,
    plugin: AuthPlugin,
    auth: AuthResponse,
    attributes: Vec<(String, String)>,
    tls: Option<TlsOptions>,
}

impl HandshakeResponse {
    /// Compute capabilities, resolve the collation and generate the auth
    /// response.
    ///
    /// The plugin check runs first: an unsupported plugin fails before
    /// any capability computation.
    pub fn build(greeting: &Greeting, config: &ClientConfig) -> Result<Self> {
        let plugin = AuthPlugin::from_name(&greeting.auth_plugin)?;

        // Baseline abilities of this library.
        let mut capability = CapabilityFlags::from_bits(
            CapabilityFlags::PROTOCOL_41
                | CapabilityFlags::SECURE_CONNECTION
                | CapabilityFlags::LONG_PASSWORD
                | CapabilityFlags::TRANSACTIONS
                | CapabilityFlags::PLUGIN_AUTH,
        );
        // Abilities that follow the server's lead.
        capability.set(
            greeting.capabilities.bits()
                & (CapabilityFlags::LONG_FLAG | CapabilityFlags::QUERY_ATTRIBUTES),
        );
        // Abilities the caller asked for explicitly.
        capability.set(config.requested_caps.bits() & REQUESTABLE_CAPS);
        // Explicit exclusions win over everything requested above.
        capability.unset(config.disabled_caps.bits());

        if config.tls.is_some() {
            capability.set(CapabilityFlags::SSL);
        }

        let auth = plugin.generate(
            &greeting.scramble,
            &config.password,
            config.tls.is_some(),
            config.unix_socket,
        )?;
        if lenenc::int_len(auth.data.len() as u64) > 1 {
            capability.set(CapabilityFlags::PLUGIN_AUTH_LENENC_CLIENT_DATA);
        }

        if !config.database.is_empty() {
            capability.set(CapabilityFlags::CONNECT_WITH_DB);
        }
        if !config.attributes.is_empty() {
            capability.set(CapabilityFlags::CONNECT_ATTRS);
        }

        let collation_name = config.collation.as_deref().unwrap_or(DEFAULT_COLLATION_NAME);
        let collation = collation_id(collation_name)
            .ok_or_else(|| ConnError::InvalidCollation(collation_name.to_string()))?;

        debug!(
            capability = %capability,
            collation,
            plugin = plugin.name(),
            "computed client capabilities"
        );

        Ok(Self {
            capability,
            collation,
            user: config.user.clone(),
            database: config.database.clone(),
            plugin,
            auth,
            attributes: config.attributes.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            tls: config.tls.clone(),
        })
    }

    /// The negotiated client capability set.
    pub fn capability(&self) -> CapabilityFlags {
        self.capability
    }

    /// Fixed 32-byte prefix: capability flags, max packet size, collation
    /// and filler. Doubles as the SSLRequest payload.
    fn prelude(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32);
        buf.extend_from_slice(&self.capability.bits().to_le_bytes());
        // Max packet size: zero, the server applies its own limit.
        buf.extend_from_slice(&0u32.to_le_bytes());
        // Only the low 8 bits of the collation id fit the wire field.
        buf.push((self.collation & 0xff) as u8);
        buf.extend_from_slice(&[0u8; 23]);
        buf
    }

    /// SSLRequest payload sent before the transport upgrade.
    pub fn ssl_request_payload(&self) -> Vec<u8> {
        self.prelude()
    }

    /// Serialize the full HandshakeResponse41 payload.
    pub fn to_payload(&self) -> Vec<u8> {
        let mut buf = self.prelude();

        buf.extend_from_slice(self.user.as_bytes());
        buf.push(0);

        lenenc::write_int(&mut buf, self.auth.data.len() as u64);
        buf.extend_from_slice(&self.auth.data);
        if self.auth.append_nul {
            buf.push(0);
        }

        if self.capability.has(CapabilityFlags::CONNECT_WITH_DB) {
            buf.extend_from_slice(self.database.as_bytes());
            buf.push(0);
        }

        buf.extend_from_slice(self.plugin.name().as_bytes());
        buf.push(0);

        if self.capability.has(CapabilityFlags::CONNECT_ATTRS) {
            buf.extend_from_slice(&self.attributes_block());
        }

        if self.capability.has(CapabilityFlags::ZSTD_COMPRESSION_ALGORITHM) {
            buf.push(ZSTD_COMPRESSION_LEVEL);
        }

        buf
    }

    /// Connection attributes: a length-encoded total followed by
    /// length-encoded key/value pairs. Pair order is unspecified.
    fn attributes_block(&self) -> Vec<u8> {
        let mut pairs = Vec::new();
        for (key, value) in &self.attributes {
            lenenc::write_str(&mut pairs, key.as_bytes());
            lenenc::write_str(&mut pairs, value.as_bytes());
        }
        let mut block = Vec::with_capacity(pairs.len() + 9);
        lenenc::write_int(&mut block, pairs.len() as u64);
        block.extend_from_slice(&pairs);
        block
    }

    /// Transmit the response, upgrading the transport first when the SSL
    /// bit is set.
    ///
    /// The SSLRequest prefix goes out as its own packet, the TLS
    /// handshake runs over the raw socket, and only then does the full
    /// response follow as the next packet in the same sequence, which
    /// `map_stream` preserves across the swap.
    pub fn send(self, mut pipe: PacketStream<NetStream>) -> Result<PacketStream<NetStream>> {
        if self.capability.has(CapabilityFlags::SSL) {
            let tls = self.tls.as_ref().ok_or_else(|| {
                ConnError::Config("SSL capability set without TLS options".to_string())
            })?;
            pipe.write_packet(&self.ssl_request_payload())?;
            info!(server = %tls.server_name, "upgrading connection to TLS");
            pipe = pipe.map_stream(|stream| stream.upgrade_tls(tls))?;
        }
        pipe.write_packet(&self.to_payload())?;
        Ok(pipe)
    }
}
