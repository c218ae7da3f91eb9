//! Initial handshake (HandshakeV10) parsing.
//!
//! The greeting is a strictly left-to-right variable-length format: each
//! field's position depends on previously parsed lengths and capability
//! bits, and the packet may legally end right after the lower capability
//! flags. Everything after that point is the "extended tail".

use tracing::debug;

use crate::error::{ConnError, Result};
use crate::protocol::{
    CapabilityFlags, ErrPacket, CLASSIC_PROTOCOL_VERSION, DEFAULT_AUTH_PLUGIN, ERR_HEADER,
    X_PROTOCOL_VERSION,
};

/// Negotiation state decoded from the server's greeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    /// Server version string, without the terminating NUL.
    pub server_version: String,
    /// Connection (thread) identifier.
    pub connection_id: u32,
    /// Assembled challenge bytes (8-byte part plus the extended part).
    pub scramble: Vec<u8>,
    /// Server capability flags, lower half always present.
    pub capabilities: CapabilityFlags,
    /// Server status flags, absent when the packet has no extended tail.
    pub status: Option<u16>,
    /// Negotiated auth plugin name, defaulted when the server sent none.
    pub auth_plugin: String,
}

/// Bounds-checked left-to-right reader over the packet payload.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn take(&mut self, n: usize, field: &str) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.buf.len());
        match end {
            Some(end) => {
                let out = &self.buf[self.pos..end];
                self.pos = end;
                Ok(out)
            }
            None => Err(ConnError::MalformedPacket(format!(
                "truncated {field}: need {n} bytes at offset {}, have {}",
                self.pos,
                self.buf.len() - self.pos
            ))),
        }
    }

    fn take_u8(&mut self, field: &str) -> Result<u8> {
        Ok(self.take(1, field)?[0])
    }

    fn take_u16_le(&mut self, field: &str) -> Result<u16> {
        let b = self.take(2, field)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn take_u32_le(&mut self, field: &str) -> Result<u32> {
        let b = self.take(4, field)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Bytes up to the next NUL, consuming the terminator too.
    fn take_null_terminated(&mut self, field: &str) -> Result<&'a [u8]> {
        let rest = &self.buf[self.pos..];
        match rest.iter().position(|&b| b == 0) {
            Some(nul) => {
                let out = &rest[..nul];
                self.pos += nul + 1;
                Ok(out)
            }
            None => Err(ConnError::MalformedPacket(format!(
                "missing NUL terminator after {field}"
            ))),
        }
    }
}

impl Greeting {
    /// Parse one greeting payload.
    ///
    /// `tls_configured` mirrors whether the caller intends to upgrade the
    /// transport: a server without the SSL capability then fails the
    /// handshake immediately instead of after the response is built.
    pub fn parse(payload: &[u8], tls_configured: bool) -> Result<Self> {
        let mut rd = Reader::new(payload);

        let marker = rd.take_u8("protocol version")?;
        if marker == ERR_HEADER {
            return Err(ErrPacket::parse(payload)?.into_error());
        }
        if marker != CLASSIC_PROTOCOL_VERSION {
            let detail = if marker == X_PROTOCOL_VERSION {
                ". This might be X Protocol, make sure to connect to the right port"
            } else {
                ""
            };
            return Err(ConnError::ProtocolMismatch {
                version: marker,
                detail,
            });
        }

        let server_version =
            String::from_utf8_lossy(rd.take_null_terminated("server version")?).into_owned();
        let connection_id = rd.take_u32_le("connection id")?;

        let mut scramble = rd.take(8, "scramble part 1")?.to_vec();
        let boundary = rd.take_u8("scramble part 1 terminator")?;
        if boundary != 0 {
            return Err(ConnError::MalformedPacket(format!(
                "expected 0x00 after the first scramble part, got {boundary:#04x}"
            )));
        }

        let mut capabilities =
            CapabilityFlags::from_bits(u32::from(rd.take_u16_le("lower capability flags")?));
        if !capabilities.has(CapabilityFlags::PROTOCOL_41) {
            return Err(ConnError::UnsupportedServer);
        }
        if tls_configured && !capabilities.has(CapabilityFlags::SSL) {
            return Err(ConnError::TlsUnsupportedByServer);
        }

        let mut status = None;
        let mut auth_plugin = String::new();
        if !rd.is_empty() {
            // Server default charset, low 8 bits only. Not used by the client.
            let _charset = rd.take_u8("character set")?;
            status = Some(rd.take_u16_le("status flags")?);
            capabilities.merge_upper(rd.take_u16_le("upper capability flags")?);

            let auth_data_len = rd.take_u8("auth plugin data length")?;
            if auth_data_len > 0 && !capabilities.has(CapabilityFlags::PLUGIN_AUTH) {
                return Err(ConnError::MalformedPacket(format!(
                    "auth plugin data length {auth_data_len} advertised without PLUGIN_AUTH"
                )));
            }

            rd.take(10, "reserved bytes")?;

            if capabilities.has(CapabilityFlags::SECURE_CONNECTION) {
                // The server provides at least 20 scramble bytes in total;
                // a plugin supplying fewer is padded, hence max(13, len - 8).
                let rest = usize::from(auth_data_len).saturating_sub(8).max(13);
                scramble.extend_from_slice(rd.take(rest - 1, "scramble part 2")?);
                rd.take(1, "scramble part 2 terminator")?;
            }

            if capabilities.has(CapabilityFlags::PLUGIN_AUTH) {
                auth_plugin =
                    String::from_utf8_lossy(rd.take_null_terminated("auth plugin name")?)
                        .into_owned();
            }
        }

        if auth_plugin.is_empty() {
            auth_plugin = DEFAULT_AUTH_PLUGIN.to_string();
        }

        debug!(
            version = %server_version,
            connection_id,
            capabilities = %capabilities,
            plugin = %auth_plugin,
            "parsed server greeting"
        );

        Ok(Self {
            server_version,
            connection_id,
            scramble,
            capabilities,
            status,
            auth_plugin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const BASE_CAPS: u32 = CapabilityFlags::PROTOCOL_41
        | CapabilityFlags::SECURE_CONNECTION
        | CapabilityFlags::PLUGIN_AUTH;

    /// Build a greeting payload the way a real server lays it out.
    fn greeting_payload(caps: u32, auth_data_len: u8, plugin: Option<&str>) -> Vec<u8> {
        let mut out = vec![10];
        out.extend_from_slice(b"8.0.32\0");
        out.extend_from_slice(&1234u32.to_le_bytes());
        out.extend_from_slice(b"abcdefgh"); // scramble part 1
        out.push(0);
        out.extend_from_slice(&(caps as u16).to_le_bytes());
        out.push(45); // charset
        out.extend_from_slice(&0x0002u16.to_le_bytes()); // autocommit
        out.extend_from_slice(&((caps >> 16) as u16).to_le_bytes());
        out.push(auth_data_len);
        out.extend_from_slice(&[0u8; 10]);
        if caps & CapabilityFlags::SECURE_CONNECTION != 0 {
            let rest = usize::from(auth_data_len).saturating_sub(8).max(13);
            // part 2 payload, then the boundary byte the server always sends
            out.extend_from_slice(&b"ijklmnopqrstuvwxyz"[..rest - 1]);
            out.push(0);
        }
        if caps & CapabilityFlags::PLUGIN_AUTH != 0 {
            if let Some(name) = plugin {
                out.extend_from_slice(name.as_bytes());
                out.push(0);
            }
        }
        out
    }

    #[test]
    fn test_full_greeting() {
        let payload = greeting_payload(BASE_CAPS, 21, Some("mysql_native_password"));
        let g = Greeting::parse(&payload, false).unwrap();
        assert_eq!(g.server_version, "8.0.32");
        assert_eq!(g.connection_id, 1234);
        assert_eq!(g.status, Some(0x0002));
        assert_eq!(g.auth_plugin, "mysql_native_password");
        assert!(g.capabilities.has(CapabilityFlags::PLUGIN_AUTH));
    }

    #[test]
    fn test_challenge_assembly_for_21_byte_plugin_data() {
        // max(13, 21 - 8) = 13, minus the boundary byte: 12 extra bytes.
        let payload = greeting_payload(BASE_CAPS, 21, Some("caching_sha2_password"));
        let g = Greeting::parse(&payload, false).unwrap();
        assert_eq!(g.scramble.len(), 20);
        assert_eq!(&g.scramble[..8], b"abcdefgh");
        assert_eq!(&g.scramble[8..], b"ijklmnopqrst");
    }

    #[test]
    fn test_parse_is_deterministic() {
        let payload = greeting_payload(BASE_CAPS, 21, Some("caching_sha2_password"));
        let a = Greeting::parse(&payload, false).unwrap();
        let b = Greeting::parse(&payload, false).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_short_greeting_ends_after_lower_capabilities() {
        let mut out = vec![10];
        out.extend_from_slice(b"5.5.5\0");
        out.extend_from_slice(&7u32.to_le_bytes());
        out.extend_from_slice(b"12345678");
        out.push(0);
        out.extend_from_slice(&(CapabilityFlags::PROTOCOL_41 as u16).to_le_bytes());

        let g = Greeting::parse(&out, false).unwrap();
        assert_eq!(g.status, None);
        assert_eq!(g.scramble, b"12345678");
        assert_eq!(g.auth_plugin, DEFAULT_AUTH_PLUGIN);
    }

    #[test]
    fn test_missing_protocol_41_fails() {
        let mut out = vec![10];
        out.extend_from_slice(b"4.0.1\0");
        out.extend_from_slice(&7u32.to_le_bytes());
        out.extend_from_slice(b"12345678");
        out.push(0);
        out.extend_from_slice(&0u16.to_le_bytes());

        assert!(matches!(
            Greeting::parse(&out, false),
            Err(ConnError::UnsupportedServer)
        ));
    }

    #[test]
    fn test_err_packet_greeting() {
        let mut payload = vec![0xff, 0x10, 0x04];
        payload.extend_from_slice(b"Too many connections");
        match Greeting::parse(&payload, false) {
            Err(ConnError::ServerError { code, message, .. }) => {
                assert_eq!(code, 1040);
                assert_eq!(message, "Too many connections");
            }
            other => panic!("expected ServerError, got {other:?}"),
        }
    }

    #[test]
    fn test_x_protocol_hint() {
        let err = Greeting::parse(&[11, 0, 0, 0], false).unwrap_err();
        assert!(err.to_string().contains("X Protocol"));
    }

    #[test]
    fn test_plain_version_mismatch() {
        let err = Greeting::parse(&[9, 0, 0, 0], false).unwrap_err();
        assert!(matches!(err, ConnError::ProtocolMismatch { version: 9, .. }));
        assert!(!err.to_string().contains("X Protocol"));
    }

    #[test]
    fn test_unterminated_version_string() {
        let payload = [10, b'8', b'.', b'0'];
        let err = Greeting::parse(&payload, false).unwrap_err();
        assert!(matches!(err, ConnError::MalformedPacket(_)));
    }

    #[test]
    fn test_missing_scramble_terminator() {
        let mut out = vec![10];
        out.extend_from_slice(b"8.0.32\0");
        out.extend_from_slice(&1u32.to_le_bytes());
        out.extend_from_slice(b"abcdefgh");
        out.push(0x41); // must be 0x00
        out.extend_from_slice(&(CapabilityFlags::PROTOCOL_41 as u16).to_le_bytes());

        let err = Greeting::parse(&out, false).unwrap_err();
        assert!(matches!(err, ConnError::MalformedPacket(_)));
        assert!(err.to_string().contains("0x41"));
    }

    #[test]
    fn test_auth_data_len_without_plugin_auth() {
        let caps = CapabilityFlags::PROTOCOL_41 | CapabilityFlags::SECURE_CONNECTION;
        let payload = greeting_payload(caps, 21, None);
        let err = Greeting::parse(&payload, false).unwrap_err();
        assert!(matches!(err, ConnError::MalformedPacket(_)));
    }

    #[test]
    fn test_unterminated_plugin_name() {
        let mut payload = greeting_payload(BASE_CAPS, 21, None);
        payload.extend_from_slice(b"mysql_native_password"); // no NUL
        let err = Greeting::parse(&payload, false).unwrap_err();
        assert!(matches!(err, ConnError::MalformedPacket(_)));
    }

    #[test]
    fn test_tls_required_but_unsupported() {
        let payload = greeting_payload(BASE_CAPS, 21, Some("mysql_native_password"));
        assert!(matches!(
            Greeting::parse(&payload, true),
            Err(ConnError::TlsUnsupportedByServer)
        ));

        let with_ssl = greeting_payload(
            BASE_CAPS | CapabilityFlags::SSL,
            21,
            Some("mysql_native_password"),
        );
        assert!(Greeting::parse(&with_ssl, true).is_ok());
    }

    proptest! {
        /// Parsing arbitrary bytes must fail cleanly, never panic.
        #[test]
        fn test_parse_is_total(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let _ = Greeting::parse(&data, false);
            let _ = Greeting::parse(&data, true);
        }
    }
}
