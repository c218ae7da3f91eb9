//! Length-prefixed packet framing.
//!
//! Every protocol payload travels in packets of
//! `<length:3, LE><sequence:1><payload>`. Payloads of 16 MiB or more are
//! split across consecutive packets; a packet shorter than the maximum
//! terminates the payload (which can mean a trailing empty packet for
//! payloads that are an exact multiple of the limit).
//!
//! `PacketStream` owns the sequence counter. The counter runs across the
//! whole connection phase, including the mid-handshake TLS swap, which
//! replaces the underlying stream via [`PacketStream::map_stream`] without
//! touching it.

pub mod net;

use std::io::{Read, Write};

use tracing::trace;

use crate::error::{ConnError, Result};

/// Largest payload one packet frame can carry.
pub const MAX_PAYLOAD_LEN: usize = 0x00ff_ffff;

/// A framed packet stream over any byte stream.
#[derive(Debug)]
pub struct PacketStream<S> {
    stream: S,
    seq: u8,
}

impl<S> PacketStream<S> {
    /// Wrap a stream, starting the sequence counter at zero.
    pub fn new(stream: S) -> Self {
        Self { stream, seq: 0 }
    }

    /// Next expected sequence number.
    pub fn sequence(&self) -> u8 {
        self.seq
    }

    /// Reset the sequence counter (each later-phase command starts at 0).
    pub fn reset_sequence(&mut self) {
        self.seq = 0;
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Unwrap into the underlying stream, discarding framing state.
    pub fn into_inner(self) -> S {
        self.stream
    }

    /// Replace the underlying stream, threading the sequence counter
    /// through unchanged.
    ///
    /// The old stream is moved into `f`, which must hand back its
    /// successor; there is no moment at which two owners exist. This is
    /// how the TLS upgrade swaps the transport without resetting the
    /// packet sequence.
    pub fn map_stream<T, F>(self, f: F) -> Result<PacketStream<T>>
    where
        F: FnOnce(S) -> Result<T>,
    {
        let Self { stream, seq } = self;
        Ok(PacketStream {
            stream: f(stream)?,
            seq,
        })
    }
}

impl<S: Read + Write> PacketStream<S> {
    /// Read one fully reassembled payload, verifying sequence numbers.
    pub fn read_packet(&mut self) -> Result<Vec<u8>> {
        let mut payload = Vec::new();
        loop {
            let mut header = [0u8; 4];
            self.stream.read_exact(&mut header)?;
            let len = u32::from_le_bytes([header[0], header[1], header[2], 0]) as usize;
            if header[3] != self.seq {
                return Err(ConnError::MalformedPacket(format!(
                    "packets out of order: got sequence {}, expected {}",
                    header[3], self.seq
                )));
            }
            self.seq = self.seq.wrapping_add(1);

            let start = payload.len();
            payload.resize(start + len, 0);
            self.stream.read_exact(&mut payload[start..])?;

            if len < MAX_PAYLOAD_LEN {
                break;
            }
        }
        trace!(len = payload.len(), seq = self.seq, "read packet");
        Ok(payload)
    }

    /// Write one payload, splitting at the frame limit and stamping
    /// sequence numbers.
    pub fn write_packet(&mut self, payload: &[u8]) -> Result<()> {
        let mut rest = payload;
        loop {
            let chunk_len = rest.len().min(MAX_PAYLOAD_LEN);
            let (chunk, tail) = rest.split_at(chunk_len);

            let mut header = [0u8; 4];
            header[..3].copy_from_slice(&(chunk_len as u32).to_le_bytes()[..3]);
            header[3] = self.seq;
            self.seq = self.seq.wrapping_add(1);

            self.stream.write_all(&header)?;
            self.stream.write_all(chunk)?;

            rest = tail;
            if chunk_len < MAX_PAYLOAD_LEN {
                break;
            }
        }
        self.stream.flush()?;
        trace!(len = payload.len(), seq = self.seq, "wrote packet");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    /// One-directional test stream: reads from a script, collects writes.
    struct Scripted {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Scripted {
        fn new(input: Vec<u8>) -> Self {
            Self {
                input: Cursor::new(input),
                output: Vec::new(),
            }
        }
    }

    impl Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn frame(seq: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes()[..3]);
        out.push(seq);
        out.extend_from_slice(payload);
        out
    }

    #[test]
    fn test_read_single_packet() {
        let mut pipe = PacketStream::new(Scripted::new(frame(0, b"hello")));
        assert_eq!(pipe.read_packet().unwrap(), b"hello");
        assert_eq!(pipe.sequence(), 1);
    }

    #[test]
    fn test_read_sequence_mismatch() {
        let mut pipe = PacketStream::new(Scripted::new(frame(3, b"hello")));
        let err = pipe.read_packet().unwrap_err();
        assert!(matches!(err, ConnError::MalformedPacket(_)));
        assert!(err.to_string().contains("sequence 3"));
    }

    #[test]
    fn test_write_single_packet() {
        let mut pipe = PacketStream::new(Scripted::new(Vec::new()));
        pipe.write_packet(b"abc").unwrap();
        assert_eq!(pipe.into_inner().output, frame(0, b"abc"));
    }

    #[test]
    fn test_write_empty_packet() {
        let mut pipe = PacketStream::new(Scripted::new(Vec::new()));
        pipe.write_packet(b"").unwrap();
        let out = pipe.into_inner().output;
        assert_eq!(out, vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_sequence_advances_per_packet() {
        let mut pipe = PacketStream::new(Scripted::new(Vec::new()));
        pipe.write_packet(b"a").unwrap();
        pipe.write_packet(b"b").unwrap();
        assert_eq!(pipe.sequence(), 2);
        let out = pipe.into_inner().output;
        let mut expected = frame(0, b"a");
        expected.extend_from_slice(&frame(1, b"b"));
        assert_eq!(out, expected);
    }

    #[test]
    fn test_split_at_frame_limit() {
        // A payload of exactly the limit is followed by an empty packet.
        let payload = vec![0x5a; MAX_PAYLOAD_LEN];
        let mut pipe = PacketStream::new(Scripted::new(Vec::new()));
        pipe.write_packet(&payload).unwrap();
        let out = pipe.into_inner().output;
        assert_eq!(out.len(), 4 + MAX_PAYLOAD_LEN + 4);
        assert_eq!(&out[..4], &[0xff, 0xff, 0xff, 0]);
        assert_eq!(&out[4 + MAX_PAYLOAD_LEN..], &[0, 0, 0, 1]);
    }

    #[test]
    fn test_reassemble_split_payload() {
        let mut input = Vec::new();
        input.extend_from_slice(&frame(0, &vec![0x11; MAX_PAYLOAD_LEN]));
        input.extend_from_slice(&frame(1, b"tail"));
        let mut pipe = PacketStream::new(Scripted::new(input));
        let payload = pipe.read_packet().unwrap();
        assert_eq!(payload.len(), MAX_PAYLOAD_LEN + 4);
        assert_eq!(&payload[MAX_PAYLOAD_LEN..], b"tail");
        assert_eq!(pipe.sequence(), 2);
    }

    #[test]
    fn test_map_stream_preserves_sequence() {
        let mut pipe = PacketStream::new(Scripted::new(Vec::new()));
        pipe.write_packet(b"first").unwrap();
        let seq_before = pipe.sequence();
        let pipe = pipe
            .map_stream(|s| Ok(Scripted::new(s.output)))
            .unwrap();
        assert_eq!(pipe.sequence(), seq_before);
    }
}
