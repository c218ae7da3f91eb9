//! Length-encoded integers and strings.
//!
//! The variable-width integer encoding used throughout the binary
//! protocol: values below 251 fit in one byte, larger values carry a
//! marker byte (`0xfc`/`0xfd`/`0xfe`) followed by 2, 3 or 8 little-endian
//! bytes. A length-encoded string is a length-encoded integer followed by
//! that many raw bytes.

use crate::error::{ConnError, Result};

/// Append a length-encoded integer to a buffer.
pub fn write_int(buf: &mut Vec<u8>, value: u64) {
    match value {
        0..=250 => buf.push(value as u8),
        251..=0xffff => {
            buf.push(0xfc);
            buf.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xff_ffff => {
            buf.push(0xfd);
            buf.extend_from_slice(&(value as u32).to_le_bytes()[..3]);
        }
        _ => {
            buf.push(0xfe);
            buf.extend_from_slice(&value.to_le_bytes());
        }
    }
}

/// Number of bytes `write_int` would append for `value`.
pub fn int_len(value: u64) -> usize {
    match value {
        0..=250 => 1,
        251..=0xffff => 3,
        0x1_0000..=0xff_ffff => 4,
        _ => 9,
    }
}

/// Append a length-encoded string (length prefix + raw bytes).
pub fn write_str(buf: &mut Vec<u8>, s: &[u8]) {
    write_int(buf, s.len() as u64);
    buf.extend_from_slice(s);
}

/// Read a length-encoded integer, returning `(value, bytes_consumed)`.
pub fn read_int(data: &[u8]) -> Result<(u64, usize)> {
    let first = *data
        .first()
        .ok_or_else(|| ConnError::MalformedPacket("empty length-encoded integer".to_string()))?;
    let need = match first {
        0..=250 => return Ok((u64::from(first), 1)),
        0xfc => 2,
        0xfd => 3,
        0xfe => 8,
        other => {
            return Err(ConnError::MalformedPacket(format!(
                "invalid length-encoded integer marker {other:#04x}"
            )));
        }
    };
    let rest = &data[1..];
    if rest.len() < need {
        return Err(ConnError::MalformedPacket(format!(
            "length-encoded integer truncated: need {need} bytes, have {}",
            rest.len()
        )));
    }
    let mut le = [0u8; 8];
    le[..need].copy_from_slice(&rest[..need]);
    Ok((u64::from_le_bytes(le), 1 + need))
}

/// Read a length-encoded string, returning `(bytes, bytes_consumed)`.
pub fn read_str(data: &[u8]) -> Result<(&[u8], usize)> {
    let (len, consumed) = read_int(data)?;
    let len = usize::try_from(len)
        .map_err(|_| ConnError::MalformedPacket("length-encoded string too long".to_string()))?;
    let rest = &data[consumed..];
    if rest.len() < len {
        return Err(ConnError::MalformedPacket(format!(
            "length-encoded string truncated: need {len} bytes, have {}",
            rest.len()
        )));
    }
    Ok((&rest[..len], consumed + len))
}
