//! Wire format for RCON packets.
//!
//! ```text
//! offset  size  field
//! 0       4     size (little-endian i32), byte count of everything below
//! 4       4     id   (little-endian i32)
//! 8       4     type (little-endian i32)
//! 12      n     body (n = size - 10)
//! 12+n    2     terminator (two zero bytes)
//! ```

use crate::RconError;
use std::borrow::Cow;

/// Length of the size prefix.
pub const HEADER_LEN: usize = 4;

/// Smallest valid size field: id, type, empty body and terminators.
pub const MIN_PACKET_SIZE: i32 = 10;

/// Largest size field accepted from a server.
pub const MAX_PACKET_SIZE: i32 = 4096;

/// Longest command body, in bytes, that will be sent.
pub const MAX_COMMAND_LEN: usize = MAX_PACKET_SIZE as usize - 1;

const TERMINATOR: [u8; 2] = [0, 0];

/// Packet type field.
///
/// The protocol reuses numeric values between requests and responses, so this is a thin wrapper
/// rather than an enum and unknown values are kept as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PacketType(pub i32);

impl PacketType {
    pub const RESPONSE_VALUE: PacketType = PacketType(0);
    pub const AUTH_RESPONSE: PacketType = PacketType(2);
    pub const EXEC_COMMAND: PacketType = PacketType(2);
    pub const AUTH: PacketType = PacketType(3);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: i32,
    pub kind: PacketType,
    pub body: Vec<u8>,
}

/// Result of [`decode`].
#[derive(Debug, PartialEq, Eq)]
pub enum Decoded {
    /// The buffer does not hold a full packet yet. `needed` is the total number of bytes the frame
    /// is known to require so far.
    Incomplete { needed: usize },

    /// A packet was parsed from the first `len` bytes of the buffer.
    Complete { packet: Packet, len: usize },
}

impl Packet {
    pub fn new(id: i32, kind: PacketType, body: impl Into<Vec<u8>>) -> Self {
        Packet {
            id,
            kind,
            body: body.into(),
        }
    }

    /// Value of the size field for this packet.
    pub fn size(&self) -> i32 {
        (4 + 4 + self.body.len() + TERMINATOR.len()) as i32
    }

    /// Lossy text view of the body, for logging.
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Append the encoded packet to `buf`.
    ///
    /// No length check happens here; callers sending commands validate against
    /// [`MAX_COMMAND_LEN`] first.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        buf.reserve(HEADER_LEN + self.size() as usize);
        buf.extend_from_slice(&self.size().to_le_bytes());
        buf.extend_from_slice(&self.id.to_le_bytes());
        buf.extend_from_slice(&self.kind.0.to_le_bytes());
        buf.extend_from_slice(&self.body);
        buf.extend_from_slice(&TERMINATOR);
    }
}

/// Read and validate the size field.
pub fn frame_size(header: [u8; HEADER_LEN]) -> crate::Result<usize> {
    let size = i32::from_le_bytes(header);
    if !(MIN_PACKET_SIZE..=MAX_PACKET_SIZE).contains(&size) {
        return Err(RconError::InvalidSize { size }.into());
    }
    Ok(size as usize)
}

/// Try to decode one packet from the start of `buf`.
///
/// The size field is validated as soon as it is available, so an out-of-range header fails before
/// any payload bytes are asked for.
pub fn decode(buf: &[u8]) -> crate::Result<Decoded> {
    let Some(header) = buf.get(..HEADER_LEN) else {
        return Ok(Decoded::Incomplete { needed: HEADER_LEN });
    };

    let size = frame_size([header[0], header[1], header[2], header[3]])?;
    let len = HEADER_LEN + size;
    let Some(payload) = buf.get(HEADER_LEN..len) else {
        return Ok(Decoded::Incomplete { needed: len });
    };

    let id = i32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
    let kind = i32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]);

    // Whatever sits in the terminator slots is dropped without inspection.
    let body = payload[8..size - TERMINATOR.len()].to_vec();

    Ok(Decoded::Complete {
        packet: Packet {
            id,
            kind: PacketType(kind),
            body,
        },
        len,
    })
}
