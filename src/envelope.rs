//! # Wire envelope
//!
//! The fixed-size framing every transport speaks, regardless of which
//! concrete codec is negotiated for the payload. The core only ever
//! touches the header fields; `payload` is an opaque byte span handed
//! to and from whatever `Encoding` was negotiated.

use serde::{Deserialize, Serialize};

/// Distinguishes request, response and one-way deliveries (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    /// A call awaiting a response.
    SendRequest = 0,
    /// The response to a prior `SendRequest`.
    SendResponse = 1,
    /// A fire-and-forget delivery; no response will follow.
    Post = 2,
    /// Transport-level close notification.
    Close = 3,
}

impl Direction {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Direction::SendRequest),
            1 => Some(Direction::SendResponse),
            2 => Some(Direction::Post),
            3 => Some(Direction::Close),
            _ => None,
        }
    }
}

/// Wire codec tag. The core stores this but never decodes the bytes
/// it describes — concrete codecs are external collaborators (§1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    YasBinary,
    YasCompressedBinary,
    YasJson,
    ProtocolBuffers,
}

/// The bit-exact fixed prefix described in §6:
///
/// ```text
/// offset  field              size
///  0      version            uint8
///  1      direction          uint8
///  2      reserved           uint16
///  4      sequence           uint64  (little-endian)
/// 12      payload_size       uint32
/// 16      payload[payload_size]
/// ```
pub const HEADER_LEN: usize = 16;

/// A framed message: the fixed header plus its payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub version: u8,
    pub direction: Direction,
    pub sequence: u64,
    pub payload: Vec<u8>,
}

impl Envelope {
    /// Build an envelope, taking the payload size from the slice
    /// itself rather than requiring the caller to track it.
    pub fn new(version: u8, direction: Direction, sequence: u64, payload: Vec<u8>) -> Self {
        Self { version, direction, sequence, payload }
    }

    /// Serialize to the bit-exact wire layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.push(self.version);
        out.push(self.direction as u8);
        out.extend_from_slice(&0u16.to_le_bytes()); // reserved
        out.extend_from_slice(&self.sequence.to_le_bytes());
        out.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Parse the bit-exact wire layout, validating that the declared
    /// `payload_size` matches the bytes actually present.
    pub fn decode(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        if bytes.len() < HEADER_LEN {
            return Err(EnvelopeError::Truncated { have: bytes.len(), need: HEADER_LEN });
        }
        let version = bytes[0];
        let direction = Direction::from_u8(bytes[1]).ok_or(EnvelopeError::UnknownDirection(bytes[1]))?;
        let sequence = u64::from_le_bytes(bytes[4..12].try_into().unwrap());
        let payload_size = u32::from_le_bytes(bytes[12..16].try_into().unwrap()) as usize;
        let payload = &bytes[HEADER_LEN..];
        if payload.len() != payload_size {
            return Err(EnvelopeError::SizeMismatch { declared: payload_size, actual: payload.len() });
        }
        Ok(Self { version, direction, sequence, payload: payload.to_vec() })
    }
}

/// Framing-level failures; these are the "protocol-level framing
/// violation" class in §7, fatal to the transport that produced them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("truncated envelope: have {have} bytes, need at least {need}")]
    Truncated { have: usize, need: usize },
    #[error("unknown direction byte: {0}")]
    UnknownDirection(u8),
    #[error("declared payload size {declared} does not match actual {actual}")]
    SizeMismatch { declared: usize, actual: usize },
}

/// The decoded payload wrapper carried inside [`Envelope::payload`]
/// once the negotiated encoding has been applied: a fingerprint of
/// the payload contents plus the opaque data the core never inspects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopePayload {
    pub payload_fingerprint: u64,
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trips() {
        let env = Envelope::new(1, Direction::SendRequest, 42, vec![1, 2, 3, 4]);
        let bytes = env.encode();
        let decoded = Envelope::decode(&bytes).unwrap();
        assert_eq!(env, decoded);
    }

    #[test]
    fn decode_rejects_truncated_header() {
        let err = Envelope::decode(&[0u8; 8]).unwrap_err();
        assert!(matches!(err, EnvelopeError::Truncated { .. }));
    }

    #[test]
    fn decode_rejects_size_mismatch() {
        let mut bytes = Envelope::new(1, Direction::Post, 1, vec![9, 9]).encode();
        // Lie about the payload size.
        bytes[12..16].copy_from_slice(&5u32.to_le_bytes());
        let err = Envelope::decode(&bytes).unwrap_err();
        assert!(matches!(err, EnvelopeError::SizeMismatch { .. }));
    }

    #[test]
    fn decode_rejects_unknown_direction() {
        let mut bytes = Envelope::new(1, Direction::Post, 1, vec![]).encode();
        bytes[1] = 200;
        let err = Envelope::decode(&bytes).unwrap_err();
        assert!(matches!(err, EnvelopeError::UnknownDirection(200)));
    }
}
