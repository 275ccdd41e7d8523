//! Protocol definitions for TSPV
//!
//! This module defines the core types of the device protocol:
//! - Packet wire layout (20 bytes, fixed)
//! - Readings (TSPV: time, status, process value)
//! - Decode results as a closed sum type
//!
//! ```text
//! offset  len  field
//!      0    1  version
//!      1    1  sequence id
//!      2    4  base epoch seconds (u32, big-endian)
//!      6    7  reading A: status(2) offset(1) value(4, f32 little-endian)
//!     13    7  reading B: status(2) offset(1) value(4, f32 little-endian)
//! ```

use chrono::{DateTime, Utc};

use crate::error::DecodeError;
use crate::sequence::SequenceId;

/// Total packet size in bytes
pub const PACKET_LENGTH: usize = 20;

/// Size of one reading sub-record
pub const READING_SIZE: usize = 7;

/// Number of readings carried by every packet
pub const READINGS_PER_PACKET: usize = 2;

/// Offset of the version byte
pub const VERSION_OFFSET: usize = 0;

/// Offset of the sequence id byte
pub const SEQUENCE_OFFSET: usize = 1;

/// Offset of the big-endian base timestamp
pub const TIMESTAMP_OFFSET: usize = 2;

/// Size of the header preceding the readings
pub const HEADER_SIZE: usize = 6;

/// Raw status bits of a reading, passed through untouched
pub type StatusBits = [u8; 2];

/// One sensor sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Raw status bytes
    pub status: StatusBits,
    /// Seconds after the packet's base timestamp
    pub offset_seconds: u8,
    /// Absolute time of the sample (base + offset)
    pub timestamp: DateTime<Utc>,
    /// Process value
    pub value: f32,
}

impl Reading {
    /// Encode into the 7-byte wire sub-record
    pub fn to_bytes(&self) -> [u8; READING_SIZE] {
        let mut bytes = [0u8; READING_SIZE];
        bytes[0..2].copy_from_slice(&self.status);
        bytes[2] = self.offset_seconds;
        bytes[3..7].copy_from_slice(&self.value.to_le_bytes());
        bytes
    }
}

/// A packet that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidPacket {
    /// Protocol version byte
    pub version: u8,
    /// Rolling sequence id
    pub sequence_id: SequenceId,
    /// Shared timestamp the reading offsets are relative to
    pub base_timestamp: DateTime<Utc>,
    /// Readings in wire order
    pub readings: [Reading; READINGS_PER_PACKET],
}

impl ValidPacket {
    /// Timestamp of the later of the two readings
    pub fn latest_timestamp(&self) -> DateTime<Utc> {
        let [first, second] = &self.readings;
        first.timestamp.max(second.timestamp)
    }

    /// Serialize to the 20-byte wire layout
    ///
    /// Reading timestamps are not encoded; only their offsets are. Base
    /// timestamps before 1970 or past 2106 are clamped to the u32 range.
    pub fn to_bytes(&self) -> [u8; PACKET_LENGTH] {
        let epoch = self.base_timestamp.timestamp().clamp(0, i64::from(u32::MAX)) as u32;

        let mut bytes = [0u8; PACKET_LENGTH];
        bytes[VERSION_OFFSET] = self.version;
        bytes[SEQUENCE_OFFSET] = self.sequence_id.get();
        bytes[TIMESTAMP_OFFSET..HEADER_SIZE].copy_from_slice(&epoch.to_be_bytes());
        for (i, reading) in self.readings.iter().enumerate() {
            let start = HEADER_SIZE + i * READING_SIZE;
            bytes[start..start + READING_SIZE].copy_from_slice(&reading.to_bytes());
        }
        bytes
    }
}

/// Result of decoding a raw buffer
///
/// Closed on purpose: every consumer matches both arms.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Structurally valid packet
    Valid(ValidPacket),
    /// Buffer rejected by the decoder
    Invalid {
        /// Why the buffer was rejected
        reason: DecodeError,
    },
}

impl Packet {
    /// Check if the packet decoded successfully
    pub fn is_valid(&self) -> bool {
        matches!(self, Packet::Valid(_))
    }

    /// Borrow the valid packet, if any
    pub fn as_valid(&self) -> Option<&ValidPacket> {
        match self {
            Packet::Valid(packet) => Some(packet),
            Packet::Invalid { .. } => None,
        }
    }
}

impl From<Result<ValidPacket, DecodeError>> for Packet {
    fn from(result: Result<ValidPacket, DecodeError>) -> Self {
        match result {
            Ok(packet) => Packet::Valid(packet),
            Err(reason) => Packet::Invalid { reason },
        }
    }
}

impl From<Packet> for Result<ValidPacket, DecodeError> {
    fn from(packet: Packet) -> Self {
        match packet {
            Packet::Valid(packet) => Ok(packet),
            Packet::Invalid { reason } => Err(reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn reading(offset: u8, base: DateTime<Utc>) -> Reading {
        Reading {
            status: [0x02, 0x20],
            offset_seconds: offset,
            timestamp: base + TimeDelta::seconds(i64::from(offset)),
            value: 1.2345,
        }
    }

    fn base() -> DateTime<Utc> {
        DateTime::from_timestamp(1_695_038_400, 0).unwrap()
    }

    #[test]
    fn test_latest_timestamp_picks_later_reading() {
        let base = base();
        let packet = ValidPacket {
            version: 1,
            sequence_id: SequenceId::new(4),
            base_timestamp: base,
            readings: [reading(10, base), reading(2, base)],
        };
        assert_eq!(packet.latest_timestamp(), base + TimeDelta::seconds(10));
    }

    #[test]
    fn test_packet_to_bytes_layout() {
        let base = base();
        let packet = ValidPacket {
            version: 1,
            sequence_id: SequenceId::new(4),
            base_timestamp: base,
            readings: [reading(2, base), reading(10, base)],
        };

        let bytes = packet.to_bytes();
        assert_eq!(bytes[0], 0x01);
        assert_eq!(bytes[1], 0x04);
        assert_eq!(&bytes[2..6], &[0x65, 0x08, 0x3B, 0xC0]);
        assert_eq!(&bytes[6..13], &[0x02, 0x20, 0x02, 0x19, 0x04, 0x9E, 0x3F]);
        assert_eq!(bytes[15], 10);
    }

    #[test]
    fn test_packet_result_conversions() {
        let invalid: Packet = Err(DecodeError::MissingPacket).into();
        assert!(!invalid.is_valid());
        assert!(invalid.as_valid().is_none());

        let back: Result<ValidPacket, DecodeError> = invalid.into();
        assert_eq!(back, Err(DecodeError::MissingPacket));
    }
}
