//! Decoder module
//!
//! This module turns raw device buffers into validated [`Packet`]s.
//! Decoding is pure: nothing of the input buffer is retained.

use chrono::{DateTime, TimeDelta, Utc};

use crate::error::DecodeError;
use crate::protocol::{
    Packet, Reading, ValidPacket, HEADER_SIZE, PACKET_LENGTH, READINGS_PER_PACKET, READING_SIZE,
    SEQUENCE_OFFSET, TIMESTAMP_OFFSET, VERSION_OFFSET,
};
use crate::sequence::SequenceId;

/// Decoder for one 7-byte reading sub-record
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadingDecoder;

impl ReadingDecoder {
    /// Decode a reading relative to the packet's base timestamp
    pub fn decode(block: &[u8; READING_SIZE], base: DateTime<Utc>) -> Reading {
        let offset_seconds = block[2];
        Reading {
            status: [block[0], block[1]],
            offset_seconds,
            timestamp: base + TimeDelta::seconds(i64::from(offset_seconds)),
            value: f32::from_le_bytes([block[3], block[4], block[5], block[6]]),
        }
    }
}

/// Decoder for whole device packets
#[derive(Debug, Clone)]
pub struct PacketDecoder {
    /// Exact buffer length accepted
    expected_length: usize,
}

impl PacketDecoder {
    /// Create a decoder accepting buffers of exactly `expected_length` bytes
    pub fn new(expected_length: usize) -> Self {
        Self { expected_length }
    }

    /// Configured packet length
    pub fn expected_length(&self) -> usize {
        self.expected_length
    }

    /// Decode a buffer into a [`Packet`]
    ///
    /// `None` stands for "no data supplied".
    pub fn decode(&self, buffer: Option<&[u8]>) -> Packet {
        self.try_decode(buffer).into()
    }

    /// Decode a buffer, reporting failures as [`DecodeError`]
    pub fn try_decode(&self, buffer: Option<&[u8]>) -> Result<ValidPacket, DecodeError> {
        let bytes = buffer.ok_or(DecodeError::MissingPacket)?;

        // Layout needs at least a full packet even if configured shorter
        if bytes.len() != self.expected_length || bytes.len() < PACKET_LENGTH {
            return Err(DecodeError::LengthMismatch {
                actual: bytes.len(),
                expected: self.expected_length,
            });
        }

        let epoch = u32::from_be_bytes([
            bytes[TIMESTAMP_OFFSET],
            bytes[TIMESTAMP_OFFSET + 1],
            bytes[TIMESTAMP_OFFSET + 2],
            bytes[TIMESTAMP_OFFSET + 3],
        ]);
        let base_timestamp = epoch_to_datetime(epoch);

        let tail = &bytes[bytes.len() - READINGS_PER_PACKET * READING_SIZE..];

        Ok(ValidPacket {
            version: bytes[VERSION_OFFSET],
            sequence_id: SequenceId::new(bytes[SEQUENCE_OFFSET]),
            base_timestamp,
            readings: [
                ReadingDecoder::decode(&reading_block(tail, 0), base_timestamp),
                ReadingDecoder::decode(&reading_block(tail, 1), base_timestamp),
            ],
        })
    }
}

impl Default for PacketDecoder {
    fn default() -> Self {
        Self::new(PACKET_LENGTH)
    }
}

/// Any u32 second count is a representable instant
fn epoch_to_datetime(epoch: u32) -> DateTime<Utc> {
    DateTime::from_timestamp(i64::from(epoch), 0).unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Copy the `index`-th reading sub-record out of the readings tail
fn reading_block(tail: &[u8], index: usize) -> [u8; READING_SIZE] {
    let mut block = [0u8; READING_SIZE];
    block.copy_from_slice(&tail[index * READING_SIZE..(index + 1) * READING_SIZE]);
    block
}

const _: () = assert!(HEADER_SIZE + READINGS_PER_PACKET * READING_SIZE == PACKET_LENGTH);

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Packet as emitted by the reference device
    fn reference_packet() -> Vec<u8> {
        vec![
            0x01, // version
            0x04, // sequence id
            0x62, 0x55, 0x76, 0x5E, // base epoch seconds
            0x02, 0x20, 0x02, 0x4D, 0x06, 0x9E, 0x3F, // reading A
            0x03, 0x10, 0x0A, 0x4D, 0x06, 0x9E, 0x3F, // reading B
        ]
    }

    #[test]
    fn test_missing_buffer() {
        let packet = PacketDecoder::default().decode(None);
        assert_eq!(
            packet,
            Packet::Invalid {
                reason: DecodeError::MissingPacket
            }
        );
    }

    #[test]
    fn test_invalid_lengths() {
        let decoder = PacketDecoder::default();
        for len in [0usize, 1, 6, 19, 21, 40] {
            let buffer = vec![0x01; len];
            match decoder.decode(Some(&buffer)) {
                Packet::Invalid { reason } => {
                    assert_eq!(reason.to_string(), format!("invalid length {} should be 20", len));
                }
                Packet::Valid(_) => panic!("length {} should be rejected", len),
            }
        }
    }

    #[test]
    fn test_decode_reference_packet() {
        let packet = PacketDecoder::default()
            .try_decode(Some(&reference_packet()))
            .unwrap();

        assert_eq!(packet.version, 1);
        assert_eq!(packet.sequence_id, SequenceId::new(4));
        assert_eq!(packet.base_timestamp.timestamp(), 0x6255_765E);

        let [a, b] = packet.readings;
        assert_eq!(a.status, [0x02, 0x20]);
        assert_eq!(a.offset_seconds, 2);
        assert_eq!(a.timestamp, packet.base_timestamp + TimeDelta::seconds(2));
        assert_relative_eq!(a.value, 1.2345, epsilon = 1e-4);

        assert_eq!(b.status, [0x03, 0x10]);
        assert_eq!(b.offset_seconds, 10);
        assert_eq!(b.timestamp, packet.base_timestamp + TimeDelta::seconds(10));
        assert_relative_eq!(b.value, 1.2345, epsilon = 1e-4);
    }

    #[test]
    fn test_reading_decoder() {
        let base = DateTime::from_timestamp(1_695_038_400, 0).unwrap();
        let mut block = [0xAA, 0x55, 0xFF, 0, 0, 0, 0];
        block[3..7].copy_from_slice(&(-3.75f32).to_le_bytes());

        let reading = ReadingDecoder::decode(&block, base);
        assert_eq!(reading.status, [0xAA, 0x55]);
        assert_eq!(reading.offset_seconds, 255);
        assert_eq!(reading.timestamp, base + TimeDelta::seconds(255));
        assert_eq!(reading.value, -3.75);
    }

    #[test]
    fn test_max_epoch() {
        let mut bytes = reference_packet();
        bytes[2..6].copy_from_slice(&u32::MAX.to_be_bytes());
        let packet = PacketDecoder::default().try_decode(Some(&bytes)).unwrap();
        assert_eq!(packet.base_timestamp.timestamp(), i64::from(u32::MAX));
    }

    #[test]
    fn test_custom_length_reads_readings_from_tail() {
        let mut bytes = reference_packet()[..6].to_vec();
        bytes.extend_from_slice(&[0xEE; 4]);
        bytes.extend_from_slice(&reference_packet()[6..]);
        let decoder = PacketDecoder::new(24);

        let packet = decoder.try_decode(Some(&bytes)).unwrap();
        assert_eq!(packet.sequence_id, SequenceId::new(4));
        assert_eq!(packet.readings[0].offset_seconds, 2);
        assert_eq!(packet.readings[1].offset_seconds, 10);

        // Shorter than the fixed layout can never decode
        let short = PacketDecoder::new(12);
        assert!(matches!(
            short.try_decode(Some(&bytes[..12])),
            Err(DecodeError::LengthMismatch {
                actual: 12,
                expected: 12
            })
        ));
    }

    #[test]
    fn test_roundtrip_through_to_bytes() {
        let packet = PacketDecoder::default()
            .try_decode(Some(&reference_packet()))
            .unwrap();
        assert_eq!(packet.to_bytes().to_vec(), reference_packet());
    }
}
