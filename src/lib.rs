//! # TSPV - Sequence-tracked telemetry ingestion
//!
//! Ingests fixed-layout binary packets pushed by a remote field device, each
//! carrying two sensor readings (TSPV: time, status, process value) under an
//! 8-bit rolling sequence id.
//!
//! ## Key Features
//!
//! - **Strict decoding**: exact 20-byte layout, typed failures
//! - **Gap recovery**: missing ids are backfilled from the device, oldest first
//! - **Wraparound aware**: ids cycle through 1..255, 0 asks for "latest"
//! - **Stale filtering**: nothing older than what was delivered goes out again
//!
//! ## Quick Start
//!
//! ```rust
//! use tspv::{MemoryDevice, MemoryLogger, SequenceId, SequenceTracker};
//!
//! // The device answers "latest packet" with packet #4
//! let mut device = MemoryDevice::new();
//! device.set_latest(vec![
//!     0x01, 0x04, 0x62, 0x55, 0x76, 0x5E,
//!     0x02, 0x20, 0x02, 0x4D, 0x06, 0x9E, 0x3F,
//!     0x03, 0x10, 0x0A, 0x4D, 0x06, 0x9E, 0x3F,
//! ]);
//!
//! // Adopt the baseline
//! let mut tracker = SequenceTracker::new(device, MemoryLogger::default());
//! assert!(tracker.start().is_delivered());
//! assert_eq!(tracker.state().current_sequence_id, SequenceId::new(4));
//! assert_eq!(tracker.device().posted().len(), 2);
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: Packet and reading types, wire layout
//! - [`decoder`]: Packet and reading decoding
//! - [`sequence`]: Cyclic sequence-id arithmetic
//! - [`tracker`]: Sequence tracking and backfill state machine
//! - [`device`]: Device gateway abstraction and push channel
//! - [`logger`]: Packet event logging
//! - [`processor`]: Run loop and stop signal
//! - [`config`]: Processor configuration

// Modules
pub mod config;
pub mod decoder;
pub mod device;
pub mod error;
pub mod logger;
pub mod processor;
pub mod protocol;
pub mod sequence;
pub mod tracker;

// Re-exports for convenient access
pub use config::ProcessorConfig;
pub use decoder::{PacketDecoder, ReadingDecoder};
pub use device::{
    push_channel, DeviceGateway, MemoryDevice, Notification, PacketReceiver, PacketSender,
    PostedReading,
};
pub use error::{DecodeError, ProcessorError, Result, TspvError};
pub use logger::{EventCode, LogCrateLogger, MemoryLogger, PacketEvent, PacketLogger, Severity};
pub use processor::{Processor, ProcessorHandle, StopSignal};
pub use protocol::{Packet, Reading, StatusBits, ValidPacket, PACKET_LENGTH, READING_SIZE};
pub use sequence::{MissingIds, SequenceId};
pub use tracker::{PacketOutcome, SequenceTracker, TrackerPhase, TrackerState, TrackerStats};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_basic_decode() {
        let mut bytes = [0u8; PACKET_LENGTH];
        bytes[1] = 9;
        let packet = PacketDecoder::default().decode(Some(&bytes));
        assert_eq!(
            packet.as_valid().map(|p| p.sequence_id),
            Some(SequenceId::new(9))
        );
    }
}
