// TSPV - Sequence-tracked telemetry ingestion
// Copyright (c) 2025 David Martin Venti
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.


//! Sequence tracking and gap recovery
//!
//! [`SequenceTracker`] owns the cross-packet state and decides, for each
//! decoded packet, whether to discard it, deliver it, or first backfill the
//! ids it skipped over.
//!
//! ```text
//! decode ──invalid──▶ log, drop
//!   │
//!   valid
//!   ├── latest reading < watermark ──▶ stale, drop
//!   ├── id == current.next() ────────▶ deliver
//!   └── gap ──▶ backfill current+1 .. id-1 ──▶ deliver
//! ```

use chrono::{DateTime, Utc};
use log::{debug, trace};

use crate::config::ProcessorConfig;
use crate::decoder::PacketDecoder;
use crate::device::DeviceGateway;
use crate::error::DecodeError;
use crate::logger::{EventCode, PacketEvent, PacketLogger, Severity};
use crate::protocol::ValidPacket;
use crate::sequence::SequenceId;

/// Cross-packet state, mutated only by deliveries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerState {
    /// Sequence id of the most recently delivered packet
    pub current_sequence_id: SequenceId,
    /// Latest reading timestamp delivered so far
    pub last_delivered: DateTime<Utc>,
}

impl Default for TrackerState {
    fn default() -> Self {
        Self {
            current_sequence_id: SequenceId::LATEST,
            last_delivered: DateTime::<Utc>::MIN_UTC,
        }
    }
}

/// Tracker lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerPhase {
    /// No baseline adopted yet
    #[default]
    Uninitialized,
    /// A baseline packet has been delivered
    Tracking,
}

/// Counters about tracker activity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerStats {
    /// Packets delivered (live, baseline and backfilled)
    pub packets_delivered: u64,
    /// Readings handed to the device sink
    pub readings_posted: u64,
    /// Live packets discarded as stale
    pub stale_discarded: u64,
    /// Live packets that failed to decode
    pub rejected: u64,
    /// Backfill requests issued
    pub backfill_requested: u64,
    /// Backfilled packets delivered
    pub backfill_recovered: u64,
}

/// What happened to one incoming packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketOutcome {
    /// The packet was delivered, after backfilling `requested` ids of which
    /// `recovered` were delivered too
    Delivered { requested: usize, recovered: usize },
    /// Older than what was already delivered
    Stale,
    /// Failed to decode
    Rejected(DecodeError),
}

impl PacketOutcome {
    /// Check if the packet reached the sink
    pub fn is_delivered(&self) -> bool {
        matches!(self, PacketOutcome::Delivered { .. })
    }
}

/// Stateful packet sequencer for one device
#[derive(Debug)]
pub struct SequenceTracker<D, L> {
    device: D,
    logger: L,
    decoder: PacketDecoder,
    max_backfill: Option<u8>,
    state: TrackerState,
    phase: TrackerPhase,
    stats: TrackerStats,
}

impl<D: DeviceGateway, L: PacketLogger> SequenceTracker<D, L> {
    /// Create a tracker with the default configuration
    pub fn new(device: D, logger: L) -> Self {
        Self::with_config(device, logger, &ProcessorConfig::default())
    }

    /// Create a tracker with a custom configuration
    pub fn with_config(device: D, logger: L, config: &ProcessorConfig) -> Self {
        Self {
            device,
            logger,
            decoder: PacketDecoder::new(config.packet_length),
            max_backfill: config.max_backfill,
            state: TrackerState::default(),
            phase: TrackerPhase::Uninitialized,
            stats: TrackerStats::default(),
        }
    }

    /// Fetch the most recent packet and adopt it as the baseline
    ///
    /// The baseline bypasses the staleness check. On failure the tracker
    /// stays uninitialized and live packets are judged against the default
    /// state.
    pub fn start(&mut self) -> PacketOutcome {
        let raw = self.device.request_old_packet(SequenceId::LATEST);
        match self.decoder.try_decode(raw.as_deref()) {
            Ok(baseline) => {
                debug!(
                    "adopting baseline {} (v{}, base {})",
                    baseline.sequence_id, baseline.version, baseline.base_timestamp
                );
                self.deliver(&baseline);
                PacketOutcome::Delivered {
                    requested: 0,
                    recovered: 0,
                }
            }
            Err(reason) => self.reject(reason),
        }
    }

    /// Process one pushed packet end-to-end
    pub fn on_packet_received(&mut self, raw: &[u8]) -> PacketOutcome {
        let packet = match self.decoder.try_decode(Some(raw)) {
            Ok(packet) => packet,
            Err(reason) => return self.reject(reason),
        };

        if packet.latest_timestamp() < self.state.last_delivered {
            trace!(
                "discarding stale packet {} ({} < {})",
                packet.sequence_id,
                packet.latest_timestamp(),
                self.state.last_delivered
            );
            self.stats.stale_discarded += 1;
            return PacketOutcome::Stale;
        }

        if self.state.current_sequence_id.is_next(packet.sequence_id) {
            self.deliver(&packet);
            return PacketOutcome::Delivered {
                requested: 0,
                recovered: 0,
            };
        }

        let (requested, recovered) = self.backfill(packet.sequence_id);
        self.deliver(&packet);
        PacketOutcome::Delivered {
            requested,
            recovered,
        }
    }

    /// Request and replay every id between the current one and `target`
    fn backfill(&mut self, target: SequenceId) -> (usize, usize) {
        let from = self.state.current_sequence_id;
        let mut gap = from.missing_between(target);

        if let Some(max) = self.max_backfill {
            let (kept, skipped) = gap.keep_newest(max);
            if skipped > 0 {
                self.logger.log(PacketEvent::new(
                    EventCode::BackfillAbandoned,
                    Severity::Warning,
                    format!("{} missing ids before {} not requested", skipped, target),
                    format!("gap {} -> {} exceeds backfill limit {}", from, target, max),
                ));
            }
            gap = kept;
        }

        debug!("gap {} -> {}: requesting {} packets", from, target, gap.len());

        let mut requested = 0;
        let mut recovered = 0;
        for id in gap {
            requested += 1;
            self.stats.backfill_requested += 1;

            let raw = self.device.request_old_packet(id);
            match self.decoder.try_decode(raw.as_deref()) {
                Ok(packet) if packet.latest_timestamp() >= self.state.last_delivered => {
                    self.deliver(&packet);
                    self.stats.backfill_recovered += 1;
                    recovered += 1;
                }
                Ok(packet) => {
                    trace!("backfilled packet {} is stale, skipping", packet.sequence_id);
                }
                Err(reason) => {
                    self.logger.log(PacketEvent::new(
                        EventCode::BackfillFailure,
                        Severity::Warning,
                        reason.to_string(),
                        format!("backfill of {}", id),
                    ));
                }
            }
        }

        (requested, recovered)
    }

    fn deliver(&mut self, packet: &ValidPacket) {
        self.state.current_sequence_id = packet.sequence_id;

        for reading in &packet.readings {
            self.device
                .post_reading(reading.status, reading.offset_seconds, reading.value);
            self.stats.readings_posted += 1;
        }

        self.state.last_delivered = self.state.last_delivered.max(packet.latest_timestamp());
        self.stats.packets_delivered += 1;
        self.phase = TrackerPhase::Tracking;
    }

    fn reject(&mut self, reason: DecodeError) -> PacketOutcome {
        self.stats.rejected += 1;
        self.logger.log(PacketEvent::decode_failure(&reason));
        PacketOutcome::Rejected(reason)
    }

    /// Current cross-packet state
    pub fn state(&self) -> TrackerState {
        self.state
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> TrackerPhase {
        self.phase
    }

    /// Activity counters
    pub fn stats(&self) -> &TrackerStats {
        &self.stats
    }

    /// Borrow the device
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Mutably borrow the device
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Borrow the logger
    pub fn logger(&self) -> &L {
        &self.logger
    }

    /// Consume the tracker, returning its collaborators
    pub fn into_parts(self) -> (D, L) {
        (self.device, self.logger)
    }
}
