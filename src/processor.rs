// TSPV - Sequence-tracked telemetry ingestion
// Copyright (c) 2025 David Martin Venti
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.


//! Processor run loop
//!
//! The [`Processor`] is the single owner of a [`SequenceTracker`]: it adopts
//! the baseline, then handles pushed packets one at a time until the stop
//! signal is raised or every sender is dropped. Stopping only takes effect
//! between packets.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info};

use crate::config::ProcessorConfig;
use crate::device::{DeviceGateway, Notification, PacketReceiver};
use crate::error::{ProcessorError, Result};
use crate::logger::{EventCode, PacketEvent, PacketLogger, Severity};
use crate::tracker::SequenceTracker;

/// Cooperative stop flag shared between the loop and its controllers
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    stopped: Arc<AtomicBool>,
}

impl StopSignal {
    /// Create a signal that is not raised
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to stop after the packet in flight
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Check if a stop was requested
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

/// Serialized packet processing loop
#[derive(Debug)]
pub struct Processor<D, L> {
    tracker: SequenceTracker<D, L>,
    receiver: PacketReceiver,
    stop: StopSignal,
    tick_interval: Duration,
}

impl<D: DeviceGateway, L: PacketLogger> Processor<D, L> {
    /// Create a processor with the default configuration
    pub fn new(device: D, logger: L, receiver: PacketReceiver) -> Self {
        Self::with_config(device, logger, receiver, ProcessorConfig::default())
    }

    /// Create a processor with a custom configuration
    pub fn with_config(
        device: D,
        logger: L,
        receiver: PacketReceiver,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            tracker: SequenceTracker::with_config(device, logger, &config),
            receiver,
            stop: StopSignal::new(),
            tick_interval: config.tick_interval,
        }
    }

    /// Handle to stop this processor
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Run until stopped, returning the tracker for inspection
    pub fn run(mut self) -> SequenceTracker<D, L> {
        let baseline = self.tracker.start();
        debug!("startup baseline: {:?}", baseline);

        while !self.stop.is_stopped() {
            match self.receiver.wait(self.tick_interval) {
                Notification::Packet(raw) => {
                    let outcome = self.tracker.on_packet_received(&raw);
                    debug!("packet outcome: {:?}", outcome);
                }
                Notification::Idle => {}
                Notification::Closed => {
                    debug!("push channel closed");
                    break;
                }
            }
        }

        let stats = self.tracker.stats();
        info!(
            "processor stopped: {} delivered, {} stale, {} rejected, {}/{} backfilled",
            stats.packets_delivered,
            stats.stale_discarded,
            stats.rejected,
            stats.backfill_recovered,
            stats.backfill_requested
        );

        let logger = self.tracker.logger();
        logger.log(PacketEvent::new(
            EventCode::Stopped,
            Severity::Info,
            "Processor stopped",
            "run loop",
        ));
        logger.flush();

        self.tracker
    }
}

impl<D, L> Processor<D, L>
where
    D: DeviceGateway + Send + 'static,
    L: PacketLogger + 'static,
{
    /// Run the loop on a dedicated thread
    pub fn spawn(self) -> Result<ProcessorHandle<D, L>> {
        let stop = self.stop_signal();
        let join = thread::Builder::new()
            .name("tspv-processor".to_string())
            .spawn(move || self.run())
            .map_err(|e| ProcessorError::Spawn(e.to_string()))?;
        Ok(ProcessorHandle { stop, join })
    }
}

/// Handle to a processor running on its own thread
#[derive(Debug)]
pub struct ProcessorHandle<D, L> {
    stop: StopSignal,
    join: JoinHandle<SequenceTracker<D, L>>,
}

impl<D, L> ProcessorHandle<D, L> {
    /// Signal shared with the running loop
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Check if the loop has exited
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the loop to exit on its own (e.g. all senders dropped)
    pub fn join(self) -> Result<SequenceTracker<D, L>> {
        self.join
            .join()
            .map_err(|_| ProcessorError::WorkerPanicked.into())
    }

    /// Raise the stop signal and wait for the loop to exit
    pub fn stop_and_join(self) -> Result<SequenceTracker<D, L>> {
        self.stop.stop();
        self.join()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{push_channel, MemoryDevice};
    use crate::logger::MemoryLogger;
    use crate::protocol::PACKET_LENGTH;
    use crate::sequence::SequenceId;
    use crate::tracker::TrackerPhase;

    fn raw(seq: u8, offset: u8) -> Vec<u8> {
        let mut bytes = vec![0u8; PACKET_LENGTH];
        bytes[0] = 1;
        bytes[1] = seq;
        bytes[2..6].copy_from_slice(&1_695_038_400u32.to_be_bytes());
        bytes[8] = offset;
        bytes[15] = offset;
        bytes
    }

    fn fast() -> ProcessorConfig {
        ProcessorConfig::with_tick_interval(Duration::from_millis(5))
    }

    #[test]
    fn test_stop_signal() {
        let signal = StopSignal::new();
        let shared = signal.clone();
        assert!(!shared.is_stopped());
        signal.stop();
        assert!(shared.is_stopped());
    }

    #[test]
    fn test_run_exits_when_stopped() {
        let (_tx, rx) = push_channel(1);
        let processor =
            Processor::with_config(MemoryDevice::new(), MemoryLogger::default(), rx, fast());
        processor.stop_signal().stop();

        let tracker = processor.run();

        assert_eq!(tracker.device().requests(), &[SequenceId::LATEST]);
        assert_eq!(tracker.logger().events_by_code(EventCode::Stopped).len(), 1);
    }

    #[test]
    fn test_run_drains_until_senders_dropped() {
        let mut device = MemoryDevice::new();
        device.set_latest(raw(4, 10));
        device.store(raw(6, 12));

        let (tx, rx) = push_channel(8);
        tx.push(raw(5, 11)).unwrap();
        tx.push(raw(7, 13)).unwrap();
        drop(tx);

        let processor = Processor::with_config(device, MemoryLogger::default(), rx, fast());
        let tracker = processor.spawn().unwrap().join().unwrap();

        assert_eq!(tracker.phase(), TrackerPhase::Tracking);
        assert_eq!(tracker.state().current_sequence_id, SequenceId::new(7));
        assert_eq!(
            tracker.device().requests(),
            &[SequenceId::LATEST, SequenceId::new(6)]
        );
        assert_eq!(tracker.device().posted().len(), 8);
    }

    #[test]
    fn test_stop_and_join_idle_processor() {
        let (tx, rx) = push_channel(0);
        let processor =
            Processor::with_config(MemoryDevice::new(), MemoryLogger::default(), rx, fast());
        let handle = processor.spawn().unwrap();

        // Rendezvous push: returns once the loop has taken the packet
        tx.push(raw(1, 1)).unwrap();

        let tracker = handle.stop_and_join().unwrap();
        assert_eq!(tracker.stats().packets_delivered, 1);
        assert_eq!(tracker.logger().events_by_code(EventCode::Stopped).len(), 1);
    }
}
