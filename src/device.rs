// TSPV - Sequence-tracked telemetry ingestion
// Copyright (c) 2025 David Martin Venti
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.


//! Device gateway abstraction
//!
//! This module provides the seam between the processor and the remote
//! field device: the synchronous backfill/sink calls ([`DeviceGateway`]) and
//! the push channel new packets arrive on ([`push_channel`]).

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::time::Duration;

use crate::error::{ProcessorError, Result};
use crate::protocol::{StatusBits, ValidPacket, SEQUENCE_OFFSET};
use crate::sequence::SequenceId;

/// Trait for the device the processor talks back to
///
/// Both calls block the processor until they return.
pub trait DeviceGateway {
    /// Fetch a historical packet by id
    ///
    /// [`SequenceId::LATEST`] asks for the most recent packet. `None` means
    /// no data; an empty or short buffer is a valid "not found" answer that
    /// the decoder rejects.
    fn request_old_packet(&mut self, id: SequenceId) -> Option<Vec<u8>>;

    /// Deliver one reading downstream
    fn post_reading(&mut self, status: StatusBits, offset_seconds: u8, value: f32);
}

impl<D: DeviceGateway + ?Sized> DeviceGateway for Box<D> {
    fn request_old_packet(&mut self, id: SequenceId) -> Option<Vec<u8>> {
        (**self).request_old_packet(id)
    }

    fn post_reading(&mut self, status: StatusBits, offset_seconds: u8, value: f32) {
        (**self).post_reading(status, offset_seconds, value)
    }
}

/// A reading as received by the device sink
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostedReading {
    /// Raw status bytes
    pub status: StatusBits,
    /// Offset from the packet base timestamp
    pub offset_seconds: u8,
    /// Process value
    pub value: f32,
}

/// An in-memory device for testing and simulation
///
/// Stores packets by the sequence id found in their second byte and records
/// every backfill request and posted reading.
#[derive(Debug, Default)]
pub struct MemoryDevice {
    /// Stored packets by sequence id
    packets: HashMap<u8, Vec<u8>>,
    /// Explicit answer to a `LATEST` request
    latest: Option<Vec<u8>>,
    /// Id of the most recently stored packet
    last_stored: Option<u8>,
    /// Backfill requests in call order
    requests: Vec<SequenceId>,
    /// Readings received by the sink, in call order
    posted: Vec<PostedReading>,
}

impl MemoryDevice {
    /// Create an empty device
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a raw packet under the id in its sequence byte
    ///
    /// Buffers too short to carry an id are ignored.
    pub fn store(&mut self, raw: impl Into<Vec<u8>>) {
        let raw = raw.into();
        if let Some(&id) = raw.get(SEQUENCE_OFFSET) {
            self.packets.insert(id, raw);
            self.last_stored = Some(id);
        }
    }

    /// Store an encoded packet
    pub fn store_packet(&mut self, packet: &ValidPacket) {
        self.store(packet.to_bytes().to_vec());
    }

    /// Store a raw buffer under an explicit id (for malformed answers)
    pub fn store_as(&mut self, id: SequenceId, raw: impl Into<Vec<u8>>) {
        self.packets.insert(id.get(), raw.into());
    }

    /// Set the answer to a `LATEST` request
    pub fn set_latest(&mut self, raw: impl Into<Vec<u8>>) {
        self.latest = Some(raw.into());
    }

    /// Forget a stored packet (simulates device-side eviction)
    pub fn evict(&mut self, id: SequenceId) -> Option<Vec<u8>> {
        self.packets.remove(&id.get())
    }

    /// Backfill requests received so far
    pub fn requests(&self) -> &[SequenceId] {
        &self.requests
    }

    /// Readings posted so far
    pub fn posted(&self) -> &[PostedReading] {
        &self.posted
    }

    /// Drain posted readings
    pub fn take_posted(&mut self) -> Vec<PostedReading> {
        std::mem::take(&mut self.posted)
    }

    /// Forget recorded requests
    pub fn clear_requests(&mut self) {
        self.requests.clear();
    }
}

impl DeviceGateway for MemoryDevice {
    fn request_old_packet(&mut self, id: SequenceId) -> Option<Vec<u8>> {
        self.requests.push(id);

        if id.is_latest() {
            if let Some(latest) = &self.latest {
                return Some(latest.clone());
            }
            return self
                .last_stored
                .and_then(|last| self.packets.get(&last).cloned());
        }

        self.packets.get(&id.get()).cloned()
    }

    fn post_reading(&mut self, status: StatusBits, offset_seconds: u8, value: f32) {
        self.posted.push(PostedReading {
            status,
            offset_seconds,
            value,
        });
    }
}

/// Create the push channel a device uses to notify the processor
///
/// `capacity` bounds how many packets may wait; `0` makes every push a
/// rendezvous with the processor loop.
pub fn push_channel(capacity: usize) -> (PacketSender, PacketReceiver) {
    let (tx, rx) = mpsc::sync_channel(capacity);
    (PacketSender { tx }, PacketReceiver { rx })
}

/// Device side of the push channel
#[derive(Debug, Clone)]
pub struct PacketSender {
    tx: SyncSender<Vec<u8>>,
}

impl PacketSender {
    /// Push a newly arrived packet, blocking while the channel is full
    pub fn push(&self, raw: impl Into<Vec<u8>>) -> Result<()> {
        self.tx
            .send(raw.into())
            .map_err(|_| ProcessorError::Disconnected.into())
    }
}

/// Processor side of the push channel
#[derive(Debug)]
pub struct PacketReceiver {
    rx: Receiver<Vec<u8>>,
}

/// What a wait on the push channel produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// A packet arrived
    Packet(Vec<u8>),
    /// Nothing arrived within the wait
    Idle,
    /// Every sender is gone
    Closed,
}

impl PacketReceiver {
    /// Wait up to `timeout` for the next packet
    pub fn wait(&self, timeout: Duration) -> Notification {
        match self.rx.recv_timeout(timeout) {
            Ok(raw) => Notification::Packet(raw),
            Err(RecvTimeoutError::Timeout) => Notification::Idle,
            Err(RecvTimeoutError::Disconnected) => Notification::Closed,
        }
    }

    /// Take the next packet without waiting
    pub fn poll(&self) -> Notification {
        match self.rx.try_recv() {
            Ok(raw) => Notification::Packet(raw),
            Err(TryRecvError::Empty) => Notification::Idle,
            Err(TryRecvError::Disconnected) => Notification::Closed,
        }
    }
}
