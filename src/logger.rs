// TSPV - Sequence-tracked telemetry ingestion
// Copyright (c) 2025 David Martin Venti
//
// Licensed under AGPL-3.0.
// See LICENSE file for details.


//! Packet event logging
//!
//! The processor reports failures and lifecycle events to a
//! [`PacketLogger`]. Two backends are provided:
//! - [`LogCrateLogger`] forwards to the `log` facade
//! - [`MemoryLogger`] keeps events in memory for inspection

use std::fmt;
use std::sync::{Mutex, MutexGuard};

/// Context attached to every decode failure
pub const DECODE_FAILURE_CONTEXT: &str = "an unexpected error occurred processing the packet";

/// Event codes reported to the logger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum EventCode {
    /// A live or baseline packet failed to decode
    DecodeFailure = 1,
    /// A backfilled packet failed to decode
    BackfillFailure = 2,
    /// Missing ids dropped because the gap exceeded the backfill limit
    BackfillAbandoned = 3,
    /// The run loop exited
    Stopped = 4,
}

impl EventCode {
    /// Numeric event id
    pub fn id(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventCode::DecodeFailure => write!(f, "DECODE_FAILURE"),
            EventCode::BackfillFailure => write!(f, "BACKFILL_FAILURE"),
            EventCode::BackfillAbandoned => write!(f, "BACKFILL_ABANDONED"),
            EventCode::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// Severity levels for packet events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Informational event
    Info = 1,
    /// Degraded but recovered
    Warning = 2,
    /// Packet dropped
    Error = 3,
}

/// Packet event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketEvent {
    /// Event code
    pub code: EventCode,
    /// Severity level
    pub severity: Severity,
    /// What happened (e.g. the decode failure reason)
    pub message: String,
    /// Where it happened
    pub context: String,
}

impl PacketEvent {
    /// Create a new event
    pub fn new(
        code: EventCode,
        severity: Severity,
        message: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            code,
            severity,
            message: message.into(),
            context: context.into(),
        }
    }

    /// Decode failure of a live or baseline packet
    pub fn decode_failure(reason: impl fmt::Display) -> Self {
        Self::new(
            EventCode::DecodeFailure,
            Severity::Error,
            reason.to_string(),
            DECODE_FAILURE_CONTEXT,
        )
    }
}

impl fmt::Display for PacketEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}:{}] {}: {}", self.code.id(), self.code, self.context, self.message)
    }
}

/// Trait for packet event backends
pub trait PacketLogger: Send {
    /// Log a packet event
    fn log(&self, event: PacketEvent);

    /// Flush pending logs
    fn flush(&self) {}
}

impl<L: PacketLogger + Sync> PacketLogger for std::sync::Arc<L> {
    fn log(&self, event: PacketEvent) {
        (**self).log(event)
    }

    fn flush(&self) {
        (**self).flush()
    }
}

/// Logger forwarding to the `log` facade
#[derive(Debug, Clone, Copy, Default)]
pub struct LogCrateLogger;

impl PacketLogger for LogCrateLogger {
    fn log(&self, event: PacketEvent) {
        match event.severity {
            Severity::Error => log::error!(target: "tspv", "{}", event),
            Severity::Warning => log::warn!(target: "tspv", "{}", event),
            Severity::Info => log::info!(target: "tspv", "{}", event),
        }
    }

    fn flush(&self) {
        log::logger().flush();
    }
}

/// Simple in-memory logger
#[derive(Debug)]
pub struct MemoryLogger {
    events: Mutex<Vec<PacketEvent>>,
    max_events: usize,
}

impl Default for MemoryLogger {
    fn default() -> Self {
        Self::new(10000)
    }
}

impl MemoryLogger {
    /// Create a new memory logger with specified capacity
    pub fn new(max_events: usize) -> Self {
        Self {
            events: Mutex::new(Vec::with_capacity(max_events.min(1000))),
            max_events,
        }
    }

    fn guard(&self) -> MutexGuard<'_, Vec<PacketEvent>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Get all stored events
    pub fn events(&self) -> Vec<PacketEvent> {
        self.guard().clone()
    }

    /// Get event count
    pub fn len(&self) -> usize {
        self.guard().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    /// Clear all events
    pub fn clear(&self) {
        self.guard().clear();
    }

    /// Get events by code
    pub fn events_by_code(&self, code: EventCode) -> Vec<PacketEvent> {
        self.guard()
            .iter()
            .filter(|e| e.code == code)
            .cloned()
            .collect()
    }

    /// Get events at or above a severity
    pub fn events_at_least(&self, severity: Severity) -> Vec<PacketEvent> {
        self.guard()
            .iter()
            .filter(|e| e.severity >= severity)
            .cloned()
            .collect()
    }
}

impl PacketLogger for MemoryLogger {
    fn log(&self, event: PacketEvent) {
        let mut events = self.guard();
        if events.len() >= self.max_events {
            events.remove(0);
        }
        events.push(event);
    }
}
