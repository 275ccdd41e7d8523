//! Cyclic sequence-id arithmetic
//!
//! Devices number packets with an 8-bit counter that cycles through
//! `1..=255` and wraps 255 → 1. Zero never appears in that cycle; it is
//! reserved as the backfill argument meaning "most recent packet".
//!
//! ```text
//!   ... 253 → 254 → 255 → 1 → 2 → ...
//! ```

use std::fmt;

/// Number of usable ids in the ring
pub const RING_SIZE: u16 = 255;

/// 8-bit rolling packet counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SequenceId(u8);

impl SequenceId {
    /// Backfill sentinel: "give me the latest packet"
    pub const LATEST: SequenceId = SequenceId(0);

    /// Wrap a raw id
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Raw byte value
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Check if this is the "latest packet" sentinel
    pub fn is_latest(self) -> bool {
        self.0 == 0
    }

    /// Id following this one in the ring (255 wraps to 1, 0 precedes 1)
    pub fn next(self) -> SequenceId {
        if self.0 == u8::MAX {
            SequenceId(1)
        } else {
            SequenceId(self.0 + 1)
        }
    }

    /// Check if `other` directly follows `self`
    pub fn is_next(self, other: SequenceId) -> bool {
        self.next() == other
    }

    /// Forward distance from `self` to `other` on the ring
    ///
    /// Zero when both ids are equal. Moving forward from 255 to 1 counts
    /// as one step.
    pub fn forward_distance(self, other: SequenceId) -> u8 {
        let from = u16::from(self.0);
        let to = u16::from(other.0);
        if to >= from {
            (to - from) as u8
        } else {
            (to + RING_SIZE - from) as u8
        }
    }

    /// Ids strictly between `self` and `other`, oldest first
    pub fn missing_between(self, other: SequenceId) -> MissingIds {
        MissingIds {
            next: self.next(),
            remaining: self.forward_distance(other).saturating_sub(1),
        }
    }
}

impl From<u8> for SequenceId {
    fn from(id: u8) -> Self {
        Self(id)
    }
}

impl From<SequenceId> for u8 {
    fn from(id: SequenceId) -> Self {
        id.0
    }
}

impl fmt::Display for SequenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Iterator over the ids of a sequence gap, in increasing cyclic order
#[derive(Debug, Clone)]
pub struct MissingIds {
    next: SequenceId,
    remaining: u8,
}

impl MissingIds {
    /// Drop the oldest ids so that at most `max` remain
    pub fn keep_newest(mut self, max: u8) -> (Self, u8) {
        let mut skipped = 0;
        while self.remaining > max {
            self.next = self.next.next();
            self.remaining -= 1;
            skipped += 1;
        }
        (self, skipped)
    }
}

impl Iterator for MissingIds {
    type Item = SequenceId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let id = self.next;
        self.next = id.next();
        self.remaining -= 1;
        Some(id)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.remaining as usize;
        (n, Some(n))
    }
}

impl ExactSizeIterator for MissingIds {}
