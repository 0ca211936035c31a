//! Hybrid Logical Clock.
//!
//! Combines wall-clock milliseconds with a logical counter and a node id,
//! giving every event a timestamp that is totally ordered across nodes and
//! close to physical time. Local events tick the clock forward; receiving a
//! remote timestamp reconciles both clocks so causality is never inverted.
//!
//! # Wire format
//!
//! 16 bytes big-endian: `physical (i64) | logical (u32) | node_id (u32)`.

use std::time::{SystemTime, UNIX_EPOCH};

/// A single HLC timestamp.
///
/// The derived ordering is lexicographic over `(physical, logical,
/// node_id)`, which is exactly the comparison the protocol requires: the
/// node id breaks ties between events that are otherwise concurrent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HlcTimestamp {
    /// Wall-clock milliseconds since the Unix epoch.
    pub physical: i64,

    /// Logical counter, reset whenever `physical` advances.
    pub logical: u32,

    /// Node identifier for tie-breaking.
    pub node_id: u32,
}

impl HlcTimestamp {
    /// Size of the wire form in bytes.
    pub const WIRE_SIZE: usize = 16;

    /// Encode as 16 big-endian bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::WIRE_SIZE] {
        let mut out = [0u8; Self::WIRE_SIZE];
        out[0..8].copy_from_slice(&self.physical.to_be_bytes());
        out[8..12].copy_from_slice(&self.logical.to_be_bytes());
        out[12..16].copy_from_slice(&self.node_id.to_be_bytes());
        out
    }

    /// Decode from 16 big-endian bytes.
    #[must_use]
    pub fn from_bytes(data: [u8; Self::WIRE_SIZE]) -> Self {
        let mut physical = [0u8; 8];
        physical.copy_from_slice(&data[0..8]);
        let mut logical = [0u8; 4];
        logical.copy_from_slice(&data[8..12]);
        let mut node_id = [0u8; 4];
        node_id.copy_from_slice(&data[12..16]);

        Self {
            physical: i64::from_be_bytes(physical),
            logical: u32::from_be_bytes(logical),
            node_id: u32::from_be_bytes(node_id),
        }
    }
}

/// Hybrid Logical Clock state for one node.
///
/// Tracks the last issued `(physical, logical)` pair. Timestamps emitted by
/// [`now`](Self::now) and [`receive`](Self::receive) strictly increase under
/// the [`HlcTimestamp`] ordering even when the wall clock stalls or jumps
/// backwards.
///
/// Not internally synchronized; callers serialize access.
#[derive(Debug, Clone)]
pub struct HlcClock {
    /// Physical component of the last issued timestamp.
    last_physical: i64,

    /// Logical component of the last issued timestamp.
    last_logical: u32,

    /// This node's identifier.
    node_id: u32,
}

impl HlcClock {
    /// Create a clock for the given node.
    #[must_use]
    pub fn new(node_id: u32) -> Self {
        Self { last_physical: 0, last_logical: 0, node_id }
    }

    /// This clock's node id.
    #[must_use]
    pub fn node_id(&self) -> u32 {
        self.node_id
    }

    /// Timestamp a local event using the system wall clock.
    pub fn now(&mut self) -> HlcTimestamp {
        self.now_with_wall(wall_clock_ms())
    }

    /// Timestamp a local event with an explicit wall clock reading.
    ///
    /// The logical counter increments when the physical component cannot
    /// advance (stalled or regressed wall clock) and resets to zero
    /// otherwise.
    pub fn now_with_wall(&mut self, wall_ms: i64) -> HlcTimestamp {
        let physical = self.last_physical.max(wall_ms);
        let logical = if physical == self.last_physical {
            self.last_logical + 1
        } else {
            0
        };

        self.last_physical = physical;
        self.last_logical = logical;
        self.issue()
    }

    /// Reconcile with a received timestamp using the system wall clock.
    ///
    /// The returned timestamp dominates both the message and every
    /// timestamp this clock issued before.
    pub fn receive(&mut self, msg: &HlcTimestamp) -> HlcTimestamp {
        self.receive_with_wall(msg, wall_clock_ms())
    }

    /// Reconcile with a received timestamp at an explicit wall clock
    /// reading.
    pub fn receive_with_wall(&mut self, msg: &HlcTimestamp, wall_ms: i64) -> HlcTimestamp {
        let physical = self.last_physical.max(msg.physical).max(wall_ms);

        let logical = if physical == self.last_physical && physical == msg.physical {
            self.last_logical.max(msg.logical) + 1
        } else if physical == self.last_physical {
            self.last_logical + 1
        } else if physical == msg.physical {
            msg.logical + 1
        } else {
            0
        };

        self.last_physical = physical;
        self.last_logical = logical;
        self.issue()
    }

    /// The last issued timestamp, without advancing the clock.
    #[must_use]
    pub fn current(&self) -> HlcTimestamp {
        self.issue()
    }

    fn issue(&self) -> HlcTimestamp {
        HlcTimestamp {
            physical: self.last_physical,
            logical: self.last_logical,
            node_id: self.node_id,
        }
    }
}

/// Milliseconds since the Unix epoch, 0 if the system clock reads earlier.
fn wall_clock_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as i64)
}
