//! Bridge counters shared by the receive context and the relay loop

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::{Deserialize, Serialize};

/// Monotonic packet counters. Never reset; they wrap on overflow.
#[derive(Debug, Default)]
pub struct Statistics {
    received: AtomicU32,
    sent: AtomicU32,
    dropped: AtomicU32,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inbound radio packet seen, whether or not it was kept
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    /// Frame written to the host link
    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    /// Inbound packet discarded (oversized or queue full)
    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub received: u32,
    pub sent: u32,
    pub dropped: u32,
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RX:{} TX:{} DROP:{}", self.received, self.sent, self.dropped)
    }
}
