//! Process-wide arena statistics
//!
//! Arenas are single-owner and never shared across threads, but the at-exit
//! report and diagnostics want one aggregate view. Every arena reports its
//! lifecycle events into a set of global atomic counters.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │           Counters (global, relaxed)         │
//! ├──────────────────────────────────────────────┤
//! │ arenas_created / arenas_destroyed            │
//! │ bytes_allocated      (requested bytes, ever) │
//! │ reserved_bytes       (live block capacity)   │
//! │ peak_reserved_bytes  (high-water mark)       │
//! │ files_tracked / files_auto_closed            │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Performance
//!
//! - **Updates**: one relaxed `fetch_add` per event, no contention to speak of
//! - **Reads**: only when a snapshot is taken (report, tests)

use std::sync::atomic::{AtomicU64, Ordering};

static ARENAS_CREATED: AtomicU64 = AtomicU64::new(0);
static ARENAS_DESTROYED: AtomicU64 = AtomicU64::new(0);
static BYTES_ALLOCATED: AtomicU64 = AtomicU64::new(0);
static RESERVED_BYTES: AtomicU64 = AtomicU64::new(0);
static PEAK_RESERVED_BYTES: AtomicU64 = AtomicU64::new(0);
static FILES_TRACKED: AtomicU64 = AtomicU64::new(0);
static FILES_AUTO_CLOSED: AtomicU64 = AtomicU64::new(0);

/// Point-in-time copy of the global counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemorySnapshot {
    pub arenas_created: u64,
    pub arenas_destroyed: u64,
    pub bytes_allocated: u64,
    pub reserved_bytes: u64,
    pub peak_reserved_bytes: u64,
    pub files_tracked: u64,
    pub files_auto_closed: u64,
}

impl MemorySnapshot {
    /// Arenas created but not yet destroyed
    pub fn live_arenas(&self) -> u64 {
        self.arenas_created.saturating_sub(self.arenas_destroyed)
    }
}

/// Read all counters
pub fn snapshot() -> MemorySnapshot {
    MemorySnapshot {
        arenas_created: ARENAS_CREATED.load(Ordering::Relaxed),
        arenas_destroyed: ARENAS_DESTROYED.load(Ordering::Relaxed),
        bytes_allocated: BYTES_ALLOCATED.load(Ordering::Relaxed),
        reserved_bytes: RESERVED_BYTES.load(Ordering::Relaxed),
        peak_reserved_bytes: PEAK_RESERVED_BYTES.load(Ordering::Relaxed),
        files_tracked: FILES_TRACKED.load(Ordering::Relaxed),
        files_auto_closed: FILES_AUTO_CLOSED.load(Ordering::Relaxed),
    }
}

#[inline]
pub(crate) fn record_arena_created() {
    ARENAS_CREATED.fetch_add(1, Ordering::Relaxed);
}

#[inline]
pub(crate) fn record_arena_destroyed() {
    ARENAS_DESTROYED.fetch_add(1, Ordering::Relaxed);
}

#[inline]
pub(crate) fn record_allocation(bytes: usize) {
    BYTES_ALLOCATED.fetch_add(bytes as u64, Ordering::Relaxed);
}

#[inline]
pub(crate) fn record_file_tracked() {
    FILES_TRACKED.fetch_add(1, Ordering::Relaxed);
}

#[inline]
pub(crate) fn record_file_auto_closed() {
    FILES_AUTO_CLOSED.fetch_add(1, Ordering::Relaxed);
}

pub(crate) fn record_block_reserved(bytes: usize) {
    let bytes = bytes as u64;
    let reserved = RESERVED_BYTES.fetch_add(bytes, Ordering::Relaxed) + bytes;

    // Update peak via CAS loop
    let mut peak = PEAK_RESERVED_BYTES.load(Ordering::Relaxed);
    while reserved > peak {
        match PEAK_RESERVED_BYTES.compare_exchange_weak(
            peak,
            reserved,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(current) => peak = current,
        }
    }
}

#[inline]
pub(crate) fn record_block_released(bytes: usize) {
    RESERVED_BYTES.fetch_sub(bytes as u64, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    // Counters are global and other tests run in parallel, so only
    // monotonic lower bounds are asserted here.

    #[test]
    fn test_counters_are_monotonic() {
        let before = snapshot();
        record_arena_created();
        record_allocation(128);
        record_file_tracked();
        record_file_auto_closed();
        record_arena_destroyed();
        let after = snapshot();

        assert!(after.arenas_created >= before.arenas_created + 1);
        assert!(after.arenas_destroyed >= before.arenas_destroyed + 1);
        assert!(after.bytes_allocated >= before.bytes_allocated + 128);
        assert!(after.files_tracked >= before.files_tracked + 1);
        assert!(after.files_auto_closed >= before.files_auto_closed + 1);
    }

    #[test]
    fn test_peak_tracks_reservations() {
        record_block_reserved(4096);
        let snap = snapshot();
        assert!(snap.peak_reserved_bytes >= 4096);
        record_block_released(4096);
    }

    #[test]
    fn test_live_arenas() {
        let snap = MemorySnapshot {
            arenas_created: 5,
            arenas_destroyed: 3,
            ..Default::default()
        };
        assert_eq!(snap.live_arenas(), 2);
    }
}
