// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Provides a public interface for querying process-wide pool statistics.
//!
//! This module defines a set of global atomic counters. Every pool in
//! `ebb-data` is responsible for updating them when it hands out or takes back
//! a slot, or when it acquires or frees backing storage. Any part of the
//! engine can then read them in a thread-safe manner, for example to decide
//! when a registry is worth compacting or to display pool pressure in a
//! debug overlay.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

// --- Global Pool Counters ---

/// Tracks the number of slots currently handed out by all pools.
pub static LIVE_SLOTS: AtomicUsize = AtomicUsize::new(0);

/// Tracks the peak number of slots that were ever live simultaneously.
pub static PEAK_LIVE_SLOTS: AtomicU64 = AtomicU64::new(0);

/// Tracks the total number of successful slot requests.
pub static TOTAL_SLOT_REQUESTS: AtomicU64 = AtomicU64::new(0);

/// Tracks the total number of slot releases.
pub static TOTAL_SLOT_RELEASES: AtomicU64 = AtomicU64::new(0);

/// Tracks the number of requests that failed because a pool was exhausted.
pub static TOTAL_EXHAUSTIONS: AtomicU64 = AtomicU64::new(0);

/// Tracks the total number of backing chunks ever allocated by pools.
pub static TOTAL_CHUNKS_ALLOCATED: AtomicU64 = AtomicU64::new(0);

/// Tracks the number of bytes currently reserved by pool backing storage.
pub static RESERVED_BYTES: AtomicUsize = AtomicUsize::new(0);

/// Tracks the number of pools created over the lifetime of the process.
pub static TOTAL_POOLS_CREATED: AtomicU64 = AtomicU64::new(0);

// --- Recording API (used by the pools) ---

/// Records that a pool was created.
pub fn record_pool_created() {
    TOTAL_POOLS_CREATED.fetch_add(1, Ordering::Relaxed);
}

/// Records a successful slot request.
pub fn record_slot_requested() {
    TOTAL_SLOT_REQUESTS.fetch_add(1, Ordering::Relaxed);
    let live = LIVE_SLOTS.fetch_add(1, Ordering::Relaxed) + 1;
    PEAK_LIVE_SLOTS.fetch_max(live as u64, Ordering::Relaxed);
}

/// Records that `count` slots were returned to their pool.
pub fn record_slots_released(count: usize) {
    if count == 0 {
        return;
    }
    let result = LIVE_SLOTS.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
        current.checked_sub(count)
    });
    if result.is_err() {
        log::error!("Live slot counter underflowed while releasing {count} slots!");
    } else {
        TOTAL_SLOT_RELEASES.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Records a request that failed because the pool had no free slot.
pub fn record_exhaustion() {
    TOTAL_EXHAUSTIONS.fetch_add(1, Ordering::Relaxed);
}

/// Records that a pool allocated a new backing chunk of `bytes` bytes.
pub fn record_chunk_allocated(bytes: usize) {
    TOTAL_CHUNKS_ALLOCATED.fetch_add(1, Ordering::Relaxed);
    RESERVED_BYTES.fetch_add(bytes, Ordering::Relaxed);
}

/// Records that a pool released `bytes` bytes of backing storage.
pub fn record_storage_freed(bytes: usize) {
    let result = RESERVED_BYTES.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
        current.checked_sub(bytes)
    });
    if result.is_err() {
        log::error!("Reserved byte counter underflowed while freeing {bytes} bytes!");
    }
}

// --- Data Structures for Reporting ---

/// A snapshot of the global pool counters, including derived metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolMemoryStats {
    /// Slots currently handed out across all pools.
    pub live_slots: usize,
    /// Maximum number of slots that were ever live at the same time.
    pub peak_live_slots: u64,
    /// Total number of successful slot requests.
    pub total_requests: u64,
    /// Total number of slot releases.
    pub total_releases: u64,
    /// Total number of requests refused because a pool was exhausted.
    pub total_exhaustions: u64,
    /// Total number of backing chunks allocated.
    pub total_chunks_allocated: u64,
    /// Bytes currently reserved by pool storage.
    pub reserved_bytes: usize,
    /// Number of pools created over the process lifetime.
    pub total_pools_created: u64,

    // --- Calculated Metrics ---
    /// Average number of times a slot was handed out per chunk allocation.
    /// High values mean the free lists are doing their job.
    pub requests_per_chunk: f64,
    /// Fraction of the peak that is still live (`live / peak`).
    pub peak_utilization: f64,
}

impl PoolMemoryStats {
    /// Populates the derived metrics based on the raw counter values.
    pub fn calculate_derived_metrics(&mut self) {
        if self.total_chunks_allocated > 0 {
            self.requests_per_chunk =
                self.total_requests as f64 / self.total_chunks_allocated as f64;
        }

        if self.peak_live_slots > 0 {
            self.peak_utilization = self.live_slots as f64 / self.peak_live_slots as f64;
        }
    }
}

// --- Public API for Reading Stats ---

/// Takes a snapshot of all global pool counters.
///
/// The counters are read individually with `Ordering::Relaxed`, so a snapshot
/// taken while other threads use pools is only approximately consistent.
pub fn get_pool_memory_stats() -> PoolMemoryStats {
    let mut stats = PoolMemoryStats {
        live_slots: LIVE_SLOTS.load(Ordering::Relaxed),
        peak_live_slots: PEAK_LIVE_SLOTS.load(Ordering::Relaxed),
        total_requests: TOTAL_SLOT_REQUESTS.load(Ordering::Relaxed),
        total_releases: TOTAL_SLOT_RELEASES.load(Ordering::Relaxed),
        total_exhaustions: TOTAL_EXHAUSTIONS.load(Ordering::Relaxed),
        total_chunks_allocated: TOTAL_CHUNKS_ALLOCATED.load(Ordering::Relaxed),
        reserved_bytes: RESERVED_BYTES.load(Ordering::Relaxed),
        total_pools_created: TOTAL_POOLS_CREATED.load(Ordering::Relaxed),
        ..Default::default()
    };

    stats.calculate_derived_metrics();
    stats
}

/// Gets the number of slots currently handed out by all pools.
pub fn get_live_slot_count() -> usize {
    LIVE_SLOTS.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_monotonic() {
        let before = get_pool_memory_stats();
        record_pool_created();
        record_slot_requested();
        record_slots_released(1);
        record_exhaustion();
        let after = get_pool_memory_stats();

        assert!(after.total_pools_created > before.total_pools_created);
        assert!(after.total_requests > before.total_requests);
        assert!(after.total_releases > before.total_releases);
        assert!(after.total_exhaustions > before.total_exhaustions);
        assert!(after.peak_live_slots >= 1);
    }

    #[test]
    fn test_derived_metrics() {
        let mut stats = PoolMemoryStats {
            live_slots: 5,
            peak_live_slots: 10,
            total_requests: 40,
            total_chunks_allocated: 4,
            ..Default::default()
        };
        stats.calculate_derived_metrics();
        assert_eq!(stats.requests_per_chunk, 10.0);
        assert_eq!(stats.peak_utilization, 0.5);
    }

    #[test]
    fn test_derived_metrics_without_activity() {
        let mut stats = PoolMemoryStats::default();
        stats.calculate_derived_metrics();
        assert_eq!(stats.requests_per_chunk, 0.0);
        assert_eq!(stats.peak_utilization, 0.0);
    }
}
