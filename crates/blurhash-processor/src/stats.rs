//! Statistics for the processing engine.
//!
//! Counters are atomic so they can be bumped from the request path and from
//! background decode tasks without taking the state lock.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters owned by a processor.
#[derive(Debug, Default)]
pub(crate) struct ProcessorStats {
    hits: AtomicU64,
    misses: AtomicU64,
    errors: AtomicU64,
    timeouts: AtomicU64,
    evictions: AtomicU64,
}

impl ProcessorStats {
    pub(crate) fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_timeout(&self) {
        self.timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_evictions(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        self.timeouts.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(
        &self,
        size: usize,
        max_size: usize,
        active_jobs: usize,
    ) -> StatsSnapshot {
        StatsSnapshot {
            size,
            max_size,
            hit_count: self.hits.load(Ordering::Relaxed),
            miss_count: self.misses.load(Ordering::Relaxed),
            error_count: self.errors.load(Ordering::Relaxed),
            timeout_count: self.timeouts.load(Ordering::Relaxed),
            eviction_count: self.evictions.load(Ordering::Relaxed),
            active_jobs,
        }
    }
}

/// A point-in-time view of processor statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    /// Entries currently cached.
    pub size: usize,
    /// Cache capacity.
    pub max_size: usize,
    pub hit_count: u64,
    pub miss_count: u64,
    /// Failed decodes, counted once per operation.
    pub error_count: u64,
    /// Requests that gave up waiting.
    pub timeout_count: u64,
    /// Entries pushed out by capacity pressure.
    pub eviction_count: u64,
    /// Decode operations currently in flight.
    pub active_jobs: usize,
}

impl StatsSnapshot {
    /// `hits / (hits + misses)`, or 0.0 before any request.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = ProcessorStats::default();
        assert_eq!(stats.snapshot(0, 50, 0).hit_rate(), 0.0);

        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        let snap = stats.snapshot(1, 50, 0);
        assert_eq!(snap.hit_count, 3);
        assert_eq!(snap.miss_count, 1);
        assert!((snap.hit_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reset() {
        let stats = ProcessorStats::default();
        stats.record_miss();
        stats.record_error();
        stats.record_timeout();
        stats.record_evictions(2);
        let snap = stats.snapshot(3, 5, 1);
        assert_eq!(
            (snap.error_count, snap.timeout_count, snap.eviction_count),
            (1, 1, 2)
        );

        stats.reset();
        let snap = stats.snapshot(0, 5, 1);
        assert_eq!(snap.miss_count, 0);
        assert_eq!(snap.eviction_count, 0);
        assert_eq!(snap.active_jobs, 1);
    }

    #[test]
    fn test_concurrent_counting() {
        let stats = std::sync::Arc::new(ProcessorStats::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let stats = stats.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        stats.record_hit();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(stats.snapshot(0, 0, 0).hit_count, 4000);
    }
}
