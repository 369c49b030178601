//! In-process counters for queue lifecycle events: plain atomics plus a
//! cheap snapshot type, not a Prometheus exporter — just the ambient
//! instrumentation a production queue carries regardless of scope.

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe lifecycle counters for one [`crate::Queue`].
#[derive(Debug, Default)]
pub struct QueueMetrics {
    enqueued: AtomicU64,
    leased: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    stalled: AtomicU64,
    dead_lettered: AtomicU64,
}

/// Point-in-time snapshot of [`QueueMetrics`], cheap to clone and log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct QueueMetricsSnapshot {
    pub enqueued: u64,
    pub leased: u64,
    pub completed: u64,
    pub failed: u64,
    pub stalled: u64,
    pub dead_lettered: u64,
}

impl QueueMetrics {
    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_leased(&self) {
        self.leased.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_stalled(&self) {
        self.stalled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dead_lettered(&self) {
        self.dead_lettered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> QueueMetricsSnapshot {
        QueueMetricsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            leased: self.leased.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            stalled: self.stalled.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let metrics = QueueMetrics::default();
        assert_eq!(
            metrics.snapshot(),
            QueueMetricsSnapshot {
                enqueued: 0,
                leased: 0,
                completed: 0,
                failed: 0,
                stalled: 0,
                dead_lettered: 0,
            }
        );
    }

    #[test]
    fn each_recorder_increments_its_own_counter_only() {
        let metrics = QueueMetrics::default();
        metrics.record_enqueued();
        metrics.record_enqueued();
        metrics.record_leased();
        metrics.record_completed();
        metrics.record_failed();
        metrics.record_stalled();
        metrics.record_dead_lettered();

        let snap = metrics.snapshot();
        assert_eq!(snap.enqueued, 2);
        assert_eq!(snap.leased, 1);
        assert_eq!(snap.completed, 1);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.stalled, 1);
        assert_eq!(snap.dead_lettered, 1);
    }
}
