//! Per-pool counters and task run-time histogram.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[cfg(feature = "telemetry")]
use hdrhistogram::Histogram;
#[cfg(feature = "telemetry")]
use parking_lot::RwLock;

/// Max recordable run time: one hour in nanoseconds.
#[cfg(feature = "telemetry")]
const MAX_RUN_TIME_NS: u64 = 3_600_000_000_000;

#[derive(Debug)]
pub struct Metrics {
    submitted: AtomicU64,
    admitted: AtomicU64,
    spilled: AtomicU64,
    requeued: AtomicU64,
    cancelled: AtomicU64,
    executed: AtomicU64,
    panicked: AtomicU64,
    discarded: AtomicU64,

    #[cfg(feature = "telemetry")]
    run_time: Option<RwLock<Histogram<u64>>>,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            submitted: AtomicU64::new(0),
            admitted: AtomicU64::new(0),
            spilled: AtomicU64::new(0),
            requeued: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
            executed: AtomicU64::new(0),
            panicked: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
            #[cfg(feature = "telemetry")]
            run_time: Histogram::new_with_max(MAX_RUN_TIME_NS, 3).ok().map(RwLock::new),
            start_time: Instant::now(),
        }
    }

    pub fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_admitted(&self) {
        self.admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_spilled(&self) {
        self.spilled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_requeued(&self) {
        self.requeued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self, count: usize) {
        self.discarded.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Record a finished task with its run time
    pub fn record_execution(&self, run_time: Duration, panicked: bool) {
        self.executed.fetch_add(1, Ordering::Relaxed);
        if panicked {
            self.panicked.fetch_add(1, Ordering::Relaxed);
        }

        #[cfg(feature = "telemetry")]
        if let Some(mut hist) = self.run_time.as_ref().and_then(|h| h.try_write()) {
            let ns = u64::try_from(run_time.as_nanos()).unwrap_or(u64::MAX);
            let _ = hist.record(ns.min(MAX_RUN_TIME_NS));
        }

        #[cfg(not(feature = "telemetry"))]
        let _ = run_time;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        #[cfg_attr(not(feature = "telemetry"), allow(unused_mut))]
        let mut snapshot = MetricsSnapshot {
            uptime: self.start_time.elapsed(),
            submitted: self.submitted.load(Ordering::Relaxed),
            admitted: self.admitted.load(Ordering::Relaxed),
            spilled: self.spilled.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            avg_run_time_ns: 0,
            p50_run_time_ns: 0,
            p99_run_time_ns: 0,
            max_run_time_ns: 0,
        };

        #[cfg(feature = "telemetry")]
        if let Some(hist) = self.run_time.as_ref() {
            let hist = hist.read();
            if hist.len() > 0 {
                snapshot.avg_run_time_ns = hist.mean() as u64;
                snapshot.p50_run_time_ns = hist.value_at_quantile(0.50);
                snapshot.p99_run_time_ns = hist.value_at_quantile(0.99);
                snapshot.max_run_time_ns = hist.max();
            }
        }

        snapshot
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of a pool's counters.
///
/// Run-time figures stay zero when the `telemetry` feature is off.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub uptime: Duration,
    pub submitted: u64,
    pub admitted: u64,
    pub spilled: u64,
    pub requeued: u64,
    pub cancelled: u64,
    pub executed: u64,
    pub panicked: u64,
    pub discarded: u64,
    pub avg_run_time_ns: u64,
    pub p50_run_time_ns: u64,
    pub p99_run_time_ns: u64,
    pub max_run_time_ns: u64,
}

impl MetricsSnapshot {
    /// Tasks finished per second since the pool started
    pub fn tasks_per_second(&self) -> f64 {
        let seconds = self.uptime.as_secs_f64();
        if seconds == 0.0 {
            return 0.0;
        }
        self.executed as f64 / seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = Metrics::new();

        metrics.record_submitted();
        metrics.record_submitted();
        metrics.record_admitted();
        metrics.record_spilled();
        metrics.record_requeued();
        metrics.record_cancelled();
        metrics.record_discarded(3);
        metrics.record_execution(Duration::from_micros(5), false);
        metrics.record_execution(Duration::from_micros(7), true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.submitted, 2);
        assert_eq!(snapshot.admitted, 1);
        assert_eq!(snapshot.spilled, 1);
        assert_eq!(snapshot.requeued, 1);
        assert_eq!(snapshot.cancelled, 1);
        assert_eq!(snapshot.discarded, 3);
        assert_eq!(snapshot.executed, 2);
        assert_eq!(snapshot.panicked, 1);
    }

    #[cfg(feature = "telemetry")]
    #[test]
    fn test_run_time_histogram() {
        let metrics = Metrics::new();
        metrics.record_execution(Duration::from_micros(10), false);
        metrics.record_execution(Duration::from_micros(20), false);

        let snapshot = metrics.snapshot();
        assert!(snapshot.avg_run_time_ns > 0);
        assert!(snapshot.max_run_time_ns >= snapshot.p50_run_time_ns);
    }

    #[test]
    fn test_tasks_per_second() {
        let snapshot = MetricsSnapshot {
            uptime: Duration::from_secs(2),
            executed: 10,
            ..Default::default()
        };
        assert_eq!(snapshot.tasks_per_second(), 5.0);
        assert_eq!(MetricsSnapshot::default().tasks_per_second(), 0.0);
    }
}
