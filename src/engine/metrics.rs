use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the engine loop. Relaxed ordering is enough; readers
/// only ever want an approximate, monotonically growing view.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    frames_processed: AtomicU64,
    frames_failed: AtomicU64,
    output_rejected: AtomicU64,
    idle_polls: AtomicU64,
    reconfigurations: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_processed: u64,
    pub frames_failed: u64,
    pub output_rejected: u64,
    pub idle_polls: u64,
    pub reconfigurations: u64,
}

impl EngineMetrics {
    pub(crate) fn record_processed(&self) {
        self.frames_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failed(&self) {
        self.frames_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_output_rejected(&self) {
        self.output_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_idle_poll(&self) {
        self.idle_polls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reconfiguration(&self) {
        self.reconfigurations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_processed: self.frames_processed.load(Ordering::Relaxed),
            frames_failed: self.frames_failed.load(Ordering::Relaxed),
            output_rejected: self.output_rejected.load(Ordering::Relaxed),
            idle_polls: self.idle_polls.load(Ordering::Relaxed),
            reconfigurations: self.reconfigurations.load(Ordering::Relaxed),
        }
    }
}
