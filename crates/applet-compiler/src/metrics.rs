//! Process-wide build counters.
//!
//! Increment at the call site; [`Metrics::flush`] reports them as one
//! `info!` event, typically when a CLI command or a batch of builds ends.

use std::sync::atomic::{AtomicU64, Ordering};

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    builds_executed: AtomicU64,
    builds_reused: AtomicU64,
    modules_loaded: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            builds_executed: AtomicU64::new(0),
            builds_reused: AtomicU64::new(0),
            modules_loaded: AtomicU64::new(0),
        }
    }

    pub fn inc_builds(&self) {
        self.builds_executed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "builds_executed", "counter incremented");
    }

    /// A publish that found a live artifact and skipped the build.
    pub fn inc_reused(&self) {
        self.builds_reused.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "builds_reused", "counter incremented");
    }

    pub fn add_modules(&self, n: u64) {
        self.modules_loaded.fetch_add(n, Ordering::Relaxed);
    }

    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            builds_executed = self.builds_executed(),
            builds_reused = self.builds_reused(),
            modules_loaded = self.modules_loaded(),
        );
    }

    pub fn builds_executed(&self) -> u64 {
        self.builds_executed.load(Ordering::Relaxed)
    }

    pub fn builds_reused(&self) -> u64 {
        self.builds_reused.load(Ordering::Relaxed)
    }

    pub fn modules_loaded(&self) -> u64 {
        self.modules_loaded.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.builds_executed.store(0, Ordering::Relaxed);
        self.builds_reused.store(0, Ordering::Relaxed);
        self.modules_loaded.store(0, Ordering::Relaxed);
    }
}
