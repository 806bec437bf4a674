//! Global atomic counters for campaign observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. at the end of an export or a CLI command).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Lightweight atomic counters: no allocations, no locking.
pub struct Metrics {
    list_mutations: AtomicU64,
    rollbacks: AtomicU64,
    assets_fetched: AtomicU64,
    assets_skipped: AtomicU64,
    exports_completed: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            list_mutations: AtomicU64::new(0),
            rollbacks: AtomicU64::new(0),
            assets_fetched: AtomicU64::new(0),
            assets_skipped: AtomicU64::new(0),
            exports_completed: AtomicU64::new(0),
        }
    }

    /// A list mutation reached the store and was committed.
    pub fn inc_list_mutations(&self) {
        self.list_mutations.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "list_mutations", "counter incremented");
    }

    /// A store write failed and the list was rolled back or reconciled.
    pub fn inc_rollbacks(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "rollbacks", "counter incremented");
    }

    pub fn inc_assets_fetched(&self) {
        self.assets_fetched.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "assets_fetched", "counter incremented");
    }

    /// An image or attachment was left out of an export.
    pub fn inc_assets_skipped(&self) {
        self.assets_skipped.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "assets_skipped", "counter incremented");
    }

    pub fn inc_exports(&self) {
        self.exports_completed.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "exports_completed", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            list_mutations = self.list_mutations(),
            rollbacks = self.rollbacks(),
            assets_fetched = self.assets_fetched(),
            assets_skipped = self.assets_skipped(),
            exports_completed = self.exports_completed(),
        );
    }

    pub fn list_mutations(&self) -> u64 {
        self.list_mutations.load(Ordering::Relaxed)
    }

    pub fn rollbacks(&self) -> u64 {
        self.rollbacks.load(Ordering::Relaxed)
    }

    pub fn assets_fetched(&self) -> u64 {
        self.assets_fetched.load(Ordering::Relaxed)
    }

    pub fn assets_skipped(&self) -> u64 {
        self.assets_skipped.load(Ordering::Relaxed)
    }

    pub fn exports_completed(&self) -> u64 {
        self.exports_completed.load(Ordering::Relaxed)
    }

    /// Reset all counters to zero (useful in tests).
    pub fn reset(&self) {
        self.list_mutations.store(0, Ordering::Relaxed);
        self.rollbacks.store(0, Ordering::Relaxed);
        self.assets_fetched.store(0, Ordering::Relaxed);
        self.assets_skipped.store(0, Ordering::Relaxed);
        self.exports_completed.store(0, Ordering::Relaxed);
    }
}
