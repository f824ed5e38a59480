//! A small metrics registry used throughout the query engine to count jobs,
//! tasks, and bytes moved without pulling in a full Prometheus client.
#![deny(rustdoc::broken_intra_doc_links, rustdoc::bare_urls, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A monotonically increasing counter, e.g. "jobs dispatched".
#[derive(Debug, Default)]
pub struct U64Counter(AtomicU64);

impl U64Counter {
    /// Increment the counter by `delta`.
    pub fn inc(&self, delta: u64) {
        self.0.fetch_add(delta, Ordering::Relaxed);
    }

    /// Return the current value.
    pub fn fetch(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A histogram of observed durations, bucketed by power-of-two milliseconds.
#[derive(Debug, Default)]
pub struct DurationHistogram {
    buckets: Mutex<BTreeMap<u32, u64>>,
}

impl DurationHistogram {
    /// Record one observation.
    pub fn record(&self, d: Duration) {
        let bucket = 32 - (d.as_millis().max(1) as u32).leading_zeros();
        *self.buckets.lock().entry(bucket).or_insert(0) += 1;
    }

    /// Total number of observations recorded.
    pub fn count(&self) -> u64 {
        self.buckets.lock().values().sum()
    }
}

/// A named, shareable metric instrument kept alive by the [`Registry`].
#[derive(Debug)]
pub enum Instrument {
    /// A [`U64Counter`] instrument.
    Counter(Arc<U64Counter>),
    /// A [`DurationHistogram`] instrument.
    Histogram(Arc<DurationHistogram>),
}

/// Process-wide (or query-scoped) registry of named metric instruments.
///
/// Registration is idempotent: registering the same name twice returns the
/// same underlying instrument rather than creating a second one.
#[derive(Debug, Default)]
pub struct Registry {
    instruments: Mutex<BTreeMap<String, Instrument>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return (creating if necessary) the named counter.
    pub fn register_counter(&self, name: &str) -> Arc<U64Counter> {
        let mut instruments = self.instruments.lock();
        match instruments
            .entry(name.to_string())
            .or_insert_with(|| Instrument::Counter(Arc::new(U64Counter::default())))
        {
            Instrument::Counter(c) => Arc::clone(c),
            Instrument::Histogram(_) => panic!("metric {name} already registered as histogram"),
        }
    }

    /// Return (creating if necessary) the named duration histogram.
    pub fn register_histogram(&self, name: &str) -> Arc<DurationHistogram> {
        let mut instruments = self.instruments.lock();
        match instruments
            .entry(name.to_string())
            .or_insert_with(|| Instrument::Histogram(Arc::new(DurationHistogram::default())))
        {
            Instrument::Histogram(h) => Arc::clone(h),
            Instrument::Counter(_) => panic!("metric {name} already registered as counter"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates() {
        let reg = Registry::new();
        let c = reg.register_counter("jobs.dispatched");
        c.inc(1);
        c.inc(2);
        assert_eq!(reg.register_counter("jobs.dispatched").fetch(), 3);
    }

    #[test]
    fn histogram_counts_observations() {
        let reg = Registry::new();
        let h = reg.register_histogram("merge.latency");
        h.record(Duration::from_millis(5));
        h.record(Duration::from_millis(500));
        assert_eq!(h.count(), 2);
        assert_eq!(reg.register_histogram("merge.latency").count(), 2);
    }
}
