use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use dashmap::{DashMap, mapref::entry::Entry};
use serde::Serialize;

use crate::admin::RefreshInterval;

/// Counters describing the work done by one bulk client.
///
/// Every counter is monotonic except the two in-flight gauges. Reads never
/// block writers, so a snapshot taken while batches complete may mix values
/// from before and after a completion.
#[derive(Debug, Default)]
pub struct IngestMetricState {
    submitted: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    in_flight_operations: AtomicU64,
    in_flight_bytes: AtomicU64,
    total_bytes: AtomicU64,
    completed_batches: AtomicU64,
    total_elapsed_micros: AtomicU64,
    /// Indices in bulk mode and the refresh interval to restore.
    bulk_mode: DashMap<String, RefreshInterval>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub submitted: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub in_flight_operations: u64,
    pub in_flight_bytes: u64,
    pub total_bytes: u64,
    pub completed_batches: u64,
    pub total_elapsed: Duration,
}

impl IngestMetricState {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_submitted(&self, count: u64) {
        self.submitted.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn before_send(&self, operations: u64, bytes: u64) {
        self.in_flight_operations
            .fetch_add(operations, Ordering::Relaxed);
        self.in_flight_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub(crate) fn after_send(
        &self,
        operations: u64,
        bytes: u64,
        succeeded: u64,
        failed: u64,
        elapsed: Duration,
    ) {
        self.in_flight_operations
            .fetch_sub(operations, Ordering::Relaxed);
        self.in_flight_bytes.fetch_sub(bytes, Ordering::Relaxed);
        self.total_bytes.fetch_add(bytes, Ordering::Relaxed);
        self.succeeded.fetch_add(succeeded, Ordering::Relaxed);
        self.failed.fetch_add(failed, Ordering::Relaxed);
        self.completed_batches.fetch_add(1, Ordering::Relaxed);
        self.total_elapsed_micros
            .fetch_add(elapsed.as_micros() as u64, Ordering::Relaxed);
    }

    /// Accounts for operations dropped without reaching the transport.
    pub(crate) fn record_discarded(&self, operations: u64) {
        self.failed.fetch_add(operations, Ordering::Relaxed);
    }

    /// Records `index` as being in bulk mode.
    ///
    /// Returns `false`, keeping the first saved interval, if the index is
    /// already in bulk mode.
    pub fn enter_bulk_mode(&self, index: &str, saved: RefreshInterval) -> bool {
        match self.bulk_mode.entry(index.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(entry) => {
                entry.insert(saved);
                true
            }
        }
    }

    /// Removes `index` from bulk mode, returning the interval to restore.
    pub fn exit_bulk_mode(&self, index: &str) -> Option<RefreshInterval> {
        self.bulk_mode.remove(index).map(|(_, saved)| saved)
    }

    pub fn is_bulk_mode(&self, index: &str) -> bool {
        self.bulk_mode.contains_key(index)
    }

    pub fn bulk_mode_indices(&self) -> Vec<String> {
        let mut indices = self
            .bulk_mode
            .iter()
            .map(|entry| entry.key().clone())
            .collect::<Vec<_>>();
        indices.sort();
        indices
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            in_flight_operations: self.in_flight_operations.load(Ordering::Relaxed),
            in_flight_bytes: self.in_flight_bytes.load(Ordering::Relaxed),
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            completed_batches: self.completed_batches.load(Ordering::Relaxed),
            total_elapsed: Duration::from_micros(self.total_elapsed_micros.load(Ordering::Relaxed)),
        }
    }
}

impl MetricsSnapshot {
    /// Mean time between handing a batch to the transport and reconciling it.
    pub fn mean_latency(&self) -> Duration {
        if self.completed_batches == 0 {
            return Duration::ZERO;
        }
        let micros = self.total_elapsed.as_micros() / u128::from(self.completed_batches);
        Duration::from_micros(u64::try_from(micros).unwrap_or(u64::MAX))
    }
}
