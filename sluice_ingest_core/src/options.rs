use std::{num::NonZeroUsize, time::Duration};

use bytesize::ByteSize;

use crate::error::{IngestError, Result};

/// Options controlling how the bulk client batches and sends operations.
///
/// Options are fixed once the client starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    /// Seal a batch once it holds this many operations.
    pub max_actions_per_batch: usize,
    /// Seal a batch once its estimated size reaches this volume.
    pub max_volume_per_batch: ByteSize,
    /// Maximum number of batches handed to the transport at the same time.
    pub max_concurrent_batches: usize,
    /// Seal and send the open batch at this interval, even if it is not full.
    pub flush_interval: Duration,
    /// How long `shutdown` waits for in-flight batches.
    pub shutdown_timeout: Duration,
}

impl IngestOptions {
    pub const DEFAULT_MAX_ACTIONS_PER_BATCH: usize = 1000;
    pub const DEFAULT_MAX_VOLUME_PER_BATCH: ByteSize = ByteSize::mib(10);
    pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(30);
    pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_actions_per_batch(mut self, max_actions: usize) -> Self {
        self.max_actions_per_batch = max_actions;
        self
    }

    pub fn with_max_volume_per_batch(mut self, max_volume: ByteSize) -> Self {
        self.max_volume_per_batch = max_volume;
        self
    }

    pub fn with_max_concurrent_batches(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent_batches = max_concurrent;
        self
    }

    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    pub fn with_shutdown_timeout(mut self, shutdown_timeout: Duration) -> Self {
        self.shutdown_timeout = shutdown_timeout;
        self
    }

    /// Checks that all limits are usable.
    pub fn validate(&self) -> Result<()> {
        if self.max_actions_per_batch == 0 {
            return Err(invalid("max_actions_per_batch must be greater than zero"));
        }

        if self.max_volume_per_batch.as_u64() == 0 {
            return Err(invalid("max_volume_per_batch must be greater than zero"));
        }

        if self.max_concurrent_batches == 0 {
            return Err(invalid("max_concurrent_batches must be greater than zero"));
        }

        // tokio intervals panic on a zero period.
        if self.flush_interval.is_zero() {
            return Err(invalid("flush_interval must be greater than zero"));
        }

        Ok(())
    }
}

impl Default for IngestOptions {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);

        Self {
            max_actions_per_batch: Self::DEFAULT_MAX_ACTIONS_PER_BATCH,
            max_volume_per_batch: Self::DEFAULT_MAX_VOLUME_PER_BATCH,
            max_concurrent_batches: cpus * 2,
            flush_interval: Self::DEFAULT_FLUSH_INTERVAL,
            shutdown_timeout: Self::DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

fn invalid(message: &str) -> IngestError {
    IngestError::InvalidOptions {
        message: message.to_string(),
    }
}
