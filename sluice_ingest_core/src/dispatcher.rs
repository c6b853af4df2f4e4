use std::{sync::Arc, time::Instant};

use futures::future::join_all;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, mpsc};
use tracing::{debug, warn};

use crate::{
    batch::{BatchOutcome, SealedBatch},
    error::{IngestError, Result},
    metrics::IngestionMetrics,
    replication::{ItemStatus, PartitionedBatch, partition},
    state::IngestMetricState,
    status::ClientStatus,
    transport::Transport,
};

/// The result of one sealed batch, sent to the reconciler.
pub(crate) struct Completion {
    pub execution_id: u64,
    pub actions: usize,
    pub size_bytes: u64,
    pub outcome: BatchOutcome,
    /// Set when the batch failed in a way that closes the client.
    pub cause: Option<IngestError>,
    /// `false` if the batch was dropped before reaching the transport.
    pub dispatched: bool,
    /// Admission slot, released once the completion is reconciled.
    pub permit: OwnedSemaphorePermit,
}

/// Hands sealed batches to the transport, at most `max_concurrent` at a time.
pub(crate) struct Dispatcher {
    transport: Arc<dyn Transport>,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    completions: mpsc::Sender<Completion>,
    state: Arc<IngestMetricState>,
    status: Arc<ClientStatus>,
    metrics: Arc<IngestionMetrics>,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        max_concurrent: usize,
        completions: mpsc::Sender<Completion>,
        state: Arc<IngestMetricState>,
        status: Arc<ClientStatus>,
        metrics: Arc<IngestionMetrics>,
    ) -> Self {
        Self {
            transport,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            completions,
            state,
            status,
            metrics,
        }
    }

    /// Sends `batch` in the background once an admission slot is free.
    ///
    /// Waits for the slot, which is how callers feel backpressure. If the
    /// client failed while waiting, the batch is dropped, its operations
    /// counted as failed, and `ClientClosed` is returned.
    pub async fn dispatch(&self, batch: SealedBatch) -> Result<()> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| IngestError::ClientClosed)?;

        if self.status.has_failure() {
            warn!(
                execution_id = batch.execution_id,
                actions = batch.len(),
                "client is closed, discarding batch"
            );
            let outcome = batch.failed_outcome("client is closed", Default::default(), false);
            self.complete(Completion {
                execution_id: batch.execution_id,
                actions: batch.len(),
                size_bytes: batch.size_bytes,
                outcome,
                cause: None,
                dispatched: false,
                permit,
            })
            .await;
            return Err(IngestError::ClientClosed);
        }

        self.before_send(&batch);

        let transport = self.transport.clone();
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let (mut outcome, cause) = execute_batch(transport.as_ref(), &batch).await;
            outcome.elapsed = started.elapsed();

            let completion = Completion {
                execution_id: batch.execution_id,
                actions: batch.len(),
                size_bytes: batch.size_bytes,
                outcome,
                cause,
                dispatched: true,
                permit,
            };

            if completions.send(completion).await.is_err() {
                warn!(
                    execution_id = batch.execution_id,
                    "reconciler stopped, dropping batch outcome"
                );
            }
        });

        Ok(())
    }

    fn before_send(&self, batch: &SealedBatch) {
        let concurrent = self.max_concurrent - self.permits.available_permits();
        debug!(
            execution_id = batch.execution_id,
            actions = batch.len(),
            bytes = batch.size_bytes,
            concurrent,
            "before bulk"
        );

        self.state
            .before_send(batch.len() as u64, batch.size_bytes);
        self.metrics.actions.add(batch.len() as u64, &[]);
        self.metrics.bytes.add(batch.size_bytes, &[]);
        self.metrics.in_flight_batches.add(1, &[]);
    }

    async fn complete(&self, completion: Completion) {
        if self.completions.send(completion).await.is_err() {
            warn!("reconciler stopped, dropping batch outcome");
        }
    }
}

/// Routes, encodes and sends every shard request of `batch`, then joins the
/// per-item results.
///
/// Items are accounted exactly once: unroutable items, items of a shard
/// whose request failed, and items missing from a shard response all count
/// as failed.
pub(crate) async fn execute_batch(
    transport: &dyn Transport,
    batch: &SealedBatch,
) -> (BatchOutcome, Option<IngestError>) {
    let execution_id = batch.execution_id;
    let PartitionedBatch {
        requests,
        unroutable,
    } = partition(batch, transport);

    let mut failures = unroutable;
    let mut encoded = Vec::with_capacity(requests.len());
    for request in &requests {
        match request.encode() {
            Ok(payload) => encoded.push((request.positions().collect::<Vec<_>>(), payload)),
            Err(source) => {
                let cause = IngestError::Encode {
                    execution_id,
                    source,
                };
                let outcome = batch.failed_outcome(&cause.to_string(), Default::default(), true);
                return (outcome, Some(cause));
            }
        }
    }

    let responses = join_all(encoded.into_iter().map(|(positions, request)| async move {
        let shard_id = request.shard_id;
        (shard_id, positions, transport.send(request).await)
    }))
    .await;

    let mut succeeded = 0;
    let mut cause = None;
    for (shard_id, positions, response) in responses {
        match response {
            Ok(response) => {
                let mut pending = vec![false; batch.len()];
                for position in &positions {
                    pending[*position] = true;
                }

                for item in response.items {
                    if !pending.get(item.position).copied().unwrap_or(false) {
                        warn!(
                            execution_id,
                            %shard_id,
                            position = item.position,
                            "ignoring unexpected item in shard response"
                        );
                        continue;
                    }
                    pending[item.position] = false;

                    match item.status {
                        ItemStatus::Ok { .. } => succeeded += 1,
                        ItemStatus::Failed { reason } => {
                            failures.push(batch.item_failure(item.position, reason))
                        }
                    }
                }

                for position in positions.into_iter().filter(|p| pending[*p]) {
                    failures.push(batch.item_failure(position, "no response for item"));
                }
            }
            Err(source) => {
                warn!(execution_id, %shard_id, error = %source, "shard request failed");
                let reason = source.to_string();
                for position in positions {
                    failures.push(batch.item_failure(position, reason.clone()));
                }
                cause.get_or_insert(IngestError::Transport {
                    execution_id,
                    source,
                });
            }
        }
    }

    failures.sort_by_key(|failure| failure.position);

    let outcome = BatchOutcome {
        execution_id,
        total: batch.len(),
        succeeded,
        failed: failures.len(),
        failures,
        elapsed: Default::default(),
        terminal: cause.is_some(),
    };

    (outcome, cause)
}
