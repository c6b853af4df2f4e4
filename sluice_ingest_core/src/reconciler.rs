use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error};

use crate::{
    batch::BatchOutcome, dispatcher::Completion, in_flight::InFlightBatches,
    metrics::IngestionMetrics, state::IngestMetricState, status::ClientStatus,
};

/// Applies batch completions to the client state, one at a time.
pub(crate) struct Reconciler {
    state: Arc<IngestMetricState>,
    status: Arc<ClientStatus>,
    in_flight: Arc<InFlightBatches>,
    outcomes: broadcast::Sender<Arc<BatchOutcome>>,
    metrics: Arc<IngestionMetrics>,
}

impl Reconciler {
    pub fn new(
        state: Arc<IngestMetricState>,
        status: Arc<ClientStatus>,
        in_flight: Arc<InFlightBatches>,
        outcomes: broadcast::Sender<Arc<BatchOutcome>>,
        metrics: Arc<IngestionMetrics>,
    ) -> Self {
        Self {
            state,
            status,
            in_flight,
            outcomes,
            metrics,
        }
    }

    /// Runs until every sender is gone: the client and all the batches it
    /// dispatched. Batches still running after shutdown are reconciled too.
    pub async fn run(self, mut rx: mpsc::Receiver<Completion>) {
        while let Some(completion) = rx.recv().await {
            self.reconcile(completion);
        }

        debug!("reconciler stopped");
    }

    fn reconcile(&self, completion: Completion) {
        let Completion {
            execution_id,
            actions,
            size_bytes,
            outcome,
            cause,
            dispatched,
            permit,
        } = completion;

        if dispatched {
            self.state.after_send(
                actions as u64,
                size_bytes,
                outcome.succeeded as u64,
                outcome.failed as u64,
                outcome.elapsed,
            );
            self.metrics.in_flight_batches.add(-1, &[]);
            self.metrics
                .batch_duration
                .record(outcome.elapsed.as_secs_f64(), &[]);

            debug!(
                execution_id,
                succeeded = outcome.succeeded,
                failed = outcome.failed,
                elapsed_ms = outcome.elapsed.as_millis() as u64,
                "after bulk"
            );
        } else {
            self.state.record_discarded(actions as u64);
        }

        if outcome.failed > 0 {
            self.metrics.failed_items.add(outcome.failed as u64, &[]);
        }

        match cause {
            Some(cause) => {
                error!(execution_id, error = %cause, "bulk execution failed, closing client");
                self.status.latch(cause);
            }
            None if dispatched && outcome.has_failures() => {
                error!(
                    execution_id,
                    failed = outcome.failed,
                    "bulk execution has failures: {}",
                    outcome.failure_message()
                );
            }
            None => {}
        }

        // Release the slot after latching so a dispatch waiting on it sees
        // the failure.
        drop(permit);

        let _ = self.outcomes.send(Arc::new(outcome));
        self.in_flight.finish();
    }
}
