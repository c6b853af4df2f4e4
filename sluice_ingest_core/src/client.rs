use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use bytes::Bytes;
use serde::de::IgnoredAny;
use snafu::ResultExt;
use tokio::{
    sync::{Mutex, broadcast, mpsc},
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    accumulator::BatchAccumulator,
    admin::{Admin, ClusterHealth, ClusterHealthStatus, IndexSettings, RefreshInterval},
    batch::BatchOutcome,
    dispatcher::Dispatcher,
    error::{AdminSnafu, IngestError, Result},
    in_flight::InFlightBatches,
    metrics::IngestionMetrics,
    operation::WriteOperation,
    options::IngestOptions,
    reconciler::Reconciler,
    state::{IngestMetricState, MetricsSnapshot},
    status::{ClientStatus, Lifecycle},
    transport::Transport,
};

const OUTCOME_CHANNEL_CAPACITY: usize = 128;

/// Batches write operations and ships them to the cluster.
///
/// The client is cheap to clone; clones share the same batches, metrics and
/// lifecycle. It must be created inside a tokio runtime.
#[derive(Clone)]
pub struct BulkClient {
    inner: Arc<ClientInner>,
}

pub struct BulkClientBuilder {
    transport: Arc<dyn Transport>,
    admin: Arc<dyn Admin>,
    options: IngestOptions,
    state: Option<Arc<IngestMetricState>>,
}

struct ClientInner {
    options: IngestOptions,
    accumulator: BatchAccumulator,
    dispatcher: Dispatcher,
    admin: Arc<dyn Admin>,
    state: Arc<IngestMetricState>,
    status: Arc<ClientStatus>,
    in_flight: Arc<InFlightBatches>,
    outcomes: broadcast::Sender<Arc<BatchOutcome>>,
    /// Set once shutdown completed.
    shutdown: Mutex<bool>,
    ct: CancellationToken,
}

impl BulkClientBuilder {
    pub fn with_options(mut self, options: IngestOptions) -> Self {
        self.options = options;
        self
    }

    /// Use `state` instead of a fresh metric state.
    pub fn with_state(mut self, state: Arc<IngestMetricState>) -> Self {
        self.state = Some(state);
        self
    }

    /// Validates the options and starts the background tasks.
    pub fn start(self) -> Result<BulkClient> {
        let options = self.options;
        options.validate()?;

        let state = self.state.unwrap_or_default();
        let status = Arc::new(ClientStatus::default());
        let in_flight = Arc::new(InFlightBatches::default());
        let metrics = Arc::new(IngestionMetrics::default());
        let (completions_tx, completions_rx) = mpsc::channel(options.max_concurrent_batches);
        let (outcomes, _) = broadcast::channel(OUTCOME_CHANNEL_CAPACITY);
        let ct = CancellationToken::new();

        let reconciler = Reconciler::new(
            state.clone(),
            status.clone(),
            in_flight.clone(),
            outcomes.clone(),
            metrics.clone(),
        );
        tokio::spawn(reconciler.run(completions_rx));

        let accumulator = BatchAccumulator::new(
            options.max_actions_per_batch,
            options.max_volume_per_batch.as_u64(),
            state.clone(),
            status.clone(),
            in_flight.clone(),
        );

        let dispatcher = Dispatcher::new(
            self.transport,
            options.max_concurrent_batches,
            completions_tx,
            state.clone(),
            status.clone(),
            metrics,
        );

        info!(
            max_actions = options.max_actions_per_batch,
            max_volume = %options.max_volume_per_batch,
            max_concurrent = options.max_concurrent_batches,
            flush_interval_ms = options.flush_interval.as_millis() as u64,
            "bulk client started"
        );

        let inner = Arc::new(ClientInner {
            options,
            accumulator,
            dispatcher,
            admin: self.admin,
            state,
            status,
            in_flight,
            outcomes,
            shutdown: Mutex::new(false),
            ct,
        });

        tokio::spawn(run_flush_timer(
            Arc::downgrade(&inner),
            inner.options.flush_interval,
            inner.ct.clone(),
        ));

        Ok(BulkClient { inner })
    }
}

impl BulkClient {
    pub fn builder(transport: Arc<dyn Transport>, admin: Arc<dyn Admin>) -> BulkClientBuilder {
        BulkClientBuilder {
            transport,
            admin,
            options: IngestOptions::default(),
            state: None,
        }
    }

    /// Index a JSON document. A `None` id lets the cluster assign one.
    pub async fn index(
        &self,
        index: &str,
        doc_type: &str,
        id: Option<&str>,
        source: impl Into<Bytes>,
    ) -> Result<()> {
        let source = self.validated_source(index, source.into())?;
        self.submit(WriteOperation::index(
            index,
            doc_type,
            id.map(str::to_string),
            source,
        ))
        .await
    }

    /// Merge `source` into a document, inserting it if it does not exist.
    pub async fn update(
        &self,
        index: &str,
        doc_type: &str,
        id: &str,
        source: impl Into<Bytes>,
    ) -> Result<()> {
        let source = self.validated_source(index, source.into())?;
        self.submit(WriteOperation::upsert(index, doc_type, id, source))
            .await
    }

    pub async fn delete(&self, index: &str, doc_type: &str, id: &str) -> Result<()> {
        self.submit(WriteOperation::delete(index, doc_type, id))
            .await
    }

    /// Adds `operation` to the open batch, sending any batch it fills.
    ///
    /// Only waits when all admission slots are taken. Every batch sealed by
    /// this call is handed to the dispatcher, even after the first one fails,
    /// so each of them is reconciled.
    pub async fn submit(&self, operation: WriteOperation) -> Result<()> {
        let sealed = self.inner.accumulator.push(operation).await?;

        let mut result = Ok(());
        for batch in sealed {
            let dispatched = self.inner.dispatcher.dispatch(batch).await;
            if result.is_ok() {
                result = dispatched;
            }
        }

        result
    }

    /// Sends the open batch, even if it is not full.
    pub async fn flush(&self) -> Result<()> {
        self.inner.status.ensure_open()?;
        self.inner.flush().await
    }

    /// Waits up to `max_wait` for all sealed batches to complete.
    ///
    /// Returns `false` if batches are still in flight after `max_wait`.
    pub async fn wait_for_responses(&self, max_wait: Duration) -> bool {
        let idle = self.inner.in_flight.wait_idle(max_wait).await;
        if !idle {
            warn!(
                in_flight = self.inner.in_flight.current(),
                "still waiting for responses"
            );
        }
        idle
    }

    /// Flushes, waits for in-flight batches, restores the refresh interval
    /// of every index still in bulk mode and stops the background tasks.
    ///
    /// Calling it again has no effect.
    pub async fn shutdown(&self) -> Result<()> {
        let inner = &self.inner;
        let mut done = inner.shutdown.lock().await;
        if *done {
            return Ok(());
        }

        info!("shutting down bulk client");
        inner.status.begin_closing();

        if let Some(batch) = inner.accumulator.close().await {
            if let Err(err) = inner.dispatcher.dispatch(batch).await {
                debug!(error = %err, "final flush failed");
            }
        }

        if !inner.in_flight.wait_idle(inner.options.shutdown_timeout).await {
            warn!(
                in_flight = inner.in_flight.current(),
                timeout_ms = inner.options.shutdown_timeout.as_millis() as u64,
                "still waiting for responses, closing anyway"
            );
        }

        let restored = inner.restore_bulk_mode().await;

        inner.ct.cancel();
        inner.status.close();
        *done = true;

        let metrics = inner.state.snapshot();
        info!(
            submitted = metrics.submitted,
            succeeded = metrics.succeeded,
            failed = metrics.failed,
            "bulk client closed"
        );

        restored
    }

    /// Lowers the refresh interval of `index` for the duration of a bulk load.
    ///
    /// The current interval is saved and restored by [`Self::stop_bulk`] or
    /// at shutdown. Does nothing if the index is already in bulk mode.
    pub async fn start_bulk(&self, index: &str, bulk_refresh_interval: RefreshInterval) -> Result<()> {
        self.inner.status.ensure_open()?;

        if self.inner.state.is_bulk_mode(index) {
            return Ok(());
        }

        let saved = self
            .inner
            .admin
            .refresh_interval(index)
            .await
            .context(AdminSnafu {
                operation: "refresh_interval",
            })?;

        if !self.inner.state.enter_bulk_mode(index, saved) {
            return Ok(());
        }

        if let Err(source) = self
            .inner
            .admin
            .set_refresh_interval(index, bulk_refresh_interval)
            .await
        {
            self.inner.state.exit_bulk_mode(index);
            return Err(IngestError::Admin {
                operation: "set_refresh_interval",
                source,
            });
        }

        info!(index, saved = %saved, bulk = %bulk_refresh_interval, "started bulk mode");

        Ok(())
    }

    /// Restores the refresh interval saved by [`Self::start_bulk`].
    pub async fn stop_bulk(&self, index: &str) -> Result<()> {
        let Some(saved) = self.inner.state.exit_bulk_mode(index) else {
            return Ok(());
        };

        self.inner
            .admin
            .set_refresh_interval(index, saved)
            .await
            .context(AdminSnafu {
                operation: "set_refresh_interval",
            })?;

        info!(index, restored = %saved, "stopped bulk mode");

        Ok(())
    }

    pub async fn new_index(&self, index: &str, settings: IndexSettings) -> Result<()> {
        self.inner
            .admin
            .create_index(index, settings)
            .await
            .context(AdminSnafu {
                operation: "create_index",
            })
    }

    /// Deletes `index`, forgetting any bulk mode entry for it.
    pub async fn delete_index(&self, index: &str) -> Result<()> {
        self.inner.state.exit_bulk_mode(index);
        self.inner
            .admin
            .delete_index(index)
            .await
            .context(AdminSnafu {
                operation: "delete_index",
            })
    }

    pub async fn put_mapping(
        &self,
        index: &str,
        doc_type: &str,
        mapping: serde_json::Value,
    ) -> Result<()> {
        self.inner
            .admin
            .put_mapping(index, doc_type, mapping)
            .await
            .context(AdminSnafu {
                operation: "put_mapping",
            })
    }

    pub async fn refresh_index(&self, index: &str) -> Result<()> {
        self.inner
            .admin
            .refresh_index(index)
            .await
            .context(AdminSnafu {
                operation: "refresh_index",
            })
    }

    pub async fn flush_index(&self, index: &str) -> Result<()> {
        self.inner
            .admin
            .flush_index(index)
            .await
            .context(AdminSnafu {
                operation: "flush_index",
            })
    }

    /// Sets the replica count of `index`, then waits for the cluster to be
    /// at least yellow.
    pub async fn update_replica_level(
        &self,
        index: &str,
        replicas: u32,
        timeout: Duration,
    ) -> Result<ClusterHealth> {
        self.inner
            .admin
            .set_replica_count(index, replicas)
            .await
            .context(AdminSnafu {
                operation: "set_replica_count",
            })?;

        self.wait_for_cluster(ClusterHealthStatus::Yellow, timeout)
            .await
    }

    pub async fn wait_for_cluster(
        &self,
        status: ClusterHealthStatus,
        timeout: Duration,
    ) -> Result<ClusterHealth> {
        crate::admin::wait_for_cluster_status(self.inner.admin.as_ref(), status, timeout)
            .await
            .context(AdminSnafu {
                operation: "wait_for_cluster",
            })
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.state.snapshot()
    }

    pub fn state(&self) -> Arc<IngestMetricState> {
        self.inner.state.clone()
    }

    pub fn options(&self) -> &IngestOptions {
        &self.inner.options
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.status.lifecycle()
    }

    pub fn is_closed(&self) -> bool {
        self.lifecycle() == Lifecycle::Closed
    }

    pub fn has_failure(&self) -> bool {
        self.inner.status.has_failure()
    }

    /// The error that closed the client, if any.
    pub fn failure(&self) -> Option<IngestError> {
        self.inner.status.failure().cloned()
    }

    /// Receives the outcome of every batch completed after this call.
    pub fn subscribe_outcomes(&self) -> broadcast::Receiver<Arc<BatchOutcome>> {
        self.inner.outcomes.subscribe()
    }

    /// Checks that `source` is a JSON document.
    ///
    /// A malformed source closes the client.
    fn validated_source(&self, index: &str, source: Bytes) -> Result<Bytes> {
        self.inner.status.ensure_open()?;

        if let Err(err) = serde_json::from_slice::<IgnoredAny>(&source) {
            let error = IngestError::Serialization {
                message: format!("invalid document source for index [{index}]: {err}"),
            };
            self.inner.status.latch(error.clone());
            return Err(error);
        }

        Ok(source)
    }
}

impl ClientInner {
    async fn flush(&self) -> Result<()> {
        if let Some(batch) = self.accumulator.seal().await {
            self.dispatcher.dispatch(batch).await?;
        }
        Ok(())
    }

    /// Restores every index still in bulk mode, exactly once each.
    async fn restore_bulk_mode(&self) -> Result<()> {
        let mut first_error = None;

        for index in self.state.bulk_mode_indices() {
            let Some(saved) = self.state.exit_bulk_mode(&index) else {
                continue;
            };

            match self.admin.set_refresh_interval(&index, saved).await {
                Ok(()) => info!(index, restored = %saved, "stopped bulk mode"),
                Err(source) => {
                    warn!(index, error = %source, "failed to restore refresh interval");
                    first_error.get_or_insert(IngestError::Admin {
                        operation: "set_refresh_interval",
                        source,
                    });
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

async fn run_flush_timer(inner: Weak<ClientInner>, period: Duration, ct: CancellationToken) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ct.cancelled() => {
                break;
            }
            _ = interval.tick() => {
                let Some(inner) = inner.upgrade() else {
                    break;
                };

                if !inner.status.is_open() {
                    continue;
                }

                if let Err(err) = inner.flush().await {
                    debug!(error = %err, "periodic flush failed");
                }
            }
        }
    }
}
