use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use tokio::sync::Mutex;

use crate::{
    batch::{OpenBatch, SealedBatch},
    error::{IngestError, Result},
    in_flight::InFlightBatches,
    operation::WriteOperation,
    state::IngestMetricState,
    status::ClientStatus,
};

/// Collects operations into the open batch and seals it when full.
///
/// Sealing and opening the next batch happen under the same lock, so
/// concurrent submitters never observe a missing open batch.
pub(crate) struct BatchAccumulator {
    open: Mutex<Buffer>,
    next_execution_id: AtomicU64,
    max_actions: usize,
    max_volume: u64,
    state: Arc<IngestMetricState>,
    status: Arc<ClientStatus>,
    in_flight: Arc<InFlightBatches>,
}

#[derive(Default)]
struct Buffer {
    batch: OpenBatch,
    /// Set by the final seal. No operation is accepted afterwards.
    closed: bool,
}

impl BatchAccumulator {
    pub fn new(
        max_actions: usize,
        max_volume: u64,
        state: Arc<IngestMetricState>,
        status: Arc<ClientStatus>,
        in_flight: Arc<InFlightBatches>,
    ) -> Self {
        Self {
            open: Mutex::new(Buffer::default()),
            next_execution_id: AtomicU64::new(1),
            max_actions,
            max_volume,
            state,
            status,
            in_flight,
        }
    }

    /// Adds `operation` to the open batch.
    ///
    /// Returns the batches sealed by this call, at most two: the previous
    /// batch if `operation` would overflow its volume, and the batch holding
    /// `operation` if it reached a limit.
    ///
    /// Fails with `ClientClosed`, without buffering `operation`, once the
    /// client stopped accepting work. The check runs under the batch lock so
    /// an accepted operation is always sealed by a later flush.
    pub async fn push(&self, operation: WriteOperation) -> Result<Vec<SealedBatch>> {
        let size = operation.estimated_size();
        let mut buffer = self.open.lock().await;
        if buffer.closed {
            return Err(IngestError::ClientClosed);
        }
        self.status.ensure_open()?;

        let open = &mut buffer.batch;
        let mut sealed = Vec::new();

        if !open.is_empty() && open.size_bytes() + size > self.max_volume {
            sealed.push(self.seal_locked(open));
        }

        open.push(operation);
        self.state.record_submitted(1);

        if open.len() >= self.max_actions || open.size_bytes() >= self.max_volume {
            sealed.push(self.seal_locked(open));
        }

        Ok(sealed)
    }

    /// Seals the open batch, if it holds any operation.
    pub async fn seal(&self) -> Option<SealedBatch> {
        let mut buffer = self.open.lock().await;
        if buffer.batch.is_empty() {
            return None;
        }
        Some(self.seal_locked(&mut buffer.batch))
    }

    /// Seals the open batch for the last time. Later pushes fail.
    pub async fn close(&self) -> Option<SealedBatch> {
        let mut buffer = self.open.lock().await;
        buffer.closed = true;
        if buffer.batch.is_empty() {
            return None;
        }
        Some(self.seal_locked(&mut buffer.batch))
    }

    fn seal_locked(&self, open: &mut OpenBatch) -> SealedBatch {
        let execution_id = self.next_execution_id.fetch_add(1, Ordering::Relaxed);
        self.in_flight.begin();
        open.seal(execution_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accumulator(max_actions: usize, max_volume: u64) -> BatchAccumulator {
        BatchAccumulator::new(
            max_actions,
            max_volume,
            Arc::new(IngestMetricState::new()),
            Arc::new(ClientStatus::default()),
            Arc::new(InFlightBatches::default()),
        )
    }

    fn doc(i: usize) -> WriteOperation {
        // 2 byte payload, 52 bytes estimated.
        WriteOperation::index("test", "doc", Some(format!("doc-{i}")), "{}")
    }

    #[tokio::test]
    async fn test_seals_on_action_count() {
        let accumulator = accumulator(1000, u64::MAX);
        let mut sealed = Vec::new();
        for i in 0..2500 {
            sealed.extend(accumulator.push(doc(i)).await.expect("push"));
        }
        assert_eq!(sealed.len(), 2);
        sealed.extend(accumulator.seal().await);
        assert_eq!(sealed.len(), 3);

        let sizes = sealed.iter().map(SealedBatch::len).collect::<Vec<_>>();
        assert_eq!(sizes, vec![1000, 1000, 500]);

        let ids = sealed.iter().map(|b| b.execution_id).collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 2, 3]);

        assert_eq!(accumulator.state.snapshot().submitted, 2500);
        assert_eq!(accumulator.in_flight.current(), 3);
        assert!(accumulator.seal().await.is_none());
    }

    #[tokio::test]
    async fn test_seals_before_volume_overflow() {
        let accumulator = accumulator(1000, 200);
        for i in 0..3 {
            assert!(accumulator.push(doc(i)).await.expect("push").is_empty());
        }

        // 4 * 52 > 200: the three buffered operations are sealed first.
        let sealed = accumulator.push(doc(3)).await.expect("push");
        assert_eq!(sealed.len(), 1);
        assert_eq!(sealed[0].len(), 3);
        assert_eq!(sealed[0].size_bytes, 156);

        let rest = accumulator.seal().await.expect("open batch");
        assert_eq!(rest.len(), 1);
        assert_eq!(rest.operations[0].id.as_deref(), Some("doc-3"));
    }

    #[tokio::test]
    async fn test_oversized_operation_forms_its_own_batch() {
        let accumulator = accumulator(1000, 100);
        assert!(accumulator.push(doc(0)).await.expect("push").is_empty());

        let big = WriteOperation::index("test", "doc", None, vec![b' '; 500]);
        let sealed = accumulator.push(big).await.expect("push");
        assert_eq!(sealed.len(), 2);
        assert_eq!(sealed[0].len(), 1);
        assert_eq!(sealed[1].len(), 1);
        assert_eq!(sealed[1].size_bytes, 550);
        assert!(accumulator.seal().await.is_none());
    }

    #[tokio::test]
    async fn test_close_seals_and_rejects_later_pushes() {
        let accumulator = accumulator(1000, u64::MAX);
        accumulator.push(doc(0)).await.expect("push");

        let last = accumulator.close().await.expect("open batch");
        assert_eq!(last.len(), 1);

        let err = accumulator.push(doc(1)).await.unwrap_err();
        assert!(err.is_client_closed());
        assert_eq!(accumulator.state.snapshot().submitted, 1);
        assert!(accumulator.close().await.is_none());
    }

    #[tokio::test]
    async fn test_push_fails_once_client_closing() {
        let accumulator = accumulator(1000, u64::MAX);
        accumulator.status.begin_closing();

        let err = accumulator.push(doc(0)).await.unwrap_err();
        assert!(err.is_client_closed());
        assert_eq!(accumulator.state.snapshot().submitted, 0);
        assert!(accumulator.seal().await.is_none());
    }
}
