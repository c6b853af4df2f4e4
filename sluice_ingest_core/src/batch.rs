use std::{fmt::Write, time::Duration};

use crate::operation::WriteOperation;

/// The batch currently accepting operations.
#[derive(Debug, Default)]
pub struct OpenBatch {
    operations: Vec<WriteOperation>,
    size_bytes: u64,
}

/// A batch that no longer accepts operations and is ready to be sent.
#[derive(Debug, Clone)]
pub struct SealedBatch {
    pub execution_id: u64,
    pub operations: Vec<WriteOperation>,
    pub size_bytes: u64,
}

/// A rejected item of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    /// Position of the item in the batch.
    pub position: usize,
    pub index: String,
    pub doc_type: String,
    pub id: Option<String>,
    pub reason: String,
}

/// The reconciled result of one batch.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub execution_id: u64,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Failed items, ordered by position.
    pub failures: Vec<ItemFailure>,
    pub elapsed: Duration,
    /// Whether the failure of this batch closed the client.
    pub terminal: bool,
}

impl OpenBatch {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn push(&mut self, operation: WriteOperation) {
        self.size_bytes += operation.estimated_size();
        self.operations.push(operation);
    }

    /// Seals the batch, leaving an empty batch in its place.
    pub fn seal(&mut self, execution_id: u64) -> SealedBatch {
        let batch = std::mem::take(self);
        SealedBatch {
            execution_id,
            operations: batch.operations,
            size_bytes: batch.size_bytes,
        }
    }
}

impl SealedBatch {
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Builds the failure record for the item at `position`.
    pub fn item_failure(&self, position: usize, reason: impl Into<String>) -> ItemFailure {
        let (index, doc_type, id) = match self.operations.get(position) {
            Some(op) => (op.index.clone(), op.doc_type.clone(), op.id.clone()),
            None => (String::new(), String::new(), None),
        };

        ItemFailure {
            position,
            index,
            doc_type,
            id,
            reason: reason.into(),
        }
    }

    /// An outcome where every item failed with the same reason.
    pub fn failed_outcome(&self, reason: &str, elapsed: Duration, terminal: bool) -> BatchOutcome {
        let failures = (0..self.len())
            .map(|position| self.item_failure(position, reason))
            .collect::<Vec<_>>();

        BatchOutcome {
            execution_id: self.execution_id,
            total: self.len(),
            succeeded: 0,
            failed: failures.len(),
            failures,
            elapsed,
            terminal,
        }
    }
}

impl BatchOutcome {
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// A multi-line message describing every failed item.
    pub fn failure_message(&self) -> String {
        let mut message = String::from("failure in bulk execution:");
        for failure in &self.failures {
            let _ = write!(
                message,
                "\n[{}]: index [{}], type [{}], id [{}], message [{}]",
                failure.position,
                failure.index,
                failure.doc_type,
                failure.id.as_deref().unwrap_or(""),
                failure.reason
            );
        }
        message
    }
}
