use std::time::Duration;

use tokio::sync::watch;

/// Number of sealed batches that have not been reconciled yet.
#[derive(Debug)]
pub(crate) struct InFlightBatches {
    tx: watch::Sender<usize>,
}

impl Default for InFlightBatches {
    fn default() -> Self {
        Self {
            tx: watch::Sender::new(0),
        }
    }
}

impl InFlightBatches {
    pub fn begin(&self) {
        self.tx.send_modify(|count| *count += 1);
    }

    pub fn finish(&self) {
        self.tx.send_modify(|count| *count = count.saturating_sub(1));
    }

    pub fn current(&self) -> usize {
        *self.tx.borrow()
    }

    /// Waits until no batch is in flight. Returns `false` on timeout.
    pub async fn wait_idle(&self, max_wait: Duration) -> bool {
        let mut rx = self.tx.subscribe();
        let idle = async move {
            let _ = rx.wait_for(|count| *count == 0).await;
        };

        tokio::time::timeout(max_wait, idle).await.is_ok()
    }
}
