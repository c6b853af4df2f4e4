use std::sync::{
    OnceLock,
    atomic::{AtomicU8, Ordering},
};

use crate::error::{IngestError, Result};

/// Lifecycle of a bulk client.
///
/// A client only moves forward: `Open` to `Closing` on shutdown, and to
/// `Closed` once shutdown completes or a fatal error is latched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Lifecycle {
    Open = 0,
    Closing = 1,
    Closed = 2,
}

/// Lifecycle plus the write-once fatal failure of a client.
#[derive(Debug, Default)]
pub(crate) struct ClientStatus {
    lifecycle: AtomicU8,
    failure: OnceLock<IngestError>,
}

impl Lifecycle {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Lifecycle::Open,
            1 => Lifecycle::Closing,
            _ => Lifecycle::Closed,
        }
    }
}

impl ClientStatus {
    pub fn lifecycle(&self) -> Lifecycle {
        Lifecycle::from_u8(self.lifecycle.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.lifecycle() == Lifecycle::Open
    }

    /// Fails with `ClientClosed` unless the client accepts new work.
    pub fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(IngestError::ClientClosed)
        }
    }

    /// Captures `cause` and closes the client.
    ///
    /// Only the first cause is kept. Returns whether this call set it.
    pub fn latch(&self, cause: IngestError) -> bool {
        let first = self.failure.set(cause).is_ok();
        self.lifecycle
            .store(Lifecycle::Closed as u8, Ordering::Release);
        first
    }

    pub fn failure(&self) -> Option<&IngestError> {
        self.failure.get()
    }

    pub fn has_failure(&self) -> bool {
        self.failure.get().is_some()
    }

    pub fn begin_closing(&self) {
        let _ = self.lifecycle.compare_exchange(
            Lifecycle::Open as u8,
            Lifecycle::Closing as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    pub fn close(&self) {
        self.lifecycle
            .store(Lifecycle::Closed as u8, Ordering::Release);
    }
}
