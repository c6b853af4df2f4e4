use snafu::Snafu;

use crate::{
    admin::AdminError, error_kind::ErrorKind, replication::CodecError, transport::TransportError,
};

/// Errors returned by the bulk client.
///
/// Errors are `Clone` because a fatal error is captured once by the client
/// and then handed to every caller that asks for it.
#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub))]
pub enum IngestError {
    /// The client was shut down or a fatal error closed it.
    #[snafu(display("client is closed"))]
    ClientClosed,
    /// A document payload could not be serialized.
    ///
    /// This is fatal: the client closes and records the error.
    #[snafu(display("serialization error: {message}"))]
    Serialization { message: String },
    /// A batch could not be encoded into shard requests.
    #[snafu(display("failed to encode batch {execution_id}"))]
    Encode {
        execution_id: u64,
        source: CodecError,
    },
    /// A shard request of a batch failed at the transport level.
    #[snafu(display("transport failure in batch {execution_id}"))]
    Transport {
        execution_id: u64,
        source: TransportError,
    },
    /// An administrative call failed.
    #[snafu(display("admin operation {operation} failed"))]
    Admin {
        operation: &'static str,
        source: AdminError,
    },
    /// The client options failed validation.
    #[snafu(display("invalid options: {message}"))]
    InvalidOptions { message: String },
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;

impl IngestError {
    pub fn is_client_closed(&self) -> bool {
        matches!(self, IngestError::ClientClosed)
    }

    /// Serialization faults, either at submit or while encoding a batch.
    pub fn is_serialization(&self) -> bool {
        matches!(
            self,
            IngestError::Serialization { .. } | IngestError::Encode { .. }
        )
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, IngestError::Transport { .. })
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::ClientClosed => ErrorKind::Closed,
            IngestError::Serialization { .. } | IngestError::Encode { .. } => {
                ErrorKind::Validation
            }
            IngestError::Transport { source, .. } => source.kind(),
            IngestError::Admin { source, .. } => source.kind(),
            IngestError::InvalidOptions { .. } => ErrorKind::Configuration,
        }
    }
}
