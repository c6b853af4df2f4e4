use async_trait::async_trait;
use snafu::Snafu;

use crate::{
    error_kind::ErrorKind,
    replication::{CodecError, EncodedShardRequest, ShardId, ShardReplicationResponse},
    routing::ShardRouter,
};

/// Errors raised while delivering a shard request.
///
/// Any of these fails the whole batch and closes the client.
#[derive(Debug, Clone, Snafu)]
#[snafu(visibility(pub))]
pub enum TransportError {
    #[snafu(display("connection error: {message}"))]
    Connection { message: String },
    #[snafu(display("remote error: status={status}, message={message}"))]
    Remote { status: u16, message: String },
    #[snafu(display("no such shard {shard_id}"))]
    ShardNotFound { shard_id: ShardId },
    #[snafu(display("malformed shard request"))]
    MalformedRequest { source: CodecError },
    #[snafu(display("malformed shard response: {message}"))]
    MalformedResponse { message: String },
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::Connection { .. } => ErrorKind::Temporary,
            TransportError::Remote { status, .. } => ErrorKind::from_status(*status),
            TransportError::ShardNotFound { .. } => ErrorKind::NotFound,
            TransportError::MalformedRequest { .. } => ErrorKind::Validation,
            TransportError::MalformedResponse { .. } => ErrorKind::Internal,
        }
    }
}

/// Delivers shard requests to the cluster.
///
/// The client calls `send` once per shard request of a batch and joins all
/// the responses. Routing is part of the transport because only the
/// cluster side knows the shard layout.
#[async_trait]
pub trait Transport: ShardRouter {
    async fn send(
        &self,
        request: EncodedShardRequest,
    ) -> Result<ShardReplicationResponse, TransportError>;
}
