//! Client-side bulk ingestion for a shard-partitioned document cluster.
//!
//! Write operations submitted to a [`BulkClient`] are accumulated into
//! batches. A batch is sealed when it reaches the action count or volume
//! limit, or when the flush timer fires. Sealed batches are split into one
//! request per shard, encoded, and handed to a [`Transport`], with at most
//! `max_concurrent_batches` batches in flight.
//!
//! Results are reconciled on a dedicated task. Items rejected by the cluster
//! are counted as failed without affecting the client. A transport failure,
//! or a document that cannot be serialized, closes the client.
pub mod admin;
pub mod batch;
pub mod client;
pub mod error;
pub mod error_kind;
pub mod memory;
pub mod operation;
pub mod options;
pub mod replication;
pub mod routing;
pub mod state;
pub mod transport;

mod accumulator;
mod dispatcher;
mod in_flight;
mod metrics;
mod reconciler;
mod status;

pub use admin::{
    Admin, AdminError, ClusterHealth, ClusterHealthStatus, IndexSettings, RefreshInterval,
};
pub use batch::{BatchOutcome, ItemFailure, SealedBatch};
pub use client::{BulkClient, BulkClientBuilder};
pub use error::{IngestError, Result};
pub use error_kind::ErrorKind;
pub use memory::InMemoryCluster;
pub use operation::{OpKind, WriteOperation};
pub use options::IngestOptions;
pub use replication::{
    EncodedShardRequest, ItemResult, ItemStatus, ShardId, ShardReplicationRequest,
    ShardReplicationResponse,
};
pub use routing::{IndexRouting, RoutingTable, ShardRouter};
pub use state::{IngestMetricState, MetricsSnapshot};
pub use status::Lifecycle;
pub use transport::{Transport, TransportError};
