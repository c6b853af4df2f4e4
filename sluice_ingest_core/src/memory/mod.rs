//! In-memory cluster.
//!
//! Implements both [`Transport`] and [`Admin`] on a single-process store.
//! It is used for testing and by the development server. Documents live in
//! a `HashMap` per index, behind a `RwLock`.

use std::collections::HashMap;

use async_trait::async_trait;
use snafu::ResultExt;
use tokio::sync::RwLock;

use crate::{
    admin::{
        Admin, AdminError, ClusterHealth, ClusterHealthStatus, IndexSettings, RefreshInterval,
        Result,
    },
    replication::{
        EncodedShardRequest, ItemResult, ShardId, ShardReplicationRequest,
        ShardReplicationResponse,
    },
    routing::{IndexRouting, RoutingError, RoutingTable, ShardRouter},
    transport::{MalformedRequestSnafu, Transport, TransportError},
};

mod metrics;
mod store;

use self::{metrics::ClusterMetrics, store::IndexState};

pub use self::store::StoredDocument;

#[derive(Debug, Default)]
struct ClusterStore {
    indices: HashMap<String, IndexState>,
    /// Next unused cluster-wide shard id.
    next_shard: u32,
}

#[derive(Debug)]
pub struct InMemoryCluster {
    store: RwLock<ClusterStore>,
    routing: RoutingTable,
    number_of_nodes: u32,
    metrics: ClusterMetrics,
}

impl Default for InMemoryCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCluster {
    /// Create a single node cluster.
    pub fn new() -> Self {
        Self::with_nodes(1)
    }

    /// Create a cluster reporting `number_of_nodes` nodes.
    ///
    /// Replicas are only allocated when there are enough nodes, which
    /// drives the reported health.
    pub fn with_nodes(number_of_nodes: u32) -> Self {
        Self {
            store: RwLock::new(ClusterStore::default()),
            routing: RoutingTable::default(),
            number_of_nodes: number_of_nodes.max(1),
            metrics: ClusterMetrics::default(),
        }
    }

    /// Applies the present items of `request` to the shard's index.
    pub async fn replicate(
        &self,
        request: ShardReplicationRequest,
    ) -> std::result::Result<ShardReplicationResponse, TransportError> {
        let shard_id = request.shard_id;
        let mut store = self.store.write().await;

        let (index_name, index) = store
            .indices
            .iter_mut()
            .find(|(_, index)| index.routing.contains(shard_id))
            .ok_or(TransportError::ShardNotFound { shard_id })?;

        let mut items = Vec::with_capacity(request.num_items());
        let mut added = 0;
        for (position, op) in request.items.into_iter().enumerate() {
            let Some(op) = op else {
                continue;
            };

            if &op.index != index_name || index.routing.shard_for(op.id.as_deref()) != shard_id {
                let reason = format!(
                    "routing_mismatch_exception: document of index [{}] does not belong to shard [{}]",
                    op.index, shard_id
                );
                items.push(ItemResult::failed(position, reason));
                continue;
            }

            let (delta, result) = index.apply(op);
            added += delta;
            items.push(match result {
                Ok((id, version)) => ItemResult::ok(position, id, version),
                Err(reason) => ItemResult::failed(position, reason),
            });
        }

        self.metrics.documents_count.add(added, &[]);

        Ok(ShardReplicationResponse { shard_id, items })
    }

    /// Number of documents in `index`.
    pub async fn count(&self, index: &str) -> Result<u64> {
        let store = self.store.read().await;
        store
            .indices
            .get(index)
            .map(|state| state.documents.len() as u64)
            .ok_or_else(|| AdminError::index_not_found(index))
    }

    pub async fn get_document(&self, index: &str, id: &str) -> Option<StoredDocument> {
        let store = self.store.read().await;
        store.indices.get(index)?.documents.get(id).cloned()
    }

    pub async fn index_settings(&self, index: &str) -> Result<IndexSettings> {
        let store = self.store.read().await;
        store
            .indices
            .get(index)
            .map(|state| state.settings.clone())
            .ok_or_else(|| AdminError::index_not_found(index))
    }

    pub fn routing_table(&self) -> HashMap<String, IndexRouting> {
        self.routing.snapshot()
    }

    async fn with_index<T>(&self, index: &str, f: impl FnOnce(&mut IndexState) -> T) -> Result<T> {
        let mut store = self.store.write().await;
        store
            .indices
            .get_mut(index)
            .map(f)
            .ok_or_else(|| AdminError::index_not_found(index))
    }
}

impl ShardRouter for InMemoryCluster {
    fn route(&self, index: &str, id: Option<&str>) -> std::result::Result<ShardId, RoutingError> {
        self.routing.route(index, id)
    }
}

#[async_trait]
impl Transport for InMemoryCluster {
    async fn send(
        &self,
        request: EncodedShardRequest,
    ) -> std::result::Result<ShardReplicationResponse, TransportError> {
        let request =
            ShardReplicationRequest::try_decode(request.payload).context(MalformedRequestSnafu {})?;
        self.replicate(request).await
    }
}

#[async_trait]
impl Admin for InMemoryCluster {
    async fn create_index(&self, index: &str, settings: IndexSettings) -> Result<()> {
        validate_index_name(index)?;

        if settings.number_of_shards == 0 {
            return Err(AdminError::InvalidArgument {
                resource: "index",
                message: "number_of_shards must be greater than zero".to_string(),
            });
        }

        let mut store = self.store.write().await;
        if store.indices.contains_key(index) {
            return Err(AdminError::AlreadyExists {
                resource: "index",
                message: index.to_string(),
            });
        }

        let routing = IndexRouting::new(store.next_shard, settings.number_of_shards);
        store.next_shard += settings.number_of_shards;
        store
            .indices
            .insert(index.to_string(), IndexState::new(settings, routing));
        self.routing.insert(index, routing);

        self.metrics.indices_count.add(1, &[]);

        Ok(())
    }

    async fn delete_index(&self, index: &str) -> Result<()> {
        let mut store = self.store.write().await;
        let removed = store
            .indices
            .remove(index)
            .ok_or_else(|| AdminError::index_not_found(index))?;
        self.routing.remove(index);

        self.metrics.indices_count.add(-1, &[]);
        self.metrics
            .documents_count
            .add(-(removed.documents.len() as i64), &[]);

        Ok(())
    }

    async fn put_mapping(
        &self,
        index: &str,
        doc_type: &str,
        mapping: serde_json::Value,
    ) -> Result<()> {
        if !mapping.is_object() {
            return Err(AdminError::InvalidArgument {
                resource: "mapping",
                message: format!("mapping for type [{doc_type}] must be an object"),
            });
        }

        self.with_index(index, |state| {
            state.settings.mappings.insert(doc_type.to_string(), mapping);
        })
        .await
    }

    async fn refresh_interval(&self, index: &str) -> Result<RefreshInterval> {
        self.with_index(index, |state| state.settings.refresh_interval)
            .await
    }

    async fn set_refresh_interval(&self, index: &str, interval: RefreshInterval) -> Result<()> {
        self.with_index(index, |state| state.settings.refresh_interval = interval)
            .await
    }

    async fn set_replica_count(&self, index: &str, replicas: u32) -> Result<()> {
        self.with_index(index, |state| state.settings.number_of_replicas = replicas)
            .await
    }

    async fn refresh_index(&self, index: &str) -> Result<()> {
        self.with_index(index, |state| state.refresh_count += 1)
            .await
    }

    async fn flush_index(&self, index: &str) -> Result<()> {
        self.with_index(index, |state| state.flush_count += 1)
            .await
    }

    async fn cluster_health(&self) -> Result<ClusterHealth> {
        let store = self.store.read().await;
        let max_replicas = self.number_of_nodes - 1;

        let mut status = ClusterHealthStatus::Green;
        let mut active_shards = 0;
        for state in store.indices.values() {
            let settings = &state.settings;
            if settings.number_of_replicas > max_replicas {
                status = ClusterHealthStatus::Yellow;
            }
            let copies = 1 + settings.number_of_replicas.min(max_replicas);
            active_shards += settings.number_of_shards * copies;
        }

        Ok(ClusterHealth {
            status,
            number_of_nodes: self.number_of_nodes,
            number_of_indices: store.indices.len(),
            active_shards,
        })
    }
}

fn validate_index_name(index: &str) -> Result<()> {
    let invalid = index.is_empty()
        || index.starts_with(['_', '-', '+'])
        || index.chars().any(|c| c.is_uppercase() || "\\/*?\"<>| ,#:".contains(c));

    if invalid {
        return Err(AdminError::InvalidArgument {
            resource: "index",
            message: format!("invalid_index_name_exception: [{index}]"),
        });
    }

    Ok(())
}
