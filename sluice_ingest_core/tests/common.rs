#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::Semaphore;
use sluice_ingest_core::{
    Admin, AdminError, BulkClient, ClusterHealth, EncodedShardRequest, InMemoryCluster,
    IndexSettings, IngestOptions, RefreshInterval, ShardId, ShardReplicationRequest,
    ShardReplicationResponse, ShardRouter, Transport, TransportError, routing::RoutingError,
};

/// Options with the flush timer effectively disabled.
pub fn test_options() -> IngestOptions {
    IngestOptions::new()
        .with_max_concurrent_batches(4)
        .with_flush_interval(Duration::from_secs(3600))
        .with_shutdown_timeout(Duration::from_secs(10))
}

pub async fn create_cluster(indices: &[(&str, u32)]) -> Arc<InMemoryCluster> {
    let cluster = Arc::new(InMemoryCluster::new());
    for (index, shards) in indices {
        cluster
            .create_index(index, IndexSettings::default().with_shards(*shards))
            .await
            .expect("create_index");
    }
    cluster
}

pub fn start_client(cluster: Arc<InMemoryCluster>, options: IngestOptions) -> BulkClient {
    BulkClient::builder(cluster.clone(), cluster)
        .with_options(options)
        .start()
        .expect("start client")
}

pub fn doc_id(i: usize) -> String {
    format!("doc-{i}")
}

pub fn doc_source(i: usize) -> String {
    format!(r#"{{"n":{i},"message":"document number {i}"}}"#)
}

/// Transport that records how many requests are in progress at once.
pub struct RecordingTransport {
    inner: Arc<InMemoryCluster>,
    delay: Duration,
    current: AtomicUsize,
    max_observed: AtomicUsize,
    requests: AtomicUsize,
}

impl RecordingTransport {
    pub fn new(inner: Arc<InMemoryCluster>, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            current: AtomicUsize::new(0),
            max_observed: AtomicUsize::new(0),
            requests: AtomicUsize::new(0),
        }
    }

    pub fn max_observed(&self) -> usize {
        self.max_observed.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl ShardRouter for RecordingTransport {
    fn route(&self, index: &str, id: Option<&str>) -> Result<ShardId, RoutingError> {
        self.inner.route(index, id)
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(
        &self,
        request: EncodedShardRequest,
    ) -> Result<ShardReplicationResponse, TransportError> {
        let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_observed.fetch_max(current, Ordering::SeqCst);
        self.requests.fetch_add(1, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        let response = self.inner.send(request).await;

        self.current.fetch_sub(1, Ordering::SeqCst);
        response
    }
}

/// Transport that fails every shard request containing `poison_id`.
pub struct FailingTransport {
    inner: Arc<InMemoryCluster>,
    poison_id: String,
    failures: AtomicUsize,
}

impl FailingTransport {
    pub fn new(inner: Arc<InMemoryCluster>, poison_id: impl Into<String>) -> Self {
        Self {
            inner,
            poison_id: poison_id.into(),
            failures: AtomicUsize::new(0),
        }
    }

    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }
}

impl ShardRouter for FailingTransport {
    fn route(&self, index: &str, id: Option<&str>) -> Result<ShardId, RoutingError> {
        self.inner.route(index, id)
    }
}

#[async_trait]
impl Transport for FailingTransport {
    async fn send(
        &self,
        request: EncodedShardRequest,
    ) -> Result<ShardReplicationResponse, TransportError> {
        let decoded =
            ShardReplicationRequest::try_decode(request.payload.clone()).expect("valid request");
        let poisoned = decoded
            .items
            .iter()
            .flatten()
            .any(|op| op.id.as_deref() == Some(self.poison_id.as_str()));

        if poisoned {
            self.failures.fetch_add(1, Ordering::SeqCst);
            return Err(TransportError::Connection {
                message: "connection reset by peer".to_string(),
            });
        }

        self.inner.send(request).await
    }
}

/// Transport that holds every request until [`GatedTransport::open`], then
/// fails it.
pub struct GatedTransport {
    inner: Arc<InMemoryCluster>,
    gate: Semaphore,
}

impl GatedTransport {
    pub fn new(inner: Arc<InMemoryCluster>) -> Self {
        Self {
            inner,
            gate: Semaphore::new(0),
        }
    }

    pub fn open(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }
}

impl ShardRouter for GatedTransport {
    fn route(&self, index: &str, id: Option<&str>) -> Result<ShardId, RoutingError> {
        self.inner.route(index, id)
    }
}

#[async_trait]
impl Transport for GatedTransport {
    async fn send(
        &self,
        _request: EncodedShardRequest,
    ) -> Result<ShardReplicationResponse, TransportError> {
        let _permit = self.gate.acquire().await.expect("gate");
        Err(TransportError::Connection {
            message: "connection refused".to_string(),
        })
    }
}

/// Admin that records every refresh interval change.
pub struct CountingAdmin {
    inner: Arc<InMemoryCluster>,
    refresh_updates: Mutex<HashMap<String, Vec<RefreshInterval>>>,
}

impl CountingAdmin {
    pub fn new(inner: Arc<InMemoryCluster>) -> Self {
        Self {
            inner,
            refresh_updates: Mutex::new(HashMap::new()),
        }
    }

    pub fn refresh_updates(&self, index: &str) -> Vec<RefreshInterval> {
        self.refresh_updates
            .lock()
            .expect("lock")
            .get(index)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl Admin for CountingAdmin {
    async fn create_index(&self, index: &str, settings: IndexSettings) -> Result<(), AdminError> {
        self.inner.create_index(index, settings).await
    }

    async fn delete_index(&self, index: &str) -> Result<(), AdminError> {
        self.inner.delete_index(index).await
    }

    async fn put_mapping(
        &self,
        index: &str,
        doc_type: &str,
        mapping: serde_json::Value,
    ) -> Result<(), AdminError> {
        self.inner.put_mapping(index, doc_type, mapping).await
    }

    async fn refresh_interval(&self, index: &str) -> Result<RefreshInterval, AdminError> {
        self.inner.refresh_interval(index).await
    }

    async fn set_refresh_interval(
        &self,
        index: &str,
        interval: RefreshInterval,
    ) -> Result<(), AdminError> {
        self.refresh_updates
            .lock()
            .expect("lock")
            .entry(index.to_string())
            .or_default()
            .push(interval);
        self.inner.set_refresh_interval(index, interval).await
    }

    async fn set_replica_count(&self, index: &str, replicas: u32) -> Result<(), AdminError> {
        self.inner.set_replica_count(index, replicas).await
    }

    async fn refresh_index(&self, index: &str) -> Result<(), AdminError> {
        self.inner.refresh_index(index).await
    }

    async fn flush_index(&self, index: &str) -> Result<(), AdminError> {
        self.inner.flush_index(index).await
    }

    async fn cluster_health(&self) -> Result<ClusterHealth, AdminError> {
        self.inner.cluster_health().await
    }
}
