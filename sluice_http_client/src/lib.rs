//! HTTP client for a remote cluster.
//!
//! [`HttpClusterClient`] implements both [`Transport`] and [`Admin`], so a
//! [`sluice_ingest_core::BulkClient`] can ingest into a cluster served by
//! `sluice_server_http`. Routing uses a cached copy of the cluster's shard
//! layout, reloaded whenever an index is created or deleted through the
//! client.

mod error;

use async_trait::async_trait;
use reqwest::{RequestBuilder, header::CONTENT_TYPE};
use serde::de::DeserializeOwned;
use sluice_ingest_core::{
    Admin, AdminError, ClusterHealth, EncodedShardRequest, IndexSettings, RefreshInterval,
    RoutingTable, ShardId, ShardReplicationResponse, ShardRouter, Transport, TransportError,
    routing::RoutingError,
};
use sluice_server_http::{
    AcknowledgedResponse, CountResponse, ErrorResponse, REPLICATE_PATH, RoutingResponse,
    UpdateSettingsRequest,
};
use snafu::ResultExt;
use tracing::debug;

use self::error::RequestSnafu;

pub use self::error::{HttpClusterClientError, Result};

/// A client for a cluster served over HTTP.
#[derive(Debug)]
pub struct HttpClusterClient {
    client: reqwest::Client,
    base_url: String,
    routing: RoutingTable,
}

impl HttpClusterClient {
    /// Create a client and load the cluster's routing table.
    pub async fn connect(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Self {
            client: reqwest::Client::new(),
            base_url,
            routing: RoutingTable::default(),
        };

        client.reload_routing().await?;
        Ok(client)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch the shard layout of every index from the cluster.
    pub async fn reload_routing(&self) -> Result<()> {
        let response: RoutingResponse = self
            .execute(self.client.get(self.url("/_cluster/routing")))
            .await?;

        debug!(indices = response.indices.len(), "loaded routing table");
        self.routing.replace(response.indices);

        Ok(())
    }

    /// Number of documents in `index`.
    pub async fn count(&self, index: &str) -> Result<u64> {
        let response: CountResponse = self
            .execute(self.client.get(self.url(&format!("/{index}/_count"))))
            .await?;
        Ok(response.count)
    }

    pub async fn index_settings(&self, index: &str) -> Result<IndexSettings> {
        self.execute(self.client.get(self.url(&format!("/{index}/_settings"))))
            .await
    }

    async fn update_settings(&self, index: &str, request: &UpdateSettingsRequest) -> Result<()> {
        let _: AcknowledgedResponse = self
            .execute(
                self.client
                    .put(self.url(&format!("/{index}/_settings")))
                    .json(request),
            )
            .await?;
        Ok(())
    }

    async fn acknowledged(&self, request: RequestBuilder) -> Result<()> {
        let _: AcknowledgedResponse = self.execute(request).await?;
        Ok(())
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await.context(RequestSnafu {})?;

        if response.status().is_success() {
            return response.json::<T>().await.context(RequestSnafu {});
        }

        let status = response.status();
        let message = match response.json::<ErrorResponse>().await {
            Ok(body) => body.message,
            Err(_) => status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string(),
        };

        Err(HttpClusterClientError::Response { status, message })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl ShardRouter for HttpClusterClient {
    fn route(&self, index: &str, id: Option<&str>) -> std::result::Result<ShardId, RoutingError> {
        self.routing.route(index, id)
    }
}

#[async_trait]
impl Transport for HttpClusterClient {
    async fn send(
        &self,
        request: EncodedShardRequest,
    ) -> std::result::Result<ShardReplicationResponse, TransportError> {
        debug!(
            shard_id = %request.shard_id,
            num_items = request.num_items,
            bytes = request.payload.len(),
            "sending shard request"
        );

        let response: ShardReplicationResponse = self
            .execute(
                self.client
                    .post(self.url(REPLICATE_PATH))
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .body(request.payload),
            )
            .await?;

        if response.shard_id != request.shard_id {
            return Err(TransportError::MalformedResponse {
                message: format!(
                    "response for shard {} to a request for shard {}",
                    response.shard_id, request.shard_id
                ),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Admin for HttpClusterClient {
    async fn create_index(
        &self,
        index: &str,
        settings: IndexSettings,
    ) -> std::result::Result<(), AdminError> {
        self.acknowledged(self.client.put(self.url(&format!("/{index}"))).json(&settings))
            .await?;
        self.reload_routing().await?;
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> std::result::Result<(), AdminError> {
        self.acknowledged(self.client.delete(self.url(&format!("/{index}"))))
            .await?;
        self.routing.remove(index);
        Ok(())
    }

    async fn put_mapping(
        &self,
        index: &str,
        doc_type: &str,
        mapping: serde_json::Value,
    ) -> std::result::Result<(), AdminError> {
        self.acknowledged(
            self.client
                .put(self.url(&format!("/{index}/_mapping/{doc_type}")))
                .json(&mapping),
        )
        .await?;
        Ok(())
    }

    async fn refresh_interval(&self, index: &str) -> std::result::Result<RefreshInterval, AdminError> {
        let settings = self.index_settings(index).await?;
        Ok(settings.refresh_interval)
    }

    async fn set_refresh_interval(
        &self,
        index: &str,
        interval: RefreshInterval,
    ) -> std::result::Result<(), AdminError> {
        self.update_settings(index, &UpdateSettingsRequest::refresh_interval(interval))
            .await?;
        Ok(())
    }

    async fn set_replica_count(
        &self,
        index: &str,
        replicas: u32,
    ) -> std::result::Result<(), AdminError> {
        self.update_settings(index, &UpdateSettingsRequest::replicas(replicas))
            .await?;
        Ok(())
    }

    async fn refresh_index(&self, index: &str) -> std::result::Result<(), AdminError> {
        self.acknowledged(self.client.post(self.url(&format!("/{index}/_refresh"))))
            .await?;
        Ok(())
    }

    async fn flush_index(&self, index: &str) -> std::result::Result<(), AdminError> {
        self.acknowledged(self.client.post(self.url(&format!("/{index}/_flush"))))
            .await?;
        Ok(())
    }

    async fn cluster_health(&self) -> std::result::Result<ClusterHealth, AdminError> {
        let health: ClusterHealth = self
            .execute(self.client.get(self.url("/_cluster/health")))
            .await?;
        Ok(health)
    }
}
