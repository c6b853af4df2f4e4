//! Cluster administration used around bulk ingestion.
//!
//! The bulk client needs to adjust index settings while ingesting, for
//! example disabling refreshes in bulk mode and raising replicas afterwards.
use std::{collections::HashMap, fmt, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

mod error;

pub use self::error::{AdminError, Result};

const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How often an index makes new writes visible to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshInterval {
    Disabled,
    Millis(u64),
}

/// Cluster health, ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterHealthStatus {
    Red,
    Yellow,
    Green,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterHealth {
    pub status: ClusterHealthStatus,
    pub number_of_nodes: u32,
    pub number_of_indices: usize,
    pub active_shards: u32,
}

/// Settings used to create an index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub number_of_shards: u32,
    pub number_of_replicas: u32,
    pub refresh_interval: RefreshInterval,
    /// Mapping per document type.
    pub mappings: HashMap<String, serde_json::Value>,
}

#[async_trait]
pub trait Admin: Send + Sync {
    async fn create_index(&self, index: &str, settings: IndexSettings) -> Result<()>;

    async fn delete_index(&self, index: &str) -> Result<()>;

    async fn put_mapping(
        &self,
        index: &str,
        doc_type: &str,
        mapping: serde_json::Value,
    ) -> Result<()>;

    async fn refresh_interval(&self, index: &str) -> Result<RefreshInterval>;

    async fn set_refresh_interval(&self, index: &str, interval: RefreshInterval) -> Result<()>;

    async fn set_replica_count(&self, index: &str, replicas: u32) -> Result<()>;

    async fn refresh_index(&self, index: &str) -> Result<()>;

    async fn flush_index(&self, index: &str) -> Result<()>;

    async fn cluster_health(&self) -> Result<ClusterHealth>;
}

impl RefreshInterval {
    pub const DEFAULT: RefreshInterval = RefreshInterval::Millis(1000);

    pub fn from_duration(duration: Duration) -> Self {
        RefreshInterval::Millis(duration.as_millis() as u64)
    }
}

impl Default for RefreshInterval {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for RefreshInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshInterval::Disabled => write!(f, "-1"),
            RefreshInterval::Millis(millis) => write!(f, "{millis}ms"),
        }
    }
}

impl fmt::Display for ClusterHealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterHealthStatus::Red => write!(f, "red"),
            ClusterHealthStatus::Yellow => write!(f, "yellow"),
            ClusterHealthStatus::Green => write!(f, "green"),
        }
    }
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            number_of_shards: 1,
            number_of_replicas: 0,
            refresh_interval: RefreshInterval::DEFAULT,
            mappings: HashMap::new(),
        }
    }
}

impl IndexSettings {
    pub fn with_shards(mut self, shards: u32) -> Self {
        self.number_of_shards = shards;
        self
    }

    pub fn with_replicas(mut self, replicas: u32) -> Self {
        self.number_of_replicas = replicas;
        self
    }

    pub fn with_refresh_interval(mut self, refresh_interval: RefreshInterval) -> Self {
        self.refresh_interval = refresh_interval;
        self
    }

    pub fn with_mapping(mut self, doc_type: impl Into<String>, mapping: serde_json::Value) -> Self {
        self.mappings.insert(doc_type.into(), mapping);
        self
    }
}

/// Polls cluster health until it reports `status` or better.
///
/// Fails with [`AdminError::Timeout`] if that does not happen within `timeout`.
pub async fn wait_for_cluster_status(
    admin: &dyn Admin,
    status: ClusterHealthStatus,
    timeout: Duration,
) -> Result<ClusterHealth> {
    let poll = async {
        loop {
            let health = admin.cluster_health().await?;
            if health.status >= status {
                return Ok::<_, AdminError>(health);
            }

            debug!(current = %health.status, wanted = %status, "waiting for cluster status");
            tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
        }
    };

    match tokio::time::timeout(timeout, poll).await {
        Ok(result) => result,
        Err(_) => Err(AdminError::Timeout {
            message: format!("cluster did not reach status {status} within {timeout:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_order() {
        assert!(ClusterHealthStatus::Green > ClusterHealthStatus::Yellow);
        assert!(ClusterHealthStatus::Yellow > ClusterHealthStatus::Red);
    }

    #[test]
    fn test_settings_from_partial_json() {
        let settings: IndexSettings = serde_json::from_str(
            r#"{"number_of_shards": 3, "refresh_interval": "disabled"}"#,
        )
        .expect("parse settings");

        assert_eq!(settings.number_of_shards, 3);
        assert_eq!(settings.number_of_replicas, 0);
        assert_eq!(settings.refresh_interval, RefreshInterval::Disabled);

        let interval: RefreshInterval =
            serde_json::from_str(r#"{"millis": 30000}"#).expect("parse interval");
        assert_eq!(interval, RefreshInterval::Millis(30000));
    }
}
