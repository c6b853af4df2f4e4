use std::{path::PathBuf, time::Duration};

use clap::ValueEnum;
use sluice_ingest_core::{
    Admin, ClusterHealth, ClusterHealthStatus, IndexSettings, admin::wait_for_cluster_status,
};
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;

use crate::{
    config::load_index_settings,
    error::{AdminSnafu, ClusterSnafu, Result},
    remote::RemoteArgs,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum HealthStatusArg {
    Red,
    Yellow,
    Green,
}

#[derive(clap::Subcommand)]
pub enum AdminCommands {
    /// Create a new index
    CreateIndex {
        /// Index name
        name: String,
        /// JSON file with the index settings
        #[arg(long)]
        settings: Option<PathBuf>,
        /// Number of primary shards
        #[arg(long)]
        shards: Option<u32>,
        /// Number of replicas per shard
        #[arg(long)]
        replicas: Option<u32>,
        /// Mapping for a document type, in format '<doc_type>=<path>'
        #[arg(long = "mapping")]
        mappings: Vec<String>,
        #[clap(flatten)]
        remote: RemoteArgs,
    },
    /// Delete an index and its documents
    DeleteIndex {
        /// Index name
        name: String,
        #[clap(flatten)]
        remote: RemoteArgs,
    },
    /// Show the index settings
    Settings {
        /// Index name
        name: String,
        #[clap(flatten)]
        remote: RemoteArgs,
    },
    /// Count the documents of an index
    Count {
        /// Index name
        name: String,
        #[clap(flatten)]
        remote: RemoteArgs,
    },
    /// Show the cluster health
    Health {
        /// Wait until the cluster reports this status or better
        #[arg(long)]
        wait_for: Option<HealthStatusArg>,
        /// How long to wait, in milliseconds
        #[arg(long, default_value_t = 30_000)]
        timeout_ms: u64,
        #[clap(flatten)]
        remote: RemoteArgs,
    },
    /// Change the replica count of an index and wait for the cluster
    Replicas {
        /// Index name
        name: String,
        /// Number of replicas per shard
        count: u32,
        /// How long to wait for the cluster, in milliseconds
        #[arg(long, default_value_t = 30_000)]
        timeout_ms: u64,
        #[clap(flatten)]
        remote: RemoteArgs,
    },
}

impl AdminCommands {
    pub async fn run(self, _ct: CancellationToken) -> Result<()> {
        match self {
            AdminCommands::CreateIndex {
                name,
                settings,
                shards,
                replicas,
                mappings,
                remote,
            } => {
                let settings =
                    load_index_settings(settings.as_deref(), shards, replicas, &mappings)?;
                let client = remote.cluster_client().await?;

                client
                    .create_index(&name, settings.clone())
                    .await
                    .context(AdminSnafu {
                        operation: "create_index",
                    })?;

                println!("Created index {name}");
                print_settings(&settings);

                Ok(())
            }
            AdminCommands::DeleteIndex { name, remote } => {
                let client = remote.cluster_client().await?;

                client.delete_index(&name).await.context(AdminSnafu {
                    operation: "delete_index",
                })?;

                println!("Deleted index {name}");

                Ok(())
            }
            AdminCommands::Settings { name, remote } => {
                let client = remote.cluster_client().await?;

                let settings = client.index_settings(&name).await.context(ClusterSnafu {
                    operation: "index_settings",
                })?;

                print_settings(&settings);

                Ok(())
            }
            AdminCommands::Count { name, remote } => {
                let client = remote.cluster_client().await?;

                let count = client.count(&name).await.context(ClusterSnafu {
                    operation: "count",
                })?;

                println!("{name}: {count} documents");

                Ok(())
            }
            AdminCommands::Health {
                wait_for,
                timeout_ms,
                remote,
            } => {
                let client = remote.cluster_client().await?;

                let health = match wait_for {
                    Some(status) => wait_for_cluster_status(
                        client.as_ref(),
                        status.into(),
                        Duration::from_millis(timeout_ms),
                    )
                    .await
                    .context(AdminSnafu {
                        operation: "wait_for_cluster",
                    })?,
                    None => client.cluster_health().await.context(AdminSnafu {
                        operation: "cluster_health",
                    })?,
                };

                print_health(&health);

                Ok(())
            }
            AdminCommands::Replicas {
                name,
                count,
                timeout_ms,
                remote,
            } => {
                let client = remote.cluster_client().await?;

                client
                    .set_replica_count(&name, count)
                    .await
                    .context(AdminSnafu {
                        operation: "set_replica_count",
                    })?;

                let health = wait_for_cluster_status(
                    client.as_ref(),
                    ClusterHealthStatus::Yellow,
                    Duration::from_millis(timeout_ms),
                )
                .await
                .context(AdminSnafu {
                    operation: "wait_for_cluster",
                })?;

                println!("Set {name} to {count} replicas");
                print_health(&health);

                Ok(())
            }
        }
    }
}

impl From<HealthStatusArg> for ClusterHealthStatus {
    fn from(status: HealthStatusArg) -> Self {
        match status {
            HealthStatusArg::Red => ClusterHealthStatus::Red,
            HealthStatusArg::Yellow => ClusterHealthStatus::Yellow,
            HealthStatusArg::Green => ClusterHealthStatus::Green,
        }
    }
}

fn print_settings(settings: &IndexSettings) {
    println!("  shards: {}", settings.number_of_shards);
    println!("  replicas: {}", settings.number_of_replicas);
    println!("  refresh interval: {}", settings.refresh_interval);

    let mut doc_types = settings.mappings.keys().collect::<Vec<_>>();
    doc_types.sort();
    for doc_type in doc_types {
        println!("  mapping: {doc_type}");
    }
}

fn print_health(health: &ClusterHealth) {
    println!("Cluster health: {}", health.status);
    println!("  nodes: {}", health.number_of_nodes);
    println!("  indices: {}", health.number_of_indices);
    println!("  active shards: {}", health.active_shards);
}
