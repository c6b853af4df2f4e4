use std::{net::SocketAddr, sync::Arc};

use clap::Args;
use sluice_ingest_core::InMemoryCluster;
use sluice_server_http::HttpClusterServer;
use snafu::ResultExt;
use tokio_util::sync::CancellationToken;

use crate::error::{InvalidServerUrlSnafu, IoSnafu, Result};

#[derive(Debug, Args)]
pub struct DevArgs {
    /// The address of the cluster HTTP server.
    #[arg(long, default_value = "127.0.0.1:9200")]
    http_address: String,
    /// Number of nodes the cluster reports. Replicas above `nodes - 1` stay
    /// unassigned.
    #[arg(long, default_value_t = 1)]
    nodes: u32,
}

impl DevArgs {
    pub async fn run(self, ct: CancellationToken) -> Result<()> {
        let http_address = self
            .http_address
            .parse::<SocketAddr>()
            .context(InvalidServerUrlSnafu {})?;

        println!("Starting in-memory cluster in development mode");
        println!("Nodes: {}", self.nodes);
        println!("HTTP server listening on {}", http_address);

        let cluster = Arc::new(InMemoryCluster::with_nodes(self.nodes));
        let res = run_http_server(cluster, http_address, ct).await;
        println!("HTTP server exited with {:?}", res);

        res
    }
}

async fn run_http_server(
    cluster: Arc<InMemoryCluster>,
    address: SocketAddr,
    ct: CancellationToken,
) -> Result<()> {
    let app = HttpClusterServer::new(cluster).into_router();

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .context(IoSnafu {})?;

    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        ct.cancelled().await;
    });

    server.await.context(IoSnafu {})
}
