#![allow(dead_code)]

use std::{net::SocketAddr, sync::Arc};

use sluice_http_client::HttpClusterClient;
use sluice_ingest_core::InMemoryCluster;
use sluice_server_http::HttpClusterServer;
use tokio_util::sync::CancellationToken;

pub struct TestServer {
    pub cluster: Arc<InMemoryCluster>,
    pub address: SocketAddr,
    ct: CancellationToken,
}

impl TestServer {
    /// Serve a fresh in-memory cluster on a random local port.
    pub async fn start() -> Self {
        let cluster = Arc::new(InMemoryCluster::new());
        let app = HttpClusterServer::new(cluster.clone()).into_router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind listener");
        let address = listener.local_addr().expect("local address");

        let ct = CancellationToken::new();
        let shutdown = ct.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
                .expect("serve");
        });

        Self {
            cluster,
            address,
            ct,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.address)
    }

    pub async fn client(&self) -> Arc<HttpClusterClient> {
        let client = HttpClusterClient::connect(self.base_url())
            .await
            .expect("connect client");
        Arc::new(client)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.ct.cancel();
    }
}
