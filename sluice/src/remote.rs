use std::sync::Arc;

use clap::Args;
use sluice_http_client::HttpClusterClient;
use snafu::ResultExt;

use crate::error::{ConnectionSnafu, Result};

/// Arguments for configuring the remote cluster connection.
#[derive(Args, Debug, Clone)]
pub struct RemoteArgs {
    /// The address of the cluster HTTP server
    #[arg(long, default_value = "http://localhost:9200")]
    pub remote_address: String,
}

impl RemoteArgs {
    /// Connect to the cluster and load its routing table.
    pub async fn cluster_client(&self) -> Result<Arc<HttpClusterClient>> {
        let client = HttpClusterClient::connect(self.remote_address.clone())
            .await
            .context(ConnectionSnafu {})?;

        Ok(Arc::new(client))
    }
}
