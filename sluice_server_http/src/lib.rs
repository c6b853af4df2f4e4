//! HTTP server exposing an in-memory cluster.
//!
//! Shard requests are posted in their binary encoding to
//! `/_shard/replicate`; the admin API uses JSON bodies.

pub mod admin;
pub mod error;
pub mod replicate;
pub mod types;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
};
use sluice_ingest_core::InMemoryCluster;

pub use error::{HttpServerError, Result};
pub use types::{
    AcknowledgedResponse, CountResponse, ErrorResponse, RoutingResponse, UpdateSettingsRequest,
};

use crate::{admin::*, replicate::replicate_handler};

pub const REPLICATE_PATH: &str = "/_shard/replicate";

/// HTTP server for an [`InMemoryCluster`].
pub struct HttpClusterServer {
    state: ServerState,
}

#[derive(Clone)]
pub struct ServerState {
    cluster: Arc<InMemoryCluster>,
}

impl HttpClusterServer {
    pub fn new(cluster: Arc<InMemoryCluster>) -> Self {
        Self {
            state: ServerState { cluster },
        }
    }

    pub fn into_router(self) -> Router {
        Router::new()
            .route(REPLICATE_PATH, post(replicate_handler))
            .route("/_cluster/health", get(cluster_health_handler))
            .route("/_cluster/routing", get(routing_handler))
            .route(
                "/{index}",
                put(create_index_handler).delete(delete_index_handler),
            )
            .route(
                "/{index}/_settings",
                get(get_settings_handler).put(update_settings_handler),
            )
            .route("/{index}/_mapping/{doc_type}", put(put_mapping_handler))
            .route("/{index}/_refresh", post(refresh_handler))
            .route("/{index}/_flush", post(flush_handler))
            .route("/{index}/_count", get(count_handler))
            .with_state(self.state)
    }
}
