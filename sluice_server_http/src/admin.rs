use axum::{
    Json,
    extract::{Path, State},
};
use sluice_ingest_core::{Admin, ClusterHealth, IndexSettings};
use tracing::info;

use crate::{
    ServerState,
    error::{HttpServerError, Result},
    types::{AcknowledgedResponse, CountResponse, RoutingResponse, UpdateSettingsRequest},
};

pub async fn cluster_health_handler(State(state): State<ServerState>) -> Result<Json<ClusterHealth>> {
    let health = state.cluster.cluster_health().await?;
    Ok(Json(health))
}

pub async fn routing_handler(State(state): State<ServerState>) -> Json<RoutingResponse> {
    Json(RoutingResponse {
        indices: state.cluster.routing_table(),
    })
}

pub async fn create_index_handler(
    State(state): State<ServerState>,
    Path(index): Path<String>,
    Json(settings): Json<IndexSettings>,
) -> Result<Json<AcknowledgedResponse>> {
    let shards = settings.number_of_shards;
    state.cluster.create_index(&index, settings).await?;
    info!(index, shards, "created index");
    Ok(Json(AcknowledgedResponse::acknowledged()))
}

pub async fn delete_index_handler(
    State(state): State<ServerState>,
    Path(index): Path<String>,
) -> Result<Json<AcknowledgedResponse>> {
    state.cluster.delete_index(&index).await?;
    info!(index, "deleted index");
    Ok(Json(AcknowledgedResponse::acknowledged()))
}

pub async fn get_settings_handler(
    State(state): State<ServerState>,
    Path(index): Path<String>,
) -> Result<Json<IndexSettings>> {
    let settings = state.cluster.index_settings(&index).await?;
    Ok(Json(settings))
}

pub async fn update_settings_handler(
    State(state): State<ServerState>,
    Path(index): Path<String>,
    Json(request): Json<UpdateSettingsRequest>,
) -> Result<Json<AcknowledgedResponse>> {
    if request.is_empty() {
        return Err(HttpServerError::BadRequest(
            "no dynamic setting to update".to_string(),
        ));
    }

    if let Some(replicas) = request.number_of_replicas {
        state.cluster.set_replica_count(&index, replicas).await?;
    }

    if let Some(interval) = request.refresh_interval {
        state.cluster.set_refresh_interval(&index, interval).await?;
    }

    Ok(Json(AcknowledgedResponse::acknowledged()))
}

pub async fn put_mapping_handler(
    State(state): State<ServerState>,
    Path((index, doc_type)): Path<(String, String)>,
    Json(mapping): Json<serde_json::Value>,
) -> Result<Json<AcknowledgedResponse>> {
    state.cluster.put_mapping(&index, &doc_type, mapping).await?;
    Ok(Json(AcknowledgedResponse::acknowledged()))
}

pub async fn refresh_handler(
    State(state): State<ServerState>,
    Path(index): Path<String>,
) -> Result<Json<AcknowledgedResponse>> {
    state.cluster.refresh_index(&index).await?;
    Ok(Json(AcknowledgedResponse::acknowledged()))
}

pub async fn flush_handler(
    State(state): State<ServerState>,
    Path(index): Path<String>,
) -> Result<Json<AcknowledgedResponse>> {
    state.cluster.flush_index(&index).await?;
    Ok(Json(AcknowledgedResponse::acknowledged()))
}

pub async fn count_handler(
    State(state): State<ServerState>,
    Path(index): Path<String>,
) -> Result<Json<CountResponse>> {
    let count = state.cluster.count(&index).await?;
    Ok(Json(CountResponse { count }))
}
