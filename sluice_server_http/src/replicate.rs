use axum::{Json, extract::State};
use bytes::Bytes;
use sluice_ingest_core::{ShardReplicationRequest, ShardReplicationResponse};
use tracing::debug;

use crate::{
    ServerState,
    error::{HttpServerError, Result},
};

/// Handler for `POST /_shard/replicate`.
///
/// The body is an encoded shard request; the response lists one result per
/// item present in the request.
pub async fn replicate_handler(
    State(state): State<ServerState>,
    body: Bytes,
) -> Result<Json<ShardReplicationResponse>> {
    let request = ShardReplicationRequest::try_decode(body)
        .map_err(|err| HttpServerError::BadRequest(format!("malformed shard request: {err}")))?;

    debug!(
        shard_id = %request.shard_id,
        num_items = request.num_items(),
        "replicating shard request"
    );

    let response = state.cluster.replicate(request).await?;
    Ok(Json(response))
}
