use axum::{
    body::Bytes,
    extract::{
        rejection::{PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use checktree_core::{NodeId, NodeTree, Status};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{ApiError, ApiResult, AppState};

#[derive(Serialize, Deserialize, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: String,
}

/// New status for `PUT /override/{node_id}`, taken from the query string or
/// a JSON body.
#[derive(Deserialize, Debug, Default)]
pub struct OverrideParams {
    pub new_status: Option<String>,
}

pub async fn health(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    state
        .blocking(|store| store.ping())
        .await
        .map_err(|e| ApiError::ServiceUnavailable(format!("database: {e}")))?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: "ok".to_string(),
    }))
}

/// `GET /`: a random ROOT node and its children.
pub async fn get_random_tree(State(state): State<AppState>) -> ApiResult<Json<NodeTree>> {
    let subtree = state.blocking(|store| store.random_root()).await?;
    debug!(root = subtree.root().id, nodes = subtree.node_count(), "serving random tree");
    Ok(Json(subtree.project()))
}

/// `GET /node/{node_id}`
pub async fn get_node(
    State(state): State<AppState>,
    path: Result<Path<NodeId>, PathRejection>,
) -> ApiResult<Json<NodeTree>> {
    let Path(node_id) = path?;
    let subtree = state.blocking(move |store| store.subtree(node_id)).await?;
    Ok(Json(subtree.project()))
}

/// `PUT /override/{node_id}`: sets the node's status and recomputes every
/// ancestor up to its ROOT. Responds with the node's refreshed subtree.
pub async fn override_status(
    State(state): State<AppState>,
    path: Result<Path<NodeId>, PathRejection>,
    query: Result<Query<OverrideParams>, QueryRejection>,
    body: Bytes,
) -> ApiResult<Json<NodeTree>> {
    let Path(node_id) = path?;
    let Query(params) = query?;
    let raw = match params.new_status {
        Some(value) => value,
        None => status_from_body(&body)?,
    };
    let status: Status = raw.parse()?;

    let result = state
        .blocking(move |store| store.override_status(node_id, status))
        .await?;
    info!(
        node = node_id,
        %status,
        changed = ?result.report.changed_ids(),
        "override applied"
    );
    Ok(Json(result.subtree.project()))
}

fn status_from_body(body: &Bytes) -> ApiResult<String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::BadRequest(
            "new_status is required as a query parameter or JSON body".to_string(),
        ));
    }
    let params: OverrideParams = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))?;
    params
        .new_status
        .ok_or_else(|| ApiError::Validation("new_status must not be null".to_string()))
}
