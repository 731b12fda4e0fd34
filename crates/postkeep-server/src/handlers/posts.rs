//! Post handlers
//!
//! Bodies are read as raw bytes and decoded here so that every malformed
//! payload is answered with 400, whatever its content type.

use crate::error::ApiError;
use crate::extractors::PostId;
use crate::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use postkeep_types::{Record, RecordPatch};
use serde_json::{Map, Value};
use tracing::{debug, info};

pub async fn list(State(state): State<AppState>) -> Json<Vec<Record>> {
    Json(state.store.list().await)
}

pub async fn get(
    State(state): State<AppState>,
    PostId(id): PostId,
) -> Result<Json<Record>, ApiError> {
    state
        .store
        .get(&id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("record {} not found", id)))
}

/// Store a new record; responds with `{ "<unique_id>": <sequence number> }`.
pub async fn create(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let record: Record = serde_json::from_slice(&body)?;
    record.validate()?;

    let id = record.unique_id.clone();
    let seq = state.store.insert(record).await?;
    info!("Stored post {} (seq {})", id, seq);

    let mut response = Map::new();
    response.insert(id, Value::from(seq));
    Ok((StatusCode::CREATED, Json(Value::Object(response))))
}

pub async fn update(
    State(state): State<AppState>,
    PostId(id): PostId,
    body: Bytes,
) -> Result<Json<Record>, ApiError> {
    let patch: RecordPatch = serde_json::from_slice(&body)?;
    patch.validate(&id)?;

    let record = state.store.update(&id, &patch).await?;
    debug!("Updated post {}", id);
    Ok(Json(record))
}

/// Remove a record; responds with an empty 200.
pub async fn delete(
    State(state): State<AppState>,
    PostId(id): PostId,
) -> Result<impl IntoResponse, ApiError> {
    state.store.delete(&id).await?;
    info!("Deleted post {}", id);
    Ok([(header::CONTENT_TYPE, "application/json")])
}
