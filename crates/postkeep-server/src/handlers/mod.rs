//! HTTP handlers

pub mod health;
pub mod posts;

pub use health::health;

use crate::error::ApiError;
use crate::AppState;
use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};

/// Default route for requests no other route matched
pub async fn fallback(State(state): State<AppState>) -> Response {
    default_response(state.strict_routes)
}

/// Empty 200, or 404 when strict routing is enabled
pub fn default_response(strict: bool) -> Response {
    if strict {
        ApiError::NotFound("no such route".to_string()).into_response()
    } else {
        [(header::CONTENT_TYPE, "application/json")].into_response()
    }
}
