//! Post id path extractor

use crate::handlers::default_response;
use crate::AppState;
use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use postkeep_types::is_post_id;

/// The `{id}` segment of `/posts/{id}/`.
///
/// A segment without the shape of a post id means the route did not match,
/// so the request is answered by the default route instead.
#[derive(Debug, Clone)]
pub struct PostId(pub String);

#[async_trait]
impl FromRequestParts<AppState> for PostId {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(IntoResponse::into_response)?;

        if is_post_id(&id) {
            Ok(PostId(id))
        } else {
            tracing::debug!("Path segment {:?} is not a post id", id);
            Err(default_response(state.strict_routes))
        }
    }
}
