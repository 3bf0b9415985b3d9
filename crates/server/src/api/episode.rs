//! Episode API handler.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use castline_core::EpisodeReport;

use super::status::query_error_response;
use crate::state::AppState;

/// Get the episode projection (script and audio URL) for an article.
///
/// The display status is derived from the stored outputs, independent of the
/// pipeline stage map. Read-only.
pub async fn get_episode(
    State(state): State<Arc<AppState>>,
    Path(article_id): Path<String>,
) -> Result<Json<EpisodeReport>, impl IntoResponse> {
    match state.query().get_episode(&article_id) {
        Ok(report) => Ok(Json(report)),
        Err(e) => Err(query_error_response(e)),
    }
}
