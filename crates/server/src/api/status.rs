//! Pipeline status API handler.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use castline_core::{QueryError, StatusReport};

use crate::state::AppState;

/// Error response
#[derive(Debug, Serialize)]
pub struct StatusErrorResponse {
    pub error: String,
}

/// Get the current pipeline status for an article.
///
/// The aggregate status is recomputed from the stored stage map on every
/// read; this handler never mutates state.
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(article_id): Path<String>,
) -> Result<Json<StatusReport>, impl IntoResponse> {
    match state.query().get_status(&article_id) {
        Ok(report) => Ok(Json(report)),
        Err(e) => Err(query_error_response(e)),
    }
}

pub(super) fn query_error_response(e: QueryError) -> (StatusCode, Json<StatusErrorResponse>) {
    let status = match e {
        QueryError::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
        QueryError::NotFound(_) => StatusCode::NOT_FOUND,
        QueryError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    (
        status,
        Json(StatusErrorResponse {
            error: e.to_string(),
        }),
    )
}
