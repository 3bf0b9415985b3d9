//! Ingestion API handler.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use castline_core::CreateArticleRequest;

use crate::state::AppState;

/// Request body for ingesting an article
#[derive(Debug, Deserialize)]
pub struct IngestBody {
    /// Article title
    pub title: Option<String>,
    /// Article URL
    pub url: Option<String>,
    /// Raw article text to process
    pub raw_text: String,
    /// Source of the article (e.g. newsletter name)
    pub source: Option<String>,
}

/// Response for a successful ingest
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub article_id: String,
    pub status: String,
    pub message: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct IngestErrorResponse {
    pub error: String,
}

/// Ingest an article and record the normalization dispatch intent.
///
/// No heavy processing happens here: the document is stored with an
/// all-pending stage map, the `normalize` intent lands in the outbox in the
/// same transaction, and the relay is nudged to dispatch it.
pub async fn ingest_article(
    State(state): State<Arc<AppState>>,
    Json(body): Json<IngestBody>,
) -> Result<(StatusCode, Json<IngestResponse>), impl IntoResponse> {
    let request = CreateArticleRequest {
        title: body.title,
        url: body.url,
        raw_text: body.raw_text,
        source: body.source,
    };

    match state.tracker().ingest(request) {
        Ok(article) => {
            state.relay().nudge();

            Ok((
                StatusCode::CREATED,
                Json(IngestResponse {
                    article_id: article.id,
                    status: article.status,
                    message: "Article ingested and normalization job queued".to_string(),
                }),
            ))
        }
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(IngestErrorResponse {
                error: format!("Failed to ingest article: {}", e),
            }),
        )),
    }
}
