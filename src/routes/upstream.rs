use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;

#[derive(Serialize)]
pub struct KeyCheckResponse {
    pub valid: bool,
}

/// POST /api/v1/upstream/check — live probe of the configured API key.
pub async fn check_key(State(state): State<AppState>) -> Json<KeyCheckResponse> {
    Json(KeyCheckResponse {
        valid: state.gemini.check_key().await,
    })
}

#[derive(Debug, Deserialize, Validate)]
pub struct TranscriptRequest {
    #[garde(length(min = 1))]
    pub url: String,
}

#[derive(Serialize)]
pub struct TranscriptResponse {
    pub transcript: String,
}

/// POST /api/v1/transcript — extract a transcript/summary of a reference
/// video to use as a job's source script.
pub async fn fetch_transcript(
    State(state): State<AppState>,
    Json(payload): Json<TranscriptRequest>,
) -> Result<Json<TranscriptResponse>, StatusCode> {
    payload
        .validate()
        .map_err(|_| StatusCode::UNPROCESSABLE_ENTITY)?;
    if !payload.url.starts_with("http") {
        return Err(StatusCode::BAD_REQUEST);
    }

    match state.gemini.fetch_transcript(&payload.url).await {
        Ok(transcript) => Ok(Json(TranscriptResponse { transcript })),
        Err(e) => {
            tracing::error!(error = %e, "transcript fetch failed");
            Err(StatusCode::BAD_GATEWAY)
        }
    }
}
