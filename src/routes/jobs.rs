use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::models::job::{Job, NewJob};
use crate::services::scheduler::RunOutcome;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateJobRequest {
    #[garde(length(min = 1))]
    pub title: String,
    #[garde(length(min = 1))]
    pub video_code: String,
    #[garde(skip)]
    pub youtube_link: Option<String>,
    #[garde(length(min = 1))]
    pub script: String,
}

#[derive(Serialize)]
pub struct RunAllResponse {
    pub started: usize,
}

#[derive(Serialize)]
pub struct DeleteAllResponse {
    pub deleted: usize,
}

/// POST /api/v1/jobs — register a new Waiting job.
pub async fn create_job(
    State(state): State<AppState>,
    Json(payload): Json<CreateJobRequest>,
) -> Result<(StatusCode, Json<Job>), StatusCode> {
    payload
        .validate()
        .map_err(|_| StatusCode::UNPROCESSABLE_ENTITY)?;

    let job = state.scheduler.add_job(NewJob {
        title: payload.title.trim().to_string(),
        video_code: payload.video_code.trim().to_string(),
        youtube_link: payload
            .youtube_link
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty()),
        script: payload.script.trim().to_string(),
    });

    Ok((StatusCode::CREATED, Json(job)))
}

/// GET /api/v1/jobs — all jobs, newest first.
pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<Job>> {
    Json(state.scheduler.list())
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Job>, StatusCode> {
    state
        .scheduler
        .get(&id)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// POST /api/v1/jobs/{id}/run — start one Waiting job.
pub async fn run_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    match state.scheduler.run_one(&id) {
        RunOutcome::Started => Ok(StatusCode::ACCEPTED),
        RunOutcome::NotWaiting => Err(StatusCode::CONFLICT),
        RunOutcome::NotFound => Err(StatusCode::NOT_FOUND),
    }
}

/// POST /api/v1/jobs/run-all — start every Waiting job concurrently.
pub async fn run_all(State(state): State<AppState>) -> Json<RunAllResponse> {
    Json(RunAllResponse {
        started: state.scheduler.run_all(),
    })
}

/// DELETE /api/v1/jobs/{id}
pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> StatusCode {
    if state.scheduler.delete_job(&id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// DELETE /api/v1/jobs
pub async fn delete_all_jobs(State(state): State<AppState>) -> Json<DeleteAllResponse> {
    Json(DeleteAllResponse {
        deleted: state.scheduler.delete_all(),
    })
}
