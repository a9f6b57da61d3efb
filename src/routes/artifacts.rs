use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::Engine;

use crate::app_state::AppState;
use crate::models::job::JobStatus;
use crate::services::archive::{self, ArchiveEntry};

/// Downloadable pieces of a finished content package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ArtifactKind {
    Content,
    Seo,
    VideoPrompt,
    Thumbnail,
}

/// GET /api/v1/jobs/{id}/artifacts/{kind} — download one artifact.
pub async fn download_artifact(
    State(state): State<AppState>,
    Path((id, kind)): Path<(String, String)>,
) -> Result<Response, StatusCode> {
    let kind: ArtifactKind = kind.parse().map_err(|_| StatusCode::NOT_FOUND)?;
    let job = state.scheduler.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    // Artifacts exist only once the job has completed.
    let output = job.output.as_ref().ok_or(StatusCode::CONFLICT)?;
    let code = &job.video_code;

    let (filename, content_type, bytes) = match kind {
        ArtifactKind::Content => (
            format!("{code}_content.txt"),
            "text/plain; charset=utf-8",
            output.content.clone().into_bytes(),
        ),
        ArtifactKind::Seo => (
            format!("{code}_seo.txt"),
            "text/plain; charset=utf-8",
            output.seo.clone().into_bytes(),
        ),
        ArtifactKind::VideoPrompt => (
            format!("{code}_prom_video.txt"),
            "text/plain; charset=utf-8",
            output.video_prompt.clone().into_bytes(),
        ),
        ArtifactKind::Thumbnail => {
            if output.thumbnail.is_empty() {
                return Err(StatusCode::NOT_FOUND);
            }
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(&output.thumbnail)
                .map_err(|e| {
                    tracing::error!(job_id = %id, error = %e, "stored thumbnail is not valid base64");
                    StatusCode::INTERNAL_SERVER_ERROR
                })?;
            (format!("{code}_thumbnail.jpg"), "image/jpeg", bytes)
        }
    };

    Ok(attachment(&filename, content_type, bytes))
}

/// GET /api/v1/jobs/{id}/archive — zip of one job's bundle.
pub async fn download_job_archive(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, StatusCode> {
    let job = state.scheduler.get(&id).ok_or(StatusCode::NOT_FOUND)?;
    let output = job.output.as_ref().ok_or(StatusCode::CONFLICT)?;

    let entries = archive::bundle_entries(&job.video_code, output, None)
        .map_err(|e| archive_failure(&id, e))?;
    let bytes = archive::build_zip(&entries).map_err(|e| archive_failure(&id, e))?;

    Ok(attachment(
        &format!("{}.zip", job.video_code),
        "application/zip",
        bytes,
    ))
}

/// GET /api/v1/jobs/archive — zip of every completed job, one folder per
/// video code.
pub async fn download_all_completed(
    State(state): State<AppState>,
) -> Result<Response, StatusCode> {
    let completed: Vec<_> = state
        .scheduler
        .list()
        .into_iter()
        .filter(|j| j.status == JobStatus::Completed && j.output.is_some())
        .collect();

    if completed.is_empty() {
        return Err(StatusCode::NOT_FOUND);
    }

    let mut entries: Vec<ArchiveEntry> = Vec::new();
    for job in &completed {
        let Some(output) = job.output.as_ref() else {
            continue;
        };
        entries.extend(
            archive::bundle_entries(&job.video_code, output, Some(&job.video_code))
                .map_err(|e| archive_failure(&job.id, e))?,
        );
    }
    let bytes = archive::build_zip(&entries)
        .map_err(|e| archive_failure("all_completed_jobs", e))?;

    Ok(attachment("all_completed_jobs.zip", "application/zip", bytes))
}

fn archive_failure(id: &str, error: crate::services::archive::ArchiveError) -> StatusCode {
    tracing::error!(job_id = %id, error = %error, "archive assembly failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

fn attachment(filename: &str, content_type: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}
