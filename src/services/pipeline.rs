//! The per-job pipeline: a fixed, strictly sequential stage sequence that
//! turns a source script into the finished content package.
//!
//! Stage order: outline → intro → body sections (each prompt conditioned on
//! everything written so far) → assembly → SEO → video prompts → thumbnail.
//! Every upstream call advances the job's progress fraction first and runs
//! under the bounded retry policy; normalization failures are fatal for the
//! job, a thumbnail failure only degrades the output.

use std::sync::Arc;
use std::time::Instant;

use base64::Engine;
use serde_json::{json, Value};

use crate::config::PromptConfig;
use crate::models::job::{Job, JobOutput};
use crate::services::normalize::{self, NormalizeError};
use crate::services::retry::{with_retry, RetryNote, RetryPolicy};
use crate::services::scheduler::JobStore;
use crate::services::thumbnail::{self, ThumbnailFetcher, ThumbnailPolicy};
use crate::services::upstream::{UpstreamClient, UpstreamError};

/// Stages that exist regardless of outline length: outline, SEO, video
/// prompts, thumbnail. Total stage count is outline length + this.
const FIXED_STAGES: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{0}")]
    Upstream(#[from] UpstreamError),

    #[error("{0}")]
    Normalize(#[from] NormalizeError),
}

pub struct Pipeline {
    client: Arc<dyn UpstreamClient>,
    prompts: PromptConfig,
    retry: RetryPolicy,
    thumbnails: ThumbnailFetcher,
    thumbnail_fallback: ThumbnailPolicy,
}

impl Pipeline {
    pub fn new(
        client: Arc<dyn UpstreamClient>,
        prompts: PromptConfig,
        retry: RetryPolicy,
        thumbnails: ThumbnailFetcher,
        thumbnail_fallback: ThumbnailPolicy,
    ) -> Self {
        Self {
            client,
            prompts,
            retry,
            thumbnails,
            thumbnail_fallback,
        }
    }

    /// Drive one already-started job to a terminal state. Never panics or
    /// propagates: every failure lands on the job as an Error transition.
    pub async fn run(&self, store: &JobStore, job_id: &str) {
        let Some(job) = store.get(job_id) else {
            tracing::warn!(job_id = %job_id, "job removed before pipeline start");
            return;
        };

        let started = Instant::now();
        tracing::info!(job_id = %job_id, title = %job.title, "content pipeline started");

        match self.run_stages(store, &job).await {
            Ok(output) => {
                store.complete(job_id, output);
                metrics::counter!("content_jobs_completed").increment(1);
                metrics::histogram!("content_job_duration_seconds")
                    .record(started.elapsed().as_secs_f64());
                tracing::info!(
                    job_id = %job_id,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "content pipeline finished"
                );
            }
            Err(e) => {
                metrics::counter!("content_jobs_failed").increment(1);
                tracing::error!(job_id = %job_id, error = %e, "content pipeline failed");
                store.fail(job_id, &e.to_string());
            }
        }
    }

    async fn run_stages(&self, store: &JobStore, job: &Job) -> Result<JobOutput, PipelineError> {
        // The true stage total depends on how many sections the model
        // returns; until then the outline stage reports against the count
        // its prompt asked for.
        let planned = self.prompts.outline_sections + FIXED_STAGES;

        // a. Outline
        self.advance(store, &job.id, 1, planned, "generating outline".to_string());
        let outline_prompt = fill(&self.prompts.outline, &fenced(&job.script));
        let raw = self
            .structured_with_retry(store, &job.id, &outline_prompt, outline_schema())
            .await?;
        let outline = normalize::outline(&normalize::strip_heading_markup(&raw))?;
        let total = outline.len() + FIXED_STAGES;
        tracing::debug!(job_id = %job.id, sections = outline.len(), "outline normalized");

        // b. Intro seeds the accumulator. c. Body sections follow strictly
        // in order: each prompt embeds everything written so far.
        let mut sections: Vec<String> = Vec::with_capacity(outline.len());

        self.advance(
            store,
            &job.id,
            2,
            total,
            format!("writing intro (section 1/{})", outline.len()),
        );
        let intro_prompt = format!(
            "Đây là kịch bản gốc để tham khảo:\n\"\"\"\n{}\n\"\"\"\n\nHãy thực hiện yêu cầu sau: {}",
            job.script,
            fill(&self.prompts.intro, &quoted(&outline[0])),
        );
        let intro = self.text_with_retry(store, &job.id, &intro_prompt).await?;
        sections.push(normalize::strip_heading_markup(&intro));

        for (index, point) in outline.iter().enumerate().skip(1) {
            let stage = index + 2;
            self.advance(
                store,
                &job.id,
                stage,
                total,
                format!("writing section {}/{}", index + 1, outline.len()),
            );
            let written_so_far = sections.join("\n\n");
            let prompt = format!(
                "Đây là kịch bản gốc để tham khảo:\n\"\"\"\n{}\n\"\"\"\n\n\
                 Đây là nội dung đã được viết cho các phần trước đó:\n\"\"\"\n{}\n\"\"\"\n\n\
                 Hãy thực hiện yêu cầu sau, đảm bảo nội dung mới liền mạch với phần trước: {}",
                job.script,
                written_so_far,
                fill(&self.prompts.content, &quoted(point)),
            );
            let part = self.text_with_retry(store, &job.id, &prompt).await?;
            sections.push(normalize::strip_heading_markup(&part));
        }

        // d. Assembly
        let content = assemble_script(&job.title, &outline, &sections);

        // e. SEO
        self.advance(
            store,
            &job.id,
            total - 2,
            total,
            "generating SEO metadata".to_string(),
        );
        let seo_prompt = format!("{}\n\n{}", self.prompts.seo, job.title);
        let raw = self
            .structured_with_retry(store, &job.id, &seo_prompt, seo_schema())
            .await?;
        let seo = normalize::seo(&normalize::strip_heading_markup(&raw))?;

        // f. Video prompts
        self.advance(
            store,
            &job.id,
            total - 1,
            total,
            "generating video prompts".to_string(),
        );
        let cue_prompt = fill(&self.prompts.video_prompt, &fenced(&content));
        let video_prompt = normalize::strip_heading_markup(
            &self.text_with_retry(store, &job.id, &cue_prompt).await?,
        );

        // g. Thumbnail — never fails the job.
        self.advance(store, &job.id, total, total, "fetching thumbnail".to_string());
        let thumbnail = self.resolve_thumbnail(job).await;

        Ok(JobOutput {
            content,
            seo: seo.as_text_block(),
            video_prompt,
            thumbnail,
        })
    }

    fn advance(&self, store: &JobStore, id: &str, stage: usize, total: usize, what: String) {
        store.advance(
            id,
            stage as f64 / total as f64,
            &format!("{stage}/{total}: {what}"),
        );
    }

    async fn text_with_retry(
        &self,
        store: &JobStore,
        id: &str,
        prompt: &str,
    ) -> Result<String, UpstreamError> {
        with_retry(
            &self.retry,
            UpstreamError::is_retryable,
            self.note_handler(store, id),
            || self.client.generate_text(prompt),
        )
        .await
    }

    async fn structured_with_retry(
        &self,
        store: &JobStore,
        id: &str,
        prompt: &str,
        schema: Value,
    ) -> Result<String, UpstreamError> {
        with_retry(
            &self.retry,
            UpstreamError::is_retryable,
            self.note_handler(store, id),
            || self.client.generate_structured(prompt, schema.clone()),
        )
        .await
    }

    /// Overlay the job's status line with a backoff notice during retries
    /// and restore it on recovery. Only the message changes; the progress
    /// fraction is untouched.
    fn note_handler<'a>(&self, store: &'a JobStore, id: &'a str) -> impl FnMut(RetryNote) + 'a {
        let base = store.message(id).unwrap_or_default();
        move |note| match note {
            RetryNote::BackingOff { wait, attempt } => {
                metrics::counter!("upstream_retries_total").increment(1);
                tracing::warn!(
                    job_id = %id,
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    "upstream busy, backing off"
                );
                store.set_message(
                    id,
                    &format!("{base} (upstream busy, retrying in {}s...)", wait.as_secs()),
                );
            }
            RetryNote::Recovered => store.set_message(id, &base),
        }
    }

    async fn resolve_thumbnail(&self, job: &Job) -> String {
        if let Some(link) = job
            .youtube_link
            .as_deref()
            .filter(|l| !l.trim().is_empty())
        {
            match thumbnail::extract_video_id(link) {
                Some(video_id) => match self.thumbnails.for_video(&video_id).await {
                    Ok(bytes) => return encode_image(&bytes),
                    Err(e) => tracing::warn!(
                        job_id = %job.id,
                        video_id = %video_id,
                        error = %e,
                        "reference thumbnail fetch failed"
                    ),
                },
                None => tracing::warn!(
                    job_id = %job.id,
                    "reference link has no recognizable video id"
                ),
            }
        }

        match self.thumbnail_fallback {
            ThumbnailPolicy::AiImage => {
                let prompt = format!(
                    "Create a visually stunning and compelling YouTube thumbnail for a video \
                     titled: \"{}\". Cinematic, high-resolution, vibrant colors, clear focus.",
                    job.title
                );
                match self.client.generate_image(&prompt).await {
                    Ok(bytes) => encode_image(&bytes),
                    Err(e) => {
                        tracing::warn!(job_id = %job.id, error = %e, "thumbnail generation failed");
                        String::new()
                    }
                }
            }
            ThumbnailPolicy::Placeholder => match self.thumbnails.placeholder().await {
                Ok(bytes) => encode_image(&bytes),
                Err(e) => {
                    tracing::warn!(job_id = %job.id, error = %e, "placeholder fetch failed");
                    String::new()
                }
            },
            ThumbnailPolicy::Empty => String::new(),
        }
    }
}

fn encode_image(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Substitute a template's literal `...` placeholder (first occurrence).
fn fill(template: &str, value: &str) -> String {
    template.replacen("...", value, 1)
}

fn fenced(text: &str) -> String {
    format!("```\n{text}\n```")
}

fn quoted(text: &str) -> String {
    format!("\"{text}\"")
}

/// Concatenate title and each outline point with its generated section, in
/// outline order.
fn assemble_script(title: &str, outline: &[String], sections: &[String]) -> String {
    let body = outline
        .iter()
        .zip(sections)
        .map(|(point, text)| format!("{point}\n\n{text}"))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("{title}\n\n{body}")
}

fn outline_schema() -> Value {
    json!({ "type": "ARRAY", "items": { "type": "STRING" } })
}

fn seo_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "title": { "type": "STRING" },
            "description": { "type": "STRING" },
            "keywords": { "type": "ARRAY", "items": { "type": "STRING" } }
        },
        "required": ["title", "description", "keywords"]
    })
}
