use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a content-generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobStatus {
    Waiting,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

/// Finished artifact bundle attached to a completed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutput {
    /// Full assembled narrative script.
    pub content: String,
    /// SEO text block (title, description, comma-joined keywords).
    pub seo: String,
    /// Video-generation prompts, one cue per line.
    pub video_prompt: String,
    /// Base64-encoded JPEG, or empty when no thumbnail could be produced.
    pub thumbnail: String,
}

/// Static inputs for a new job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub title: String,
    pub video_code: String,
    pub youtube_link: Option<String>,
    pub script: String,
}

/// One content-generation job. Static inputs are immutable after creation;
/// the mutable fields are owned by the pipeline run once started.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub title: String,
    pub video_code: String,
    pub youtube_link: Option<String>,
    pub script: String,
    pub status: JobStatus,
    /// Fraction in [0, 1], non-decreasing within one run.
    pub progress: f64,
    pub progress_message: String,
    pub error: Option<String>,
    pub output: Option<JobOutput>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
#[error("illegal transition: job is {status}")]
pub struct IllegalTransition {
    pub status: JobStatus,
}

impl Job {
    pub fn new(id: String, input: NewJob) -> Self {
        let now = Utc::now();
        Self {
            id,
            title: input.title,
            video_code: input.video_code,
            youtube_link: input.youtube_link,
            script: input.script,
            status: JobStatus::Waiting,
            progress: 0.0,
            progress_message: "ready".to_string(),
            error: None,
            output: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Waiting → Processing. Any other starting state is illegal: terminal
    /// jobs must be re-created, not resumed.
    pub fn start(&mut self) -> Result<(), IllegalTransition> {
        if self.status != JobStatus::Waiting {
            return Err(IllegalTransition { status: self.status });
        }
        self.status = JobStatus::Processing;
        self.progress = 0.0;
        self.progress_message = "starting".to_string();
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Update progress and status line while Processing. Progress is clamped
    /// so it never decreases within a run; updates outside Processing are
    /// ignored.
    pub fn advance(&mut self, fraction: f64, message: impl Into<String>) {
        if self.status != JobStatus::Processing {
            return;
        }
        self.progress = self.progress.max(fraction.clamp(0.0, 1.0));
        self.progress_message = message.into();
        self.updated_at = Utc::now();
    }

    /// Replace the status line without touching the progress fraction.
    /// Used for transient annotations (retry backoff notices).
    pub fn set_message(&mut self, message: impl Into<String>) {
        if self.status != JobStatus::Processing {
            return;
        }
        self.progress_message = message.into();
        self.updated_at = Utc::now();
    }

    /// Processing → Completed with the finished artifact bundle attached.
    pub fn complete(&mut self, output: JobOutput) -> Result<(), IllegalTransition> {
        if self.status != JobStatus::Processing {
            return Err(IllegalTransition { status: self.status });
        }
        self.status = JobStatus::Completed;
        self.progress = 1.0;
        self.progress_message = "done".to_string();
        self.output = Some(output);
        self.error = None;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Processing → Error. The last progress value is preserved for
    /// diagnostics rather than reset.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), IllegalTransition> {
        if self.status != JobStatus::Processing {
            return Err(IllegalTransition { status: self.status });
        }
        self.status = JobStatus::Error;
        self.error = Some(error.into());
        self.progress_message = "failed".to_string();
        self.updated_at = Utc::now();
        Ok(())
    }
}
