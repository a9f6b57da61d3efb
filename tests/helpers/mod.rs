//! Shared test doubles: upstream clients with scripted or rule-based
//! behavior, plus builders for a pipeline/scheduler wired to them.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use scriptforge::config::PromptConfig;
use scriptforge::models::job::{JobStatus, NewJob};
use scriptforge::services::pipeline::Pipeline;
use scriptforge::services::retry::RetryPolicy;
use scriptforge::services::scheduler::{JobScheduler, JobStore};
use scriptforge::services::thumbnail::{ThumbnailFetcher, ThumbnailPolicy};
use scriptforge::services::upstream::{UpstreamClient, UpstreamError};

/// One pre-scripted upstream response, consumed in order.
#[derive(Debug, Clone)]
pub enum Scripted {
    Json(&'static str),
    Text(&'static str),
    Image(Vec<u8>),
    Fail { status: u16, message: &'static str },
}

/// Upstream double that replays a fixed response sequence and records, per
/// call, the call kind and the watched job's progress at call time (the
/// pipeline must advance progress *before* issuing each call).
pub struct ScriptedUpstream {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<&'static str>>,
    progress_at_call: Mutex<Vec<f64>>,
    watch: Mutex<Option<(JobStore, String)>>,
}

impl ScriptedUpstream {
    pub fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
            progress_at_call: Mutex::new(Vec::new()),
            watch: Mutex::new(None),
        })
    }

    pub fn watch(&self, store: JobStore, job_id: String) {
        *self.watch.lock().unwrap() = Some((store, job_id));
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn progress_at_calls(&self) -> Vec<f64> {
        self.progress_at_call.lock().unwrap().clone()
    }

    fn next(&self, kind: &'static str) -> Result<Scripted, UpstreamError> {
        self.calls.lock().unwrap().push(kind);
        if let Some((store, job_id)) = self.watch.lock().unwrap().as_ref() {
            let progress = store.get(job_id).map(|j| j.progress).unwrap_or(-1.0);
            self.progress_at_call.lock().unwrap().push(progress);
        }
        match self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .expect("upstream script exhausted")
        {
            Scripted::Fail { status, message } => Err(UpstreamError::Api {
                status,
                message: message.to_string(),
            }),
            item => Ok(item),
        }
    }
}

#[async_trait]
impl UpstreamClient for ScriptedUpstream {
    async fn generate_text(&self, _prompt: &str) -> Result<String, UpstreamError> {
        match self.next("text")? {
            Scripted::Text(s) => Ok(s.to_string()),
            other => panic!("scripted a non-text response for a text call: {other:?}"),
        }
    }

    async fn generate_structured(
        &self,
        _prompt: &str,
        _schema: Value,
    ) -> Result<String, UpstreamError> {
        match self.next("structured")? {
            Scripted::Json(s) => Ok(s.to_string()),
            other => panic!("scripted a non-json response for a structured call: {other:?}"),
        }
    }

    async fn generate_image(&self, _prompt: &str) -> Result<Vec<u8>, UpstreamError> {
        match self.next("image")? {
            Scripted::Image(bytes) => Ok(bytes),
            other => panic!("scripted a non-image response for an image call: {other:?}"),
        }
    }
}

/// Rule-based upstream double for concurrent multi-job tests, where a
/// shared scripted queue would interleave nondeterministically. Any prompt
/// embedding the marker `POISON` fails fatally.
pub struct RoutedUpstream;

#[async_trait]
impl UpstreamClient for RoutedUpstream {
    async fn generate_text(&self, prompt: &str) -> Result<String, UpstreamError> {
        if prompt.contains("POISON") {
            return Err(fatal_key_error());
        }
        Ok("generated text".to_string())
    }

    async fn generate_structured(
        &self,
        prompt: &str,
        _schema: Value,
    ) -> Result<String, UpstreamError> {
        if prompt.contains("POISON") {
            return Err(fatal_key_error());
        }
        if prompt.starts_with("SEO:") {
            Ok(r#"{"title":"T","description":"D","keywords":["k1","k2"]}"#.to_string())
        } else {
            Ok(r#"["Point 1","Point 2","Point 3"]"#.to_string())
        }
    }

    async fn generate_image(&self, _prompt: &str) -> Result<Vec<u8>, UpstreamError> {
        Ok(vec![0xFF, 0xD8, 0xFF])
    }
}

fn fatal_key_error() -> UpstreamError {
    UpstreamError::Api {
        status: 400,
        message: "API key not valid".to_string(),
    }
}

/// Distinctive templates so rule-based doubles can tell stages apart.
pub fn test_prompts(outline_sections: usize) -> PromptConfig {
    PromptConfig {
        outline: "OUTLINE: ...".to_string(),
        intro: "INTRO: ...".to_string(),
        content: "CONTENT: ...".to_string(),
        seo: "SEO:".to_string(),
        video_prompt: "CUES: ...".to_string(),
        outline_sections,
    }
}

pub fn test_pipeline(
    client: Arc<dyn UpstreamClient>,
    outline_sections: usize,
    policy: ThumbnailPolicy,
) -> Pipeline {
    Pipeline::new(
        client,
        test_prompts(outline_sections),
        RetryPolicy::default(),
        ThumbnailFetcher::new().expect("thumbnail fetcher"),
        policy,
    )
}

pub fn test_scheduler(
    client: Arc<dyn UpstreamClient>,
    outline_sections: usize,
    policy: ThumbnailPolicy,
) -> JobScheduler {
    JobScheduler::new(test_pipeline(client, outline_sections, policy))
}

pub fn new_job(code: &str, script: &str) -> NewJob {
    NewJob {
        title: format!("Video {code}"),
        video_code: code.to_string(),
        youtube_link: None,
        script: script.to_string(),
    }
}

/// Poll until the job reaches a terminal state. Works under paused time:
/// the sleeps auto-advance the clock while the pipeline task runs.
pub async fn wait_terminal(store: &JobStore, job_id: &str) -> JobStatus {
    for _ in 0..2000 {
        match store.get(job_id) {
            Some(job) if job.status.is_terminal() => return job.status,
            Some(_) => {}
            None => panic!("job {job_id} vanished while waiting"),
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("job {job_id} never reached a terminal state");
}
