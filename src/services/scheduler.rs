use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Utc;
use serde::Serialize;

use crate::models::job::{Job, JobOutput, JobStatus, NewJob};
use crate::services::pipeline::Pipeline;

/// Cloneable handle to the in-memory job registry.
///
/// Guards are held only for a single lookup or state-machine transition,
/// never across await points. Mutations for a job that has been deleted
/// are silently dropped: an in-flight pipeline run may outlive its job.
#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<String, Job>>>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct JobCounts {
    pub waiting: usize,
    pub processing: usize,
    pub completed: usize,
    pub error: usize,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_job<R>(&self, id: &str, f: impl FnOnce(&mut Job) -> R) -> Option<R> {
        let mut jobs = self.jobs.write().expect("job registry lock poisoned");
        jobs.get_mut(id).map(f)
    }

    /// Register a new Waiting job. The id is the video code plus creation
    /// time in milliseconds, nudged forward on a same-millisecond collision.
    pub fn insert_new(&self, input: NewJob) -> Job {
        let mut jobs = self.jobs.write().expect("job registry lock poisoned");
        let mut millis = Utc::now().timestamp_millis();
        let id = loop {
            let candidate = format!("{}-{}", input.video_code, millis);
            if !jobs.contains_key(&candidate) {
                break candidate;
            }
            millis += 1;
        };
        let job = Job::new(id, input);
        jobs.insert(job.id.clone(), job.clone());
        job
    }

    pub fn get(&self, id: &str) -> Option<Job> {
        self.jobs
            .read()
            .expect("job registry lock poisoned")
            .get(id)
            .cloned()
    }

    /// All jobs, newest first.
    pub fn list(&self) -> Vec<Job> {
        let jobs = self.jobs.read().expect("job registry lock poisoned");
        let mut all: Vec<Job> = jobs.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        all
    }

    pub fn remove(&self, id: &str) -> Option<Job> {
        self.jobs
            .write()
            .expect("job registry lock poisoned")
            .remove(id)
    }

    pub fn clear(&self) -> usize {
        let mut jobs = self.jobs.write().expect("job registry lock poisoned");
        let removed = jobs.len();
        jobs.clear();
        removed
    }

    pub fn counts(&self) -> JobCounts {
        let jobs = self.jobs.read().expect("job registry lock poisoned");
        let mut counts = JobCounts {
            waiting: 0,
            processing: 0,
            completed: 0,
            error: 0,
        };
        for job in jobs.values() {
            match job.status {
                JobStatus::Waiting => counts.waiting += 1,
                JobStatus::Processing => counts.processing += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Error => counts.error += 1,
            }
        }
        counts
    }

    /// Snapshot of the Waiting set, taken before dispatch so concurrent
    /// registry changes cannot perturb a `run_all` sweep.
    pub fn waiting_ids(&self) -> Vec<String> {
        let jobs = self.jobs.read().expect("job registry lock poisoned");
        let mut ids: Vec<(String, chrono::DateTime<Utc>)> = jobs
            .values()
            .filter(|j| j.status == JobStatus::Waiting)
            .map(|j| (j.id.clone(), j.created_at))
            .collect();
        ids.sort_by(|a, b| a.1.cmp(&b.1));
        ids.into_iter().map(|(id, _)| id).collect()
    }

    pub fn message(&self, id: &str) -> Option<String> {
        self.jobs
            .read()
            .expect("job registry lock poisoned")
            .get(id)
            .map(|j| j.progress_message.clone())
    }

    /// Waiting → Processing, applied atomically under the registry lock.
    pub fn try_start(&self, id: &str) -> Option<Result<(), crate::models::job::IllegalTransition>> {
        self.with_job(id, |job| job.start())
    }

    pub fn advance(&self, id: &str, fraction: f64, message: &str) {
        if self.with_job(id, |job| job.advance(fraction, message)).is_none() {
            tracing::debug!(job_id = %id, "progress update for removed job dropped");
        }
    }

    pub fn set_message(&self, id: &str, message: &str) {
        self.with_job(id, |job| job.set_message(message));
    }

    pub fn complete(&self, id: &str, output: JobOutput) {
        match self.with_job(id, |job| job.complete(output)) {
            Some(Ok(())) => {}
            Some(Err(e)) => tracing::warn!(job_id = %id, error = %e, "completion dropped"),
            None => tracing::debug!(job_id = %id, "completion for removed job dropped"),
        }
    }

    pub fn fail(&self, id: &str, error: &str) {
        match self.with_job(id, |job| job.fail(error)) {
            Some(Ok(())) => {}
            Some(Err(e)) => tracing::warn!(job_id = %id, error = %e, "failure update dropped"),
            None => tracing::debug!(job_id = %id, "failure update for removed job dropped"),
        }
    }
}

/// Outcome of a `run_one` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Started,
    NotWaiting,
    NotFound,
}

/// Owns the job registry and dispatches pipeline runs. Each started job
/// executes as its own task; jobs never block one another and one job's
/// failure never touches the rest.
pub struct JobScheduler {
    store: JobStore,
    pipeline: Arc<Pipeline>,
}

impl JobScheduler {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            store: JobStore::new(),
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn add_job(&self, input: NewJob) -> Job {
        let job = self.store.insert_new(input);
        metrics::counter!("content_jobs_total").increment(1);
        tracing::info!(job_id = %job.id, title = %job.title, "job registered");
        job
    }

    /// Start one Waiting job. Absent and non-Waiting jobs are left alone:
    /// running jobs are not restarted and terminal jobs must be re-created.
    pub fn run_one(&self, id: &str) -> RunOutcome {
        match self.store.try_start(id) {
            None => RunOutcome::NotFound,
            Some(Err(_)) => RunOutcome::NotWaiting,
            Some(Ok(())) => {
                let store = self.store.clone();
                let pipeline = Arc::clone(&self.pipeline);
                let job_id = id.to_string();
                tokio::spawn(async move {
                    pipeline.run(&store, &job_id).await;
                });
                RunOutcome::Started
            }
        }
    }

    /// Start every currently-Waiting job. Returns how many were started.
    pub fn run_all(&self) -> usize {
        self.store
            .waiting_ids()
            .iter()
            .filter(|id| self.run_one(id) == RunOutcome::Started)
            .count()
    }

    pub fn get(&self, id: &str) -> Option<Job> {
        self.store.get(id)
    }

    pub fn list(&self) -> Vec<Job> {
        self.store.list()
    }

    /// Remove a job from the registry. An in-flight run keeps executing,
    /// but its further state updates hit nothing.
    pub fn delete_job(&self, id: &str) -> bool {
        let removed = self.store.remove(id).is_some();
        if removed {
            tracing::info!(job_id = %id, "job deleted");
        }
        removed
    }

    pub fn delete_all(&self) -> usize {
        let removed = self.store.clear();
        tracing::info!(count = removed, "all jobs deleted");
        removed
    }
}
