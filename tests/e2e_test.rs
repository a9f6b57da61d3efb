//! End-to-end pipeline tests against scripted upstream doubles: stage
//! ordering, the progress ladder, retry/failure semantics, and multi-job
//! isolation.

mod helpers;

use base64::Engine;
use helpers::{
    new_job, test_scheduler, wait_terminal, RoutedUpstream, Scripted, ScriptedUpstream,
};
use scriptforge::models::job::JobStatus;
use scriptforge::services::scheduler::RunOutcome;
use scriptforge::services::thumbnail::ThumbnailPolicy;
use std::sync::Arc;

fn assert_close(actual: &[f64], expected: &[f64]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "progress samples: {actual:?} vs {expected:?}"
    );
    for (a, e) in actual.iter().zip(expected) {
        assert!(
            (a - e).abs() < 1e-9,
            "progress samples: {actual:?} vs {expected:?}"
        );
    }
}

fn happy_script() -> Vec<Scripted> {
    vec![
        Scripted::Json(r#"["One","Two","Three"]"#),
        Scripted::Text("intro text"),
        Scripted::Text("body one"),
        Scripted::Text("body two"),
        Scripted::Json(r#"{"title":"T","description":"D","keywords":"a, b, c"}"#),
        Scripted::Text("cue lines"),
        Scripted::Image(vec![1, 2, 3]),
    ]
}

#[tokio::test(start_paused = true)]
async fn test_full_pipeline_call_order_and_progress_ladder() {
    let upstream = ScriptedUpstream::new(happy_script());
    let scheduler = test_scheduler(upstream.clone(), 3, ThumbnailPolicy::AiImage);

    let job = scheduler.add_job(new_job("vid1", "the source script"));
    upstream.watch(scheduler.store().clone(), job.id.clone());

    assert_eq!(scheduler.run_one(&job.id), RunOutcome::Started);
    assert_eq!(wait_terminal(scheduler.store(), &job.id).await, JobStatus::Completed);

    // Exactly 3 + 4 upstream calls, in stage order.
    assert_eq!(
        upstream.calls(),
        vec!["structured", "text", "text", "text", "structured", "text", "image"]
    );

    // Each stage advanced to k/7 before its call went out.
    assert_close(
        &upstream.progress_at_calls(),
        &[
            1.0 / 7.0,
            2.0 / 7.0,
            3.0 / 7.0,
            4.0 / 7.0,
            5.0 / 7.0,
            6.0 / 7.0,
            1.0,
        ],
    );

    let finished = scheduler.get(&job.id).unwrap();
    assert_eq!(finished.progress, 1.0);
    assert_eq!(finished.progress_message, "done");
    assert!(finished.error.is_none());

    let output = finished.output.unwrap();
    assert_eq!(
        output.content,
        "Video vid1\n\nOne\n\nintro text\n\nTwo\n\nbody one\n\nThree\n\nbody two"
    );
    assert_eq!(output.seo, "T\n\nD\n\na, b, c");
    assert_eq!(output.video_prompt, "cue lines");
    assert_eq!(
        output.thumbnail,
        base64::engine::general_purpose::STANDARD.encode([1, 2, 3])
    );
}

#[tokio::test(start_paused = true)]
async fn test_transient_failure_retries_without_corrupting_progress() {
    let mut script = happy_script();
    // First intro attempt hits a transient overload; the retry succeeds.
    script.insert(
        1,
        Scripted::Fail {
            status: 503,
            message: "Service Unavailable",
        },
    );
    let upstream = ScriptedUpstream::new(script);
    let scheduler = test_scheduler(upstream.clone(), 3, ThumbnailPolicy::AiImage);

    let job = scheduler.add_job(new_job("vid2", "the source script"));
    upstream.watch(scheduler.store().clone(), job.id.clone());

    scheduler.run_one(&job.id);
    assert_eq!(wait_terminal(scheduler.store(), &job.id).await, JobStatus::Completed);

    // One extra call for the retried intro stage, still in order.
    assert_eq!(
        upstream.calls(),
        vec!["structured", "text", "text", "text", "text", "structured", "text", "image"]
    );

    // The retried attempt ran at the same fraction as the failed one: the
    // backoff overlay touches only the message, never the progress.
    assert_close(
        &upstream.progress_at_calls(),
        &[
            1.0 / 7.0,
            2.0 / 7.0,
            2.0 / 7.0,
            3.0 / 7.0,
            4.0 / 7.0,
            5.0 / 7.0,
            6.0 / 7.0,
            1.0,
        ],
    );

    assert_eq!(scheduler.get(&job.id).unwrap().progress, 1.0);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_upstream_error_fails_job_and_preserves_progress() {
    let script = vec![
        Scripted::Json(r#"["One","Two","Three"]"#),
        Scripted::Fail {
            status: 400,
            message: "API key not valid",
        },
    ];
    let upstream = ScriptedUpstream::new(script);
    let scheduler = test_scheduler(upstream.clone(), 3, ThumbnailPolicy::AiImage);

    let job = scheduler.add_job(new_job("vid3", "the source script"));
    scheduler.run_one(&job.id);
    assert_eq!(wait_terminal(scheduler.store(), &job.id).await, JobStatus::Error);

    // Fatal: called exactly once at the intro stage, no retry.
    assert_eq!(upstream.calls(), vec!["structured", "text"]);

    let failed = scheduler.get(&job.id).unwrap();
    assert_eq!(
        failed.error.as_deref(),
        Some("upstream API error (status 400): API key not valid")
    );
    assert!((failed.progress - 2.0 / 7.0).abs() < 1e-9);
    assert!(failed.output.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_unparseable_outline_fails_closed() {
    let upstream = ScriptedUpstream::new(vec![Scripted::Json("this is not json")]);
    let scheduler = test_scheduler(upstream.clone(), 3, ThumbnailPolicy::Empty);

    let job = scheduler.add_job(new_job("vid4", "the source script"));
    scheduler.run_one(&job.id);
    assert_eq!(wait_terminal(scheduler.store(), &job.id).await, JobStatus::Error);

    let failed = scheduler.get(&job.id).unwrap();
    let error = failed.error.unwrap();
    assert!(
        error.starts_with("invalid JSON from model"),
        "unexpected error: {error}"
    );
    // Normalization failures are never retried.
    assert_eq!(upstream.calls(), vec!["structured"]);
    assert!((failed.progress - 1.0 / 7.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_thumbnail_failure_is_non_fatal() {
    let mut script = happy_script();
    script.pop();
    script.push(Scripted::Fail {
        status: 500,
        message: "image backend exploded",
    });
    let upstream = ScriptedUpstream::new(script);
    let scheduler = test_scheduler(upstream.clone(), 3, ThumbnailPolicy::AiImage);

    let job = scheduler.add_job(new_job("vid5", "the source script"));
    scheduler.run_one(&job.id);
    assert_eq!(wait_terminal(scheduler.store(), &job.id).await, JobStatus::Completed);

    let finished = scheduler.get(&job.id).unwrap();
    let output = finished.output.unwrap();
    assert!(output.thumbnail.is_empty());
    assert!(!output.content.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_run_all_isolates_per_job_failures() {
    let scheduler = test_scheduler(Arc::new(RoutedUpstream), 3, ThumbnailPolicy::AiImage);

    let j1 = scheduler.add_job(new_job("c1", "clean script one"));
    let j2 = scheduler.add_job(new_job("c2", "POISON script"));
    let j3 = scheduler.add_job(new_job("c3", "clean script three"));

    assert_eq!(scheduler.run_all(), 3);

    assert_eq!(wait_terminal(scheduler.store(), &j1.id).await, JobStatus::Completed);
    assert_eq!(wait_terminal(scheduler.store(), &j2.id).await, JobStatus::Error);
    assert_eq!(wait_terminal(scheduler.store(), &j3.id).await, JobStatus::Completed);

    // The poisoned job failed at its outline stage with partial progress
    // preserved; the healthy jobs were untouched by it.
    let failed = scheduler.get(&j2.id).unwrap();
    assert!((failed.progress - 1.0 / 7.0).abs() < 1e-9);
    assert!(failed.error.unwrap().contains("API key not valid"));

    for id in [&j1.id, &j3.id] {
        let job = scheduler.get(id).unwrap();
        assert_eq!(job.progress, 1.0);
        assert!(job.output.is_some());
    }

    // A second sweep finds nothing Waiting.
    assert_eq!(scheduler.run_all(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_run_one_skips_non_waiting_and_missing_jobs() {
    // Thumbnail policy Empty: six upstream calls, no image stage call.
    let mut script = happy_script();
    script.pop();
    let upstream = ScriptedUpstream::new(script);
    let scheduler = test_scheduler(upstream, 3, ThumbnailPolicy::Empty);

    let job = scheduler.add_job(new_job("vid6", "the source script"));
    assert_eq!(scheduler.run_one(&job.id), RunOutcome::Started);
    // Already Processing: the transition happens before the task spawns.
    assert_eq!(scheduler.run_one(&job.id), RunOutcome::NotWaiting);

    assert_eq!(wait_terminal(scheduler.store(), &job.id).await, JobStatus::Completed);
    // Terminal jobs are not restarted either.
    assert_eq!(scheduler.run_one(&job.id), RunOutcome::NotWaiting);
    assert_eq!(scheduler.run_one("no-such-job"), RunOutcome::NotFound);
}
