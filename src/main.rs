use std::sync::Arc;
use std::time::Duration;

use axum::{routing::get, routing::post, Router};
use metrics_exporter_prometheus::PrometheusBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use scriptforge::app_state::AppState;
use scriptforge::config::AppConfig;
use scriptforge::routes;
use scriptforge::services::{
    gemini::GeminiClient,
    pipeline::Pipeline,
    retry::RetryPolicy,
    scheduler::JobScheduler,
    thumbnail::ThumbnailFetcher,
    upstream::UpstreamClient,
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    tracing::info!("Initializing scriptforge server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);

    // Register application metrics
    metrics::describe_counter!("content_jobs_total", "Total content jobs registered");
    metrics::describe_counter!("content_jobs_completed", "Total content jobs completed");
    metrics::describe_counter!("content_jobs_failed", "Total content jobs failed");
    metrics::describe_counter!(
        "upstream_retries_total",
        "Upstream calls retried after transient failures"
    );
    metrics::describe_histogram!(
        "content_job_duration_seconds",
        "Wall-clock time to run one job's pipeline"
    );

    // Initialize Gemini client
    tracing::info!(model = %config.gemini_model, "Initializing Gemini client");
    let gemini = Arc::new(
        GeminiClient::new(
            &config.gemini_api_key,
            &config.gemini_model,
            &config.gemini_image_model,
        )
        .expect("Failed to initialize Gemini client"),
    );

    // Initialize thumbnail fetcher
    let thumbnails = ThumbnailFetcher::new().expect("Failed to initialize thumbnail fetcher");

    // Assemble the pipeline and scheduler
    let pipeline = Pipeline::new(
        gemini.clone() as Arc<dyn UpstreamClient>,
        config.prompts(),
        RetryPolicy::new(
            config.upstream_max_attempts,
            Duration::from_millis(config.upstream_backoff_ms),
        ),
        thumbnails,
        config.thumbnail_fallback,
    );
    let scheduler = JobScheduler::new(pipeline);

    let state = AppState::new(scheduler, gemini, config.gemini_model.clone());

    // Build API routes
    let app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route(
            "/api/v1/jobs",
            post(routes::jobs::create_job)
                .get(routes::jobs::list_jobs)
                .delete(routes::jobs::delete_all_jobs),
        )
        .route("/api/v1/jobs/run-all", post(routes::jobs::run_all))
        .route(
            "/api/v1/jobs/archive",
            get(routes::artifacts::download_all_completed),
        )
        .route(
            "/api/v1/jobs/{id}",
            get(routes::jobs::get_job).delete(routes::jobs::delete_job),
        )
        .route("/api/v1/jobs/{id}/run", post(routes::jobs::run_job))
        .route(
            "/api/v1/jobs/{id}/archive",
            get(routes::artifacts::download_job_archive),
        )
        .route(
            "/api/v1/jobs/{id}/artifacts/{kind}",
            get(routes::artifacts::download_artifact),
        )
        .route("/api/v1/upstream/check", post(routes::upstream::check_key))
        .route("/api/v1/transcript", post(routes::upstream::fetch_transcript))
        .with_state(state)
        // Prometheus metrics endpoint (separate state)
        .route(
            "/metrics",
            get(routes::health::prometheus_metrics).with_state(prometheus_handle),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(2 * 1024 * 1024)); // scripts are text; 2 MB is generous

    tracing::info!("Starting scriptforge on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
