use std::sync::Arc;

use crate::services::gemini::GeminiClient;
use crate::services::scheduler::JobScheduler;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<JobScheduler>,
    pub gemini: Arc<GeminiClient>,
    pub model_name: String,
}

impl AppState {
    pub fn new(scheduler: JobScheduler, gemini: Arc<GeminiClient>, model_name: String) -> Self {
        Self {
            scheduler: Arc::new(scheduler),
            gemini,
            model_name,
        }
    }
}
