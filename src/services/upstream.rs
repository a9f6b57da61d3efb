use async_trait::async_trait;
use serde_json::Value;

/// Narrow seam to the generative-model provider. The pipeline only ever
/// sees this trait; the concrete Gemini client lives behind it, and tests
/// substitute their own implementations.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Free-text generation.
    async fn generate_text(&self, prompt: &str) -> Result<String, UpstreamError>;

    /// JSON-mode generation constrained by a response schema. Returns the
    /// raw JSON text; decoding and shape normalization happen downstream.
    async fn generate_structured(&self, prompt: &str, schema: Value)
        -> Result<String, UpstreamError>;

    /// Image generation, used by the thumbnail fallback.
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, UpstreamError>;
}

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("empty response from model")]
    Empty,

    #[error("failed to decode generated image data: {0}")]
    Decode(#[from] base64::DecodeError),
}

impl UpstreamError {
    /// Transient failures worth backing off and retrying: rate limits,
    /// server-side errors, and connection-level trouble. Auth and
    /// malformed-request errors are fatal. The "overloaded" substring check
    /// covers providers that bury the condition in the message text.
    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::Http(e) => e.is_timeout() || e.is_connect(),
            UpstreamError::Api { status, message } => {
                *status == 429
                    || *status >= 500
                    || message.to_lowercase().contains("overloaded")
            }
            UpstreamError::Empty | UpstreamError::Decode(_) => false,
        }
    }
}
