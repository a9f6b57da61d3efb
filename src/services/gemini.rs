use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::services::retry::{with_retry, RetryPolicy};
use crate::services::upstream::{UpstreamClient, UpstreamError};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Client for the Google Gemini generative-language API.
pub struct GeminiClient {
    http: Client,
    api_key: String,
    model: String,
    image_model: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Value>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Prediction {
    bytes_base64_encoded: Option<String>,
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl GeminiClient {
    pub fn new(
        api_key: &str,
        model: &str,
        image_model: &str,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
            image_model: image_model.to_string(),
        })
    }

    async fn generate(
        &self,
        prompt: &str,
        generation_config: Option<GenerationConfig>,
        tools: Option<Value>,
    ) -> Result<String, UpstreamError> {
        let url = format!("{API_BASE}/models/{}:generateContent", self.model);
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config,
            tools,
        };

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Api {
                status: status.as_u16(),
                message: api_error_message(response, status).await,
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(UpstreamError::Empty);
        }
        Ok(text)
    }

    /// Probe whether the configured API key is usable with a minimal
    /// generation request.
    pub async fn check_key(&self) -> bool {
        if self.api_key.trim().is_empty() {
            return false;
        }
        let config = GenerationConfig {
            max_output_tokens: Some(2),
            ..Default::default()
        };
        match self.generate("test", Some(config), None).await {
            Ok(_) | Err(UpstreamError::Empty) => true,
            Err(e) => {
                tracing::warn!(error = %e, "API key check failed");
                false
            }
        }
    }

    /// Extract a transcript or detailed summary of a reference video using
    /// a search-grounded generation call. Ads are excluded by instruction.
    pub async fn fetch_transcript(&self, url: &str) -> Result<String, UpstreamError> {
        let prompt = format!(
            "Analyze the YouTube video at this URL: {url}.\n\
             Your primary goal is to extract a detailed summary or transcript of the main spoken content.\n\
             IT IS CRITICAL THAT YOU IGNORE ALL ADVERTISEMENTS. Do not include content from ads that may \
             appear at the beginning, middle, or end of the video. Focus exclusively on the core content \
             created by the channel owner.\n\
             If a direct transcript is available, prefer that. Otherwise, provide a thorough summary of \
             the video's topics."
        );
        let tools = serde_json::json!([{ "googleSearch": {} }]);

        // Transcript extraction is flaky regardless of the failure kind, so
        // every error gets the bounded retry here.
        with_retry(
            &RetryPolicy::default(),
            |_: &UpstreamError| true,
            |_| {},
            || self.generate(&prompt, None, Some(tools.clone())),
        )
        .await
    }
}

async fn api_error_message(response: reqwest::Response, status: reqwest::StatusCode) -> String {
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<ApiErrorEnvelope>(&body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| {
            if body.trim().is_empty() {
                status.to_string()
            } else {
                body.trim().to_string()
            }
        })
}

#[async_trait]
impl UpstreamClient for GeminiClient {
    async fn generate_text(&self, prompt: &str) -> Result<String, UpstreamError> {
        self.generate(prompt, None, None).await
    }

    async fn generate_structured(
        &self,
        prompt: &str,
        schema: Value,
    ) -> Result<String, UpstreamError> {
        let config = GenerationConfig {
            response_mime_type: Some("application/json".to_string()),
            response_schema: Some(schema),
            ..Default::default()
        };
        self.generate(prompt, Some(config), None).await
    }

    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>, UpstreamError> {
        let url = format!("{API_BASE}/models/{}:predict", self.image_model);
        let body = serde_json::json!({
            "instances": [{ "prompt": prompt }],
            "parameters": {
                "sampleCount": 1,
                "aspectRatio": "16:9",
                "outputMimeType": "image/jpeg"
            }
        });

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamError::Api {
                status: status.as_u16(),
                message: api_error_message(response, status).await,
            });
        }

        let parsed: PredictResponse = response.json().await?;
        let encoded = parsed
            .predictions
            .into_iter()
            .next()
            .and_then(|p| p.bytes_base64_encoded)
            .ok_or(UpstreamError::Empty)?;

        Ok(base64::engine::general_purpose::STANDARD.decode(encoded)?)
    }
}
