use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use serde::Deserialize;

const FETCH_TIMEOUT_SECS: u64 = 30;
const PLACEHOLDER_URL: &str = "https://picsum.photos/1280/720";

/// What the thumbnail stage does when no usable reference-video image
/// exists: generate one with the image model, fetch a generic placeholder,
/// or leave the thumbnail empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThumbnailPolicy {
    AiImage,
    Placeholder,
    #[default]
    Empty,
}

fn video_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:youtu\.be/|/v/|u/\w/|embed/|watch\?v=|&v=)([^#&?/]*)")
            .expect("valid video id regex")
    })
}

/// Derive the platform video id from a reference link. Ids are exactly 11
/// characters; anything else is rejected.
pub fn extract_video_id(url: &str) -> Option<String> {
    let captures = video_id_re().captures(url)?;
    let id = captures.get(1)?.as_str();
    (id.len() == 11).then(|| id.to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    #[error("thumbnail fetch failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("thumbnail fetch returned status {0}")]
    Status(u16),

    #[error("fetched data is not a recognized image: {0}")]
    Format(#[from] image::ImageError),
}

/// Fetches platform-hosted video thumbnails and placeholder images,
/// bypassing the language model entirely.
pub struct ThumbnailFetcher {
    http: Client,
}

impl ThumbnailFetcher {
    pub fn new() -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .build()?;
        Ok(Self { http })
    }

    /// Fetch the hosted thumbnail for a video id: maxresdefault first,
    /// hqdefault when the high-resolution variant does not exist.
    pub async fn for_video(&self, video_id: &str) -> Result<Vec<u8>, ThumbnailError> {
        let primary = format!("https://img.youtube.com/vi/{video_id}/maxresdefault.jpg");
        match self.fetch_image(&primary).await {
            Ok(bytes) => Ok(bytes),
            Err(_) => {
                let fallback = format!("https://img.youtube.com/vi/{video_id}/hqdefault.jpg");
                self.fetch_image(&fallback).await
            }
        }
    }

    pub async fn placeholder(&self) -> Result<Vec<u8>, ThumbnailError> {
        self.fetch_image(PLACEHOLDER_URL).await
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>, ThumbnailError> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ThumbnailError::Status(status.as_u16()));
        }
        let bytes = response.bytes().await?.to_vec();
        // Hosts answer some misses with an HTML error page and a 200.
        image::guess_format(&bytes)?;
        Ok(bytes)
    }
}
