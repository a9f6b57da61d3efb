use serde::{Deserialize, Serialize};

/// Normalized SEO metadata for one video. All fields are guaranteed
/// non-empty by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoRecord {
    pub title: String,
    pub description: String,
    pub keywords: Vec<String>,
}

impl SeoRecord {
    /// Render as the flat downloadable text block: title, blank line,
    /// description, blank line, comma-joined keywords.
    pub fn as_text_block(&self) -> String {
        format!(
            "{}\n\n{}\n\n{}",
            self.title,
            self.description,
            self.keywords.join(", ")
        )
    }
}
