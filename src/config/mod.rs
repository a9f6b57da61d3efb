use serde::Deserialize;

use crate::services::thumbnail::ThumbnailPolicy;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Google AI Studio API key
    pub gemini_api_key: String,

    /// Text/JSON generation model
    #[serde(default = "default_text_model")]
    pub gemini_model: String,

    /// Image generation model (thumbnail fallback)
    #[serde(default = "default_image_model")]
    pub gemini_image_model: String,

    /// Maximum attempts per upstream call (1 = no retry)
    #[serde(default = "default_max_attempts")]
    pub upstream_max_attempts: u32,

    /// Initial backoff between retries in milliseconds (doubles per attempt)
    #[serde(default = "default_backoff_ms")]
    pub upstream_backoff_ms: u64,

    /// What to do when no usable reference-video thumbnail exists:
    /// "ai_image", "placeholder", or "empty".
    #[serde(default)]
    pub thumbnail_fallback: ThumbnailPolicy,

    /// How many outline sections the outline prompt requests. Keep in sync
    /// with `prompt_outline` when overriding either.
    #[serde(default = "default_outline_sections")]
    pub outline_sections: usize,

    /// Optional overrides for the stage prompt templates. Each template
    /// carries a literal `...` placeholder that is substituted at run time.
    #[serde(default)]
    pub prompt_outline: Option<String>,
    #[serde(default)]
    pub prompt_intro: Option<String>,
    #[serde(default)]
    pub prompt_content: Option<String>,
    #[serde(default)]
    pub prompt_seo: Option<String>,
    #[serde(default)]
    pub prompt_video: Option<String>,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_text_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_image_model() -> String {
    "imagen-4.0-generate-001".to_string()
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_ms() -> u64 {
    2000
}

fn default_outline_sections() -> usize {
    10
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Resolve the effective prompt set: defaults with any env overrides
    /// applied.
    pub fn prompts(&self) -> PromptConfig {
        let mut prompts = PromptConfig::default();
        prompts.outline_sections = self.outline_sections;
        if let Some(t) = &self.prompt_outline {
            prompts.outline = t.clone();
        }
        if let Some(t) = &self.prompt_intro {
            prompts.intro = t.clone();
        }
        if let Some(t) = &self.prompt_content {
            prompts.content = t.clone();
        }
        if let Some(t) = &self.prompt_seo {
            prompts.seo = t.clone();
        }
        if let Some(t) = &self.prompt_video {
            prompts.video_prompt = t.clone();
        }
        prompts
    }
}

/// Stage prompt templates. The generated content is Vietnamese-language
/// short-form video material, so the default templates are the Vietnamese
/// production prompts.
#[derive(Debug, Clone)]
pub struct PromptConfig {
    pub outline: String,
    pub intro: String,
    pub content: String,
    pub seo: String,
    pub video_prompt: String,
    /// Section count the outline template asks for. Used as the provisional
    /// stage total until the model's actual outline is in hand.
    pub outline_sections: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            outline: "Dựa vào nội dung này ..., hãy tạo cho tôi 1 dàn ý nội dung gồm 10 phần. \
                      Lưu ý: kịch bản sẽ cho video tiktok nên đoạn đầu tiên cần hấp dẫn, có nhiều câu hỏi, \
                      có nhiều bí ẩn, có nhiều plot-twist để giữ chân người dùng. \
                      Hiển thị kết quả theo cấu trúc sau:\n\
                      [Tên phần]: Nội dung chính; Thời gian; Câu mở đầu; Câu kết thúc;"
                .to_string(),
            intro: "Dựa vào ý này: \"...\" và kết hợp với nội dung gốc. \
                    Hãy viết cho tôi đoạn mở đầu hấp dẫn. Viết bằng tiếng Việt. \
                    Đoạn này có độ dài không quá 200 chữ."
                .to_string(),
            content: "Dựa vào ý này: \"...\" và kết hợp với nội dung gốc. \
                      Hãy viết cho tôi đoạn tiếp theo liền kết với đoạn trên. Viết bằng tiếng Việt. \
                      Đoạn này có độ dài không quá 200 chữ."
                .to_string(),
            seo: "Dựa vào tiêu đề video cung cấp, hãy thực hiện các yêu cầu sau và trả về kết quả \
                  dưới dạng một đối tượng JSON duy nhất:\n\
                  1. Tạo một tiêu đề video mới (sử dụng key \"title\"), tối ưu SEO, không quá 70 ký tự.\n\
                  2. Viết một mô tả video YouTube (sử dụng key \"description\") dài khoảng 100 từ.\n\
                  3. Đề xuất 10 từ khóa (sử dụng key \"keywords\"), mỗi từ khóa nên là một cụm từ ngắn.\n\n\
                  Tiêu đề video gốc là:"
                .to_string(),
            video_prompt: "Dựa vào kịch bản sau: \"...\", hãy gợi ý cho tôi các prompt tương ứng với \
                           từng cảnh phía trên. Các prompt này sẽ được dùng để tạo video trên các nền tảng AI \
                           như Midjourney, Heygen, ở dạng [Shot type] of [Scene/Motion], [Lighting & Mood], \
                           [Camera movement], [Style/Detail level] để dễ dàng copy-paste. \
                           Video full frame, no black bars, no letterbox. \
                           Hiển thị prompt rành mạch dạng dòng, không có số thứ tự. Chỉ hiển thị tiếng Anh."
                .to_string(),
            outline_sections: 10,
        }
    }
}
