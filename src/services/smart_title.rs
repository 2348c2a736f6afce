use serde::Deserialize;
use std::sync::Arc;

use crate::models::persona::AssistantType;
use crate::services::gemini::{GeminiClient, GeminiError};

/// Title used when everything else produced an empty string.
pub const FALLBACK_TITLE: &str = "Cuộc trò chuyện";

const MAX_TITLE_CHARS: usize = 48;
const EDGE_TRIM: [char; 12] = ['"', '\'', '“', '”', '‘', '’', '[', ']', '(', ')', '{', '}'];
const TRAILING_PUNCT: [char; 9] = ['.', '?', '!', ',', ':', ';', '。', '、', '…'];

/// Final server-side cleanup of a generated title: strip surrounding quotes
/// and brackets, collapse whitespace, drop trailing punctuation, truncate to
/// 48 visible characters with an ellipsis marker.
pub fn finalize_title(raw: &str) -> String {
    let trimmed = raw.trim_matches(|c: char| c.is_whitespace() || EDGE_TRIM.contains(&c));
    let mut title = trimmed.split_whitespace().collect::<Vec<_>>().join(" ");

    while title.chars().last().is_some_and(|c| TRAILING_PUNCT.contains(&c)) {
        title.pop();
    }
    let mut title = title.trim_end().to_string();

    if title.chars().count() > MAX_TITLE_CHARS {
        title = title.chars().take(MAX_TITLE_CHARS).collect();
        title = title.trim_end().to_string();
        title.push('…');
    }

    if title.is_empty() {
        FALLBACK_TITLE.to_string()
    } else {
        title
    }
}

#[derive(Deserialize)]
struct TitlePayload {
    title: Option<String>,
}

/// Generates short conversation labels from the first user message.
pub struct SmartTitler {
    llm: Arc<GeminiClient>,
}

impl SmartTitler {
    pub fn new(llm: Arc<GeminiClient>) -> Self {
        Self { llm }
    }

    /// Produce a title for `text`. Upstream failures fall back to a cleaned
    /// slice of the user's own text; only a missing API key is an error.
    pub async fn title_for(
        &self,
        text: &str,
        assistant: AssistantType,
    ) -> Result<String, GeminiError> {
        if !self.llm.has_api_key() {
            return Err(GeminiError::MissingApiKey);
        }

        let system_rules = format!(
            "Bạn là công cụ đặt tiêu đề tiếng Việt cho cuộc trò chuyện.\n\
             Yêu cầu:\n\
             - 3–8 từ, ngắn gọn, đúng ngữ cảnh.\n\
             - Không dấu câu ở cuối, không ngoặc kép.\n\
             - Viết hoa hợp lý (tên riêng/ngành viết hoa chữ cái đầu).\n\
             - Bám sát loại trợ lý: \"{}\".\n\
             Chỉ trả về JSON: {{\"title\":\"Tiêu đề\"}}.",
            assistant.as_str()
        );
        let user_prompt = format!(
            "Câu đầu tiên của người dùng:\n\"\"\"{text}\"\"\"\nHãy sinh \"title\" theo yêu cầu."
        );

        match self.llm.generate_title_json(&system_rules, &user_prompt).await {
            Ok(content) => {
                // JSON mode first; plain text when the model ignored it.
                let title = serde_json::from_str::<TitlePayload>(&content)
                    .ok()
                    .and_then(|p| p.title)
                    .unwrap_or(content);
                Ok(finalize_title(&title))
            }
            Err(e) => {
                tracing::warn!("Smart title generation failed, using fallback: {}", e);
                Ok(finalize_title(text))
            }
        }
    }
}
