use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum GeminiError {
    #[error("Google API Key is not configured.")]
    MissingApiKey,
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Gemini error: {status} {body}")]
    Upstream { status: u16, body: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Client for the Google Generative Language API.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    title_model: String,
}

impl GeminiClient {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        model: String,
        title_model: String,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            model,
            title_model,
        }
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn key(&self) -> Result<&str, GeminiError> {
        self.api_key.as_deref().ok_or(GeminiError::MissingApiKey)
    }

    /// Relay a chat prompt. The prompt frame mirrors what the web client has
    /// always sent: persona prompt, user question, answer cue.
    pub async fn generate(&self, prompt: &str, system_prompt: &str) -> Result<String, GeminiError> {
        let key = self.key()?;
        let full_prompt =
            format!("{system_prompt}\n\nNgười dùng hỏi: {prompt}\n\nCố vấn HUE trả lời:");

        let url = format!(
            "{}/v1/models/{}:generateContent?key={}",
            self.base_url, self.model, key
        );
        let request = GenerateRequest {
            contents: vec![Content {
                role: None,
                parts: vec![Part { text: full_prompt }],
            }],
            generation_config: None,
        };

        self.call(&url, &request).await
    }

    /// Title-model completion in JSON mode; the answer is expected to be a
    /// single `{"title": ...}` document.
    pub async fn generate_title_json(
        &self,
        system_rules: &str,
        user_prompt: &str,
    ) -> Result<String, GeminiError> {
        let key = self.key()?;
        let url = format!(
            "{}/v1/models/{}:generateContent?key={}",
            self.base_url, self.title_model, key
        );
        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: format!("{system_rules}\n\n{user_prompt}"),
                }],
            }],
            generation_config: Some(GenerationConfig {
                temperature: 0.2,
                max_output_tokens: 64,
                response_mime_type: "application/json".to_string(),
            }),
        };

        self.call(&url, &request).await
    }

    async fn call(&self, url: &str, request: &GenerateRequest) -> Result<String, GeminiError> {
        let response = self.client.post(url).json(request).send().await?;

        if !response.status().is_success() {
            return Err(GeminiError::Upstream {
                status: response.status().as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let data: GenerateResponse = response.json().await?;
        let text = data
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .unwrap_or_default();
        Ok(text)
    }
}

// Request/Response Models
#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Deserialize, Default)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}
