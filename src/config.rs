use serde::Deserialize;
use validator::Validate;

/// Main configuration for the HCE Advisor service
#[derive(Debug, Deserialize, Validate, Clone)]
pub struct Config {
    /// HTTP server port
    #[validate(range(min = 1024, max = 65535))]
    pub server_port: u16,

    /// Database URL (SeaORM / SQLite)
    pub database_url: String,

    /// Upstream Generative Language API key. Its absence is not a startup
    /// failure; it surfaces as a 500 on first use of the relay endpoints.
    pub google_api_key: Option<String>,

    /// Base URL of the Generative Language API
    pub gemini_base_url: String,

    /// Model used for chat replies
    pub gemini_model: String,

    /// Optional model override for the title-generation call
    pub gemini_title_model: Option<String>,

    /// Log level (e.g., info, debug, trace)
    pub log_level: String,

    /// Per-IP requests per minute allowed on the LLM relay endpoints.
    /// If `None`, defaults to 60.
    #[validate(range(min = 1, max = 10000))]
    pub ai_rate_limit_per_minute: Option<u32>,

    /// Static session tokens, `token:user_id[:email]` each
    #[serde(default)]
    pub session_tokens: Vec<String>,
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            // Core defaults
            .set_default("server_port", 8080)?
            .set_default("database_url", "sqlite://hce_advisor.db")?
            .set_default("gemini_base_url", "https://generativelanguage.googleapis.com")?
            .set_default("gemini_model", "gemini-2.5-pro")?
            .set_default("log_level", "info")?
            .set_default("ai_rate_limit_per_minute", 60u32)?
            // Load from ~/.hce-advisor/config.toml (if present)
            .add_source(
                config::File::with_name(&format!(
                    "{}/.hce-advisor/config",
                    std::env::var("HOME").unwrap_or_else(|_| ".".to_string())
                ))
                .required(false),
            )
            // Environment overrides: HCE__SERVER_PORT, HCE__GOOGLE_API_KEY, etc.
            .add_source(config::Environment::with_prefix("HCE").separator("__"))
            .build()?;

        let mut cfg: Config = settings.try_deserialize()?;

        // The hosted deployment configures the provider through these names.
        if cfg.google_api_key.is_none() {
            cfg.google_api_key = std::env::var("GOOGLE_API_KEY").ok();
        }
        if cfg.gemini_title_model.is_none() {
            cfg.gemini_title_model = std::env::var("GEMINI_TITLE_MODEL").ok();
        }

        cfg.validate()
            .map_err(|e| config::ConfigError::Message(e.to_string()))?;
        Ok(cfg)
    }

    /// Model used for smart titles: the dedicated override if configured,
    /// otherwise the chat model.
    pub fn effective_title_model(&self) -> &str {
        self.gemini_title_model
            .as_deref()
            .unwrap_or(&self.gemini_model)
    }

    /// Effective relay rate limit (requests per minute per IP).
    pub fn effective_ai_rate_limit(&self) -> u32 {
        self.ai_rate_limit_per_minute.unwrap_or(60)
    }
}
