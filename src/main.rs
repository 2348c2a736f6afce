use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hce_advisor::{
    api::{routes, RateLimiter},
    auth::{SessionProvider, StaticTokenSessions},
    config::Config,
    services::{gemini::GeminiClient, smart_title::SmartTitler},
    storage::{self, repository::SeaOrmChatRepository},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hce_advisor=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load()?;

    let db_conn = storage::init_db(&config.database_url).await?;
    let repository = Arc::new(SeaOrmChatRepository::new(db_conn));

    let llm = Arc::new(GeminiClient::new(
        config.gemini_base_url.clone(),
        config.google_api_key.clone(),
        config.gemini_model.clone(),
        config.effective_title_model().to_string(),
    ));
    if !llm.has_api_key() {
        tracing::warn!("GOOGLE_API_KEY is not set; AI relay endpoints will return errors");
    }
    let titler = Arc::new(SmartTitler::new(llm.clone()));

    let sessions: Arc<dyn SessionProvider> =
        Arc::new(StaticTokenSessions::from_entries(&config.session_tokens));
    let ai_limiter = RateLimiter::new(config.effective_ai_rate_limit());

    let state = routes::AppState {
        repo: repository,
        llm,
        titler,
        sessions,
        ai_limiter,
    };
    let app = routes::create_router(state);

    let addr: SocketAddr = format!("127.0.0.1:{}", config.server_port).parse()?;
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🚀 HCE Advisor listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
