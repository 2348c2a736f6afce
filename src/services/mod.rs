pub mod gateway_client;
pub mod gemini;
pub mod smart_title;

// Re-export for convenience
pub use gateway_client::HttpChatGateway;
pub use gemini::GeminiClient;
pub use smart_title::SmartTitler;
