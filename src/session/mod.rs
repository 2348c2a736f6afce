pub mod active_store;
pub mod controller;
pub mod gateway;
pub mod typewriter;

// Re-export for convenience
pub use controller::{AuthState, BufferedMessage, ChatSession, ConversationKey, SessionError};
pub use gateway::{ChatGateway, GatewayError};
pub use typewriter::Typewriter;
