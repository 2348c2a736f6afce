pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod services;
pub mod session;
pub mod storage;

pub use config::Config;
pub use session::ChatSession;
