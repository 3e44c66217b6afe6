pub mod config;
pub mod llm;
pub mod server;
pub mod weather;

pub use config::AppConfig;
pub use server::{router, AppState};
