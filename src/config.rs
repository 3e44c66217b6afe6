//! Service configuration loaded from environment variables
//!
//! All secrets (the shared API token, the Visual Crossing key, and the
//! OpenRouter key) come from the environment; a `.env` file is loaded at
//! startup for local development.

use std::env;

/// ---------------------------------------------------------------------------
/// Environment Variable Names
/// ---------------------------------------------------------------------------

const ENV_API_TOKEN: &str = "SPORTCAST_API_TOKEN";
const ENV_WEATHER_API_KEY: &str = "WEATHER_API_KEY";
const ENV_OPENROUTER_API_KEY: &str = "OPENROUTER_API_KEY";
const ENV_BIND_ADDR: &str = "SPORTCAST_BIND_ADDR";

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("Missing configuration: {0}")]
  MissingConfig(String),
}

/// ---------------------------------------------------------------------------
/// Application Configuration
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AppConfig {
  /// Shared secret clients must send in the request body
  pub api_token: String,
  /// Visual Crossing API key
  pub weather_api_key: String,
  /// OpenRouter API key (bearer token)
  pub openrouter_api_key: String,
  /// Address the HTTP server binds to
  pub bind_addr: String,
}

impl AppConfig {
  pub fn from_env() -> Result<Self, ConfigError> {
    Ok(Self {
      api_token: env::var(ENV_API_TOKEN)
        .map_err(|_| ConfigError::MissingConfig(ENV_API_TOKEN.into()))?,
      weather_api_key: env::var(ENV_WEATHER_API_KEY)
        .map_err(|_| ConfigError::MissingConfig(ENV_WEATHER_API_KEY.into()))?,
      openrouter_api_key: env::var(ENV_OPENROUTER_API_KEY)
        .map_err(|_| ConfigError::MissingConfig(ENV_OPENROUTER_API_KEY.into()))?,
      bind_addr: env::var(ENV_BIND_ADDR).unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
    })
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
