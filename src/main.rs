use sportcast::{router, AppConfig, AppState};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  // Load environment variables from .env file
  dotenvy::dotenv().ok();

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sportcast=info")),
    )
    .init();

  let config = AppConfig::from_env()?;
  let bind_addr = config.bind_addr.clone();
  let state = Arc::new(AppState::new(config));

  let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
  tracing::info!("listening on {}", bind_addr);
  axum::serve(listener, router(state)).await?;

  Ok(())
}
