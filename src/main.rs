mod app;
mod cart;
mod catalog;
mod config;
mod dto;
mod error;
mod locks;
mod orders;
mod state;

use crate::config::AppConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "grocery=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?;
    let server = config.server.clone();
    let app_state = AppState::init(config).await?;

    if app_state.config.seed_sample_data {
        catalog::seed::seed_if_empty(app_state.catalog.as_ref()).await?;
    }

    let app = app::build_app(app_state);
    app::serve(app, &server).await
}
