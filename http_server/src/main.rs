//! Main entry point for the file-lite server binary

use anyhow::Result;
use filelite_core::{
    access_urls, config::settings::default_data_dir, create_app, run_server, AppConfig, AppState,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let data_dir = default_data_dir();
    if AppConfig::write_default_if_missing(&data_dir)
        .map_err(|e| anyhow::anyhow!("Failed to write default configuration: {}", e))?
    {
        info!(path = %data_dir.display(), "wrote default configuration");
    }

    let config = AppConfig::load_from(&data_dir)
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    info!("Configuration loaded from {}", data_dir.display());
    info!("Server will bind to: {}", config.bind_address());

    let token = config.auth.resolve_token();
    let state = AppState::from_config(config.clone(), token.clone())
        .map_err(|e| anyhow::anyhow!("Failed to initialise application state: {}", e))?;

    match state.sandbox().root() {
        Some(root) => info!("Sandbox root: {}", root),
        None => warn!("No sandbox root configured, the whole filesystem is reachable"),
    }
    info!("Uploads directory: {}", state.upload_dir.display());
    info!("App: {} v{}", state.app_name, state.version);

    let auth_token = state.auth.is_enabled().then_some(token.as_str());
    if let Some(token) = auth_token {
        info!("Access token: {}", token);
    }
    for url in access_urls(&config, auth_token) {
        info!("Open {}", url);
    }

    let app = create_app(state);

    run_server(app, &config).await?;

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let default_level = if cfg!(debug_assertions) {
            "debug"
        } else {
            "info"
        };

        format!(
            "filelite_core={level},filelite={level},tower_http=info",
            level = default_level
        )
        .into()
    });

    let fmt_layer = fmt::layer().with_target(true).with_line_number(true);

    let is_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    if is_json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.pretty())
            .init();
    }
}
