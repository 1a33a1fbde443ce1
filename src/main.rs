use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use colloquy::config::ServerConfig;
use colloquy::routes::app_router;
use colloquy::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "colloquy=info,tower_http=info".into()),
        )
        .init();

    // A CONFIG_PATH file takes lowest precedence; env vars override it.
    let config = match std::env::var("CONFIG_PATH") {
        Ok(path) => ServerConfig::from_file(&PathBuf::from(path))
            .map_err(|error| anyhow::anyhow!("{error}"))?,
        Err(_) => ServerConfig::from_env().map_err(|error| anyhow::anyhow!("{error}"))?,
    };
    let address = config.address();

    let state = AppState::new(config);

    // Background silence sweep across all live sessions.
    tokio::spawn(
        Arc::clone(&state.engine).run_heartbeat(Arc::clone(&state.registry)),
    );

    let app = app_router(state);

    info!("Listening on {address}");
    let listener = tokio::net::TcpListener::bind(&address).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
