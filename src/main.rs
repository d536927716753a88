use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use dotenv::dotenv;
use tokio::fs;
use tracing_subscriber::EnvFilter;

use qr_art::config::Config;
use qr_art::render::BlendRenderer;
use qr_art::routes::{app, AppState};
use qr_art::scratch::sweep_scratch_dirs;

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to await for SIGINT: {}", err);
    }
}

async fn run(app: Router, config: &Config) -> anyhow::Result<()> {
    // runs the webserver
    let addr = config.addr();
    let server = axum::Server::try_bind(&addr)
        .with_context(|| format!("Failed to bind {}", addr))?
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal());

    tracing::info!("Listening on http://{}", addr);
    tracing::info!("Generator form at http://{}/ui", addr);
    server.await.context("Server error")?;

    let removed = sweep_scratch_dirs(&config.scratch_root).await;
    tracing::info!(removed, "Shut down, swept scratch directories");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    drop(dotenv());

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("qr_art=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    fs::create_dir_all(&config.scratch_root)
        .await
        .with_context(|| {
            format!(
                "Failed to create scratch root {}",
                config.scratch_root.display()
            )
        })?;

    let state = Arc::new(AppState::new(config.clone(), Arc::new(BlendRenderer)));
    run(app(state), &config).await
}
