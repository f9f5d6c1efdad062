//! civiq-api: REST API server for the civiq platform
//!
//! Serves issue intake and triage over HTTP. On startup the server
//! records its pid and bound port for the CLI's service commands and
//! removes them again on graceful shutdown.

mod error;
mod routes;
mod upload;

use civiq_core::config::API_KEY_ENV;
use civiq_core::{Config, Engine, OpenAiClassifier, ServiceManager};
use clap::Parser;
use routes::AppState;
use std::path::PathBuf;
use std::sync::Arc;
use upload::DiskMedia;

#[derive(Parser)]
#[command(name = "civiq-api", version, about = "REST API server for civiq")]
struct Args {
    /// Path to the config file
    #[arg(long)]
    config: Option<PathBuf>,
}

fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn build_engine(config: &Config) -> anyhow::Result<Engine> {
    let store = civiq_core::open_store(&config.storage)?;
    let mut engine = Engine::new(store);

    if !config.classifier.enabled {
        tracing::info!("AI categorization disabled by config");
        return Ok(engine);
    }
    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.is_empty() => {
            let classifier = OpenAiClassifier::new(key, &config.classifier)?;
            engine = engine.with_classifier(Arc::new(classifier));
            tracing::info!(model = %config.classifier.model, "AI categorization enabled");
        }
        _ => {
            tracing::warn!("{API_KEY_ENV} not set, new issues will keep empty AI fields");
        }
    }
    Ok(engine)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();

    let config = Config::discover(args.config.as_deref())?;
    let engine = build_engine(&config)?;
    let media = DiskMedia::new(&config.media)?;

    let state = AppState {
        engine,
        media: Arc::new(media),
    };
    let app = routes::router(state, &config.media);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local = listener.local_addr()?;

    let manager = ServiceManager::new()?;
    manager.write_pid(std::process::id())?;
    manager.write_port(local.port())?;

    tracing::info!("civiq-api listening on {local}");
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    manager.cleanup();
    served?;
    Ok(())
}
