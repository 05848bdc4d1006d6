mod bootstrap;
mod health;
mod routes;
mod sweeper;

use std::time::Duration;

use anyhow::Result;
use amanah_core::config::{AppConfig, LoadOptions};
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    use amanah_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let server_config = &app.config.server;
    let address = format!("{}:{}", server_config.bind_address, server_config.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    let sweeper = sweeper::spawn(
        app.service.sessions().clone(),
        Duration::from_secs(app.config.conversation.session_sweep_interval_secs),
    );

    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let router = routes::router(app.service.clone());
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = stopped.await;
            })
            .await
    });

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        llm_provider = app.service.provider_name(),
        "amanah-server listening"
    );

    tokio::select! {
        finished = &mut server => {
            sweeper.abort();
            finished??;
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => signal?,
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "amanah-server stopping"
    );
    let _ = stop.send(());
    let grace = Duration::from_secs(server_config.graceful_shutdown_secs);
    match tokio::time::timeout(grace, &mut server).await {
        Ok(finished) => finished??,
        Err(_) => {
            tracing::warn!(
                event_name = "system.server.shutdown_timeout",
                correlation_id = "shutdown",
                grace_secs = grace.as_secs(),
                "in-flight requests did not finish before the grace period"
            );
            server.abort();
        }
    }
    sweeper.abort();
    Ok(())
}
