//! any-exporter HTTP server
//!
//! Starts an Axum web server exposing the recipe and metrics endpoints.

use any_exporter::{
    cli::{self, Cli, Command},
    handlers::{self, AppState},
    telemetry,
};
use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Command::Config { output }) = &cli.command {
        let template = cli::generate_config_template();
        match output {
            Some(path) => std::fs::write(path, template)?,
            None => print!("{template}"),
        }
        return Ok(());
    }

    let config = cli.load_config()?;

    telemetry::init(&config.observability.log_level);

    let addr = config.listen_addr()?;
    let app = handlers::router(AppState::new(Arc::new(config)));

    tracing::info!("Starting any-exporter on {}", addr);
    tracing::info!("Recipes accepted at http://{}/recipe", addr);
    tracing::info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
