//! History HTTP server binary

use actix_web::{middleware, web, App, HttpServer};
use history_core::{db, Config};
use history_server::{handlers, watcher, AppState, Metrics};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_target(false)
        .json()
        .init();

    info!("Starting history server...");

    // Load configuration
    let config = match std::env::args().nth(1) {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    info!("Configuration loaded successfully");

    let pool = db::connect(&config.database).await?;

    let (ledger_closed, _watcher) = watcher::spawn(
        history_core::HistoryQ::new(pool.clone()),
        Duration::from_millis(config.stream.poll_interval_ms),
    );

    let metrics = Metrics::new()?;
    let server_config = config.server.clone();
    let state = web::Data::new(AppState::new(pool, config, metrics, ledger_closed));

    info!(
        "Starting HTTP server on {}:{}",
        server_config.host, server_config.port
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(handlers::configure_routes)
    })
    .workers(server_config.workers)
    .bind((server_config.host, server_config.port))?
    .run()
    .await?;

    info!("History server stopped");
    Ok(())
}
