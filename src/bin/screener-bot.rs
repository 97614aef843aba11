//! Indicator Screener Bot
//!
//! Serves the Telegram webhook, runs one screener per subscriber that has
//! started one, and stops them all on ctrl-c.

use dotenvy::dotenv;
use screener_bot::config::Config;
use screener_bot::core::http::{start_server, AppState};
use screener_bot::core::runtime::ScreenerRuntime;
use screener_bot::logging;
use screener_bot::metrics::Metrics;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};

const COMMAND_QUEUE: usize = 256;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Load environment variables from .env if present
    dotenv().ok();

    logging::init_logging();

    let config = Config::from_env()?;
    info!("Starting Indicator Screener Bot");
    info!(environment = %config.environment, "Environment");
    info!(
        interval = %config.default_interval,
        cycle_secs = config.screener.cycle_period.as_secs(),
        ttl_secs = config.cache.ttl.as_secs(),
        "Screener defaults"
    );

    let metrics = Arc::new(Metrics::new()?);
    let runtime = ScreenerRuntime::from_config(&config, Arc::clone(&metrics))?;

    let (commands, command_loop) = runtime.spawn_command_loop(COMMAND_QUEUE);
    let janitor = runtime.spawn_cache_janitor(config.cache.ttl.max(Duration::from_secs(1)));

    let state = AppState::new(metrics, commands);
    let port = config.port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(port, state).await {
            error!(error = %e, "HTTP server error");
        }
    });

    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Shutting down...");
        }
        _ = server_handle => {
            error!("HTTP server stopped");
        }
    }

    runtime.shutdown().await;
    janitor.abort();
    command_loop.abort();
    info!("Screener bot stopped");

    Ok(())
}
