// Relay server entry point.
//
// Startup sequence:
// 1. Load config (creating it from defaults on first run)
// 2. Initialize tracing
// 3. Serve the shared store until Ctrl+C

use skypoint_core::config;
use skypoint_core::sync::MemoryStore;
use skypoint_relay::ws_server;

use anyhow::Context;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = config::load_config().context("failed to load configuration")?;

    // 2. Initialize tracing
    init_tracing(&config.logging.filter)?;
    info!("SkyPoint relay starting up");

    // 3. Serve until interrupted
    let addr = config.relay.bind_addr();
    let store = MemoryStore::new();
    let mut server = tokio::spawn(async move {
        if let Err(e) = ws_server::run(&addr, store).await {
            error!("Relay server error: {:#}", e);
        }
    });

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for Ctrl+C")?;
            info!("Shutdown requested");
        }
        _ = &mut server => {
            error!("Relay server stopped unexpectedly");
        }
    }

    server.abort();
    info!("SkyPoint relay shut down cleanly");
    Ok(())
}

/// Initialize tracing to stderr. `RUST_LOG` overrides the configured filter.
fn init_tracing(default_filter: &str) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
