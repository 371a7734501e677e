//! timekeep-server - Time tracking MCP server
//!
//! Serves the time tracking tools over stdio for AI assistant
//! integration.

use rmcp::{transport::stdio, ServiceExt};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod state;

pub mod mcp;

use mcp::TimekeepServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging. Stdout carries the MCP protocol, so logs go
    // to stderr.
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("timekeep_server=info".parse()?))
        .init();

    info!("timekeep-server v{}", env!("CARGO_PKG_VERSION"));

    let config = config::Config::load();
    info!(
        cleanup_interval_secs = config.cleanup_interval.as_secs(),
        "Config loaded"
    );

    let state = state::AppState::new(config);
    state.cleanup.start();

    let server = TimekeepServer::new(state.clone());
    let service = server.serve(stdio()).await?;
    info!("Server ready");

    service.waiting().await?;

    state.cleanup.stop();
    info!("Shutting down...");

    Ok(())
}
