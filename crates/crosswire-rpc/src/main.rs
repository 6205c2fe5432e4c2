//! Crosswire RPC Server - JSON-RPC and XML-RPC over HTTP.
//!
//! This binary serves a registered method tree over both wire protocols:
//! JSON-RPC (1.0/2.0, batches, notifications) on `/rpc` and XML-RPC on
//! `/RPC2`.

mod handler;
mod methods;
mod server;

use anyhow::Result;
use clap::Parser;
use crosswire::DispatchConfig;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "crosswire-rpc")]
#[command(about = "Dual-protocol RPC server (JSON-RPC + XML-RPC)")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Log handler failures at debug level instead of error level
    #[arg(long)]
    quiet_errors: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting Crosswire RPC Server");

    let config = DispatchConfig {
        verbose_errors: !args.quiet_errors,
    };

    // Start the server
    let addr = server::start_server(methods::demo_tree(), config, &args.host, args.port).await?;

    // Print port for a supervising process to read (intentional stdout)
    println!("RPC_PORT={}", addr.port());

    info!("RPC server running on {}", addr);

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    Ok(())
}
