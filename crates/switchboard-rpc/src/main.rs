//! Switchboard RPC Server - serves the demo handlers over HTTP or TCP.

use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::sync::Arc;
use switchboard_core::Dispatcher;
use switchboard_rpc::{http, services, ServerConfig, TcpServer};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Transport {
    Http,
    Tcp,
}

#[derive(Parser, Debug)]
#[command(name = "switchboard-rpc")]
#[command(about = "JSON-RPC server for the switchboard demo handlers")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = ServerConfig::DEFAULT_HOST)]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Transport to serve
    #[arg(short, long, value_enum, default_value = "http")]
    transport: Transport,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    info!("Starting Switchboard RPC Server");

    let dispatcher = Arc::new(Dispatcher::new(services::demo_registry()?));

    // The TCP handle must stay alive until shutdown.
    let (addr, _tcp_handle) = match args.transport {
        Transport::Http => (
            http::start_server(dispatcher, &args.host, args.port).await?,
            None,
        ),
        Transport::Tcp => {
            let handle = TcpServer::start(dispatcher, &args.host, args.port).await?;
            (handle.addr(), Some(handle))
        }
    };

    // Machine-readable port line for parent processes
    println!("RPC_PORT={}", addr.port());

    info!("RPC server running on {} ({:?})", addr, args.transport);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    Ok(())
}
