//! driftkv server entry point.
//!
//! Parses the command line, builds the database registry, starts the expiry
//! sweeper and accepts client connections until Ctrl+C.

use anyhow::Context;
use driftkv::config::{CliAction, Config};
use driftkv::connection::{handle_connection, ConnectionStats};
use driftkv::storage::{Databases, ExpirySweeper};
use driftkv::Dispatcher;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn print_help() {
    println!(
        r#"
driftkv - A TTL-aware in-memory keyspace speaking the Redis protocol

USAGE:
    driftkv [OPTIONS]

OPTIONS:
    -h, --host <HOST>            Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>            Port to listen on (default: 6379)
        --databases <N>          Number of databases (default: 16)
        --sweep-interval <MS>    Initial expiry sweep interval (default: 100)
        --no-sweeper             Only expire keys when they are read
    -v, --version                Print version information
        --help                   Print this help message

ENVIRONMENT:
    RUST_LOG                     Log filter (default: info)

CONNECTING:
    $ redis-cli -p 6379
    127.0.0.1:6379> SET session token EX 60
    OK
    127.0.0.1:6379> TTL session
    (integer) 60
"#
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match Config::from_args(std::env::args().skip(1)) {
        Ok(CliAction::Run(config)) => config,
        Ok(CliAction::Help) => {
            print_help();
            return Ok(());
        }
        Ok(CliAction::Version) => {
            println!("driftkv version {}", driftkv::VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let databases = Arc::new(Databases::new(config.databases));
    info!(databases = config.databases, "Database registry initialized");

    let _sweeper = match config.expiry_config() {
        Some(expiry) => Some(ExpirySweeper::start(Arc::clone(&databases), expiry)),
        None => {
            info!("Expiry sweeper disabled, keys expire lazily");
            None
        }
    };

    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    info!(address = %config.bind_address(), version = driftkv::VERSION, "Listening");

    let dispatcher = Dispatcher::new(Arc::clone(&databases));

    tokio::select! {
        _ = accept_loop(listener, dispatcher, Arc::clone(&stats)) => {}
        result = signal::ctrl_c() => {
            if let Err(e) = result {
                warn!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Shutdown signal received, stopping server...");
        }
    }

    info!(
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        commands = stats.commands_processed.load(Ordering::Relaxed),
        keys = databases.total_keys(),
        "Server shutdown complete"
    );
    Ok(())
}

/// Accepts connections forever, one task per client.
async fn accept_loop(listener: TcpListener, dispatcher: Dispatcher, stats: Arc<ConnectionStats>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let dispatcher = dispatcher.clone();
                let stats = Arc::clone(&stats);
                tokio::spawn(handle_connection(stream, addr, dispatcher, stats));
            }
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
            }
        }
    }
}
