use clap::Parser;
use log::{error, info};
use server::config::ServerConfig;
use server::logging;
use server::network::Server;
use std::net::ToSocketAddrs;
use std::path::PathBuf;
use std::time::Duration;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Simulation tick rate (updates per second)
    #[clap(short, long, default_value = "60")]
    tick_rate: u32,
    /// Milliseconds without a heartbeat before a client is dropped
    #[clap(long, default_value = "5000")]
    heartbeat_timeout_ms: u64,
    /// Reject frames whose declared payload length does not match
    #[clap(long)]
    strict_frames: bool,
    /// File the log is written to, recreated on every start
    #[clap(long, default_value = "server.log")]
    log_file: PathBuf,
    /// Log to stderr instead of the log file
    #[clap(long)]
    log_stderr: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let log_file = (!args.log_stderr).then_some(args.log_file.as_path());
    logging::init(log_file)?;

    let bind_addr = (args.host.as_str(), args.port)
        .to_socket_addrs()?
        .next()
        .ok_or("host did not resolve to an address")?;

    let config = ServerConfig {
        bind_addr,
        heartbeat_timeout: Duration::from_millis(args.heartbeat_timeout_ms),
        strict_frames: args.strict_frames,
        ..ServerConfig::default()
    }
    .with_tick_rate(args.tick_rate);

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("{}. exiting...", e);
            std::process::exit(1);
        }
    };

    let handle = server.start();

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down...");
    handle.shutdown().await;

    Ok(())
}
