use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use flame_tower_server::constants::TICK_MS;
use flame_tower_server::error::ServerError;
use flame_tower_server::server::{self, ServerConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "Tower of the Forgotten Flame game server")]
struct Args {
    /// Interface to listen on
    #[arg(default_value = "0.0.0.0")]
    host: String,
    /// TCP port for game clients
    #[arg(default_value_t = 5000)]
    port: u16,
    /// Simulation tick interval in milliseconds
    #[arg(long, default_value_t = TICK_MS)]
    tick_ms: u64,
    /// Serve /healthz and /api/status on this port
    #[arg(long)]
    http_port: Option<u16>,
    /// Seed for the game RNG; random when omitted
    #[arg(long)]
    seed: Option<u32>,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }
}

/// Resolves `host` the way `bind` would, so names like `localhost` work.
async fn resolve(host: &str, port: u16) -> Result<SocketAddr, ServerError> {
    tokio::net::lookup_host((host, port))
        .await
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| ServerError::InvalidAddr(host.to_string()))
}

async fn config_from(args: Args) -> Result<ServerConfig, ServerError> {
    let addr = resolve(&args.host, args.port).await?;
    Ok(ServerConfig {
        addr,
        tick: Duration::from_millis(args.tick_ms.max(1)),
        http_port: args.http_port,
        seed: args.seed.unwrap_or_else(rand::random),
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    let config = match config_from(args).await {
        Ok(config) => config,
        Err(err) => {
            tracing::error!(error = %err, "invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    match server::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "server stopped");
            ExitCode::FAILURE
        }
    }
}
