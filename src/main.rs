//! API gateway binary.
//!
//! ```text
//!     Client ──▶ http::GatewayServer ──▶ proxy::Proxy ──▶ routing::Router
//!                       │                     │
//!                       │ GET /stats          ├──▶ scheduler::Scheduler ◀── discovery
//!                       ▼                     │        (refresh loop)      (static, docker)
//!               observability::Stats ◀────────┤
//!                                             └──▶ proxy::ConnectionPool ──▶ Backend
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use api_gateway::config::{config_warnings, load_config};
use api_gateway::discovery;
use api_gateway::http::GatewayServer;
use api_gateway::lifecycle::{shutdown_signal, Shutdown};
use api_gateway::observability::{init_logging, metrics};

#[derive(Parser)]
#[command(name = "api-gateway")]
#[command(version, about = "HTTP API gateway with container service discovery", long_about = None)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "GATEWAY_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Container engine API socket, overrides discovery.socket_path
    #[arg(long, env = "GATEWAY_DOCKER_SOCKET")]
    docker_socket: Option<String>,

    /// Listen port, overrides the port of listener.bind_address
    #[arg(short, long, env = "GATEWAY_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Configuration errors are fatal; nothing is started before this point.
    let mut config = load_config(&cli.config)?;
    if let Some(port) = cli.port {
        config.listener.set_port(port);
    }
    if let Some(socket) = cli.docker_socket {
        config.discovery.socket_path = socket;
    }

    init_logging(&config.observability.log_level)?;

    tracing::info!(
        config = %cli.config.display(),
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        backends = config.backends.len(),
        socket = %config.discovery.socket_path,
        "Configuration loaded"
    );
    for warning in config_warnings(&config) {
        tracing::warn!(warning = %warning, "Route references a backend with no discovery configuration");
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = GatewayServer::new(config.clone(), discovery::from_config(&config));
    let mut serve = tokio::spawn(server.run(listener, shutdown.subscribe()));

    tokio::select! {
        _ = shutdown_signal() => {
            shutdown.trigger();
            (&mut serve).await??;
        }
        result = &mut serve => result??,
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
