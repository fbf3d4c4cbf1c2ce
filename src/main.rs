//! `conntrack`: tracked echo listeners plus a debug endpoint.
//!
//! ```text
//!     clients ──▶ TrackedListener(s) ──▶ echo handlers
//!                     │
//!                     ├─▶ metrics (accepted/closed/open per name)
//!                     └─▶ live events (net.ServerConn.<name>)
//!                                  │
//!     operator ──▶ debug endpoint: /metrics, /debug/events
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use conntrack::config::{load_config, ConntrackConfig, ListenerConfig};
use conntrack::debug::{self, DebugState};
use conntrack::echo::serve_echo;
use conntrack::lifecycle::{shutdown_signal, Shutdown};
use conntrack::net::TrackedListener;
use conntrack::observability::logging;
use conntrack::observability::metrics::install_prometheus;

#[derive(Parser)]
#[command(name = "conntrack")]
#[command(about = "Tracked echo listeners with metrics and live connection events", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ConntrackConfig::default(),
    };
    if config.listeners.is_empty() {
        config.listeners.push(ListenerConfig::default());
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "conntrack starting");

    // The recorder must exist before any listener is wrapped.
    let prometheus = if config.observability.metrics_enabled {
        match install_prometheus() {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!(error = %e, "Continuing without metrics");
                None
            }
        }
    } else {
        None
    };

    let shutdown = Shutdown::new();
    let mut tasks = Vec::new();

    for listener_config in &config.listeners {
        let raw = TcpListener::bind(&listener_config.bind_address).await?;
        let listener = TrackedListener::new(raw, listener_config.track_options());
        tracing::info!(
            listener_name = %listener_config.name,
            address = %listener.local_addr()?,
            tracing = listener_config.tracing,
            "Listening for connections"
        );
        tasks.push(tokio::spawn(serve_echo(listener, shutdown.subscribe())));
    }

    let debug_listener = TcpListener::bind(&config.observability.debug_address).await?;
    tracing::info!(address = %debug_listener.local_addr()?, "Debug endpoint listening");
    let app = debug::router(DebugState::new(prometheus));
    let mut debug_shutdown = shutdown.subscribe();
    tasks.push(tokio::spawn(async move {
        let served = axum::serve(debug_listener, app)
            .with_graceful_shutdown(async move {
                let _ = debug_shutdown.recv().await;
            })
            .await;
        if let Err(e) = served {
            tracing::error!(error = %e, "Debug endpoint failed");
        }
    }));

    shutdown_signal().await;
    shutdown.trigger();

    for task in tasks {
        if let Err(e) = task.await {
            tracing::error!(error = %e, "Task panicked");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
