//! GPS tracker protocol server binary.
//!
//! # Usage
//!
//! ```bash
//! gps-server --listen-port 5027 --control-port 3000
//! ```

use clap::Parser;
use gps_server::{Server, ServerConfig};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// GPS tracker protocol server
#[derive(Parser, Debug)]
#[command(name = "gps-server")]
#[command(about = "Concox V5 GPS tracker protocol server")]
#[command(version)]
struct Args {
    /// Device-facing TCP port
    #[arg(long, env = "LISTEN_PORT", default_value_t = 5027)]
    listen_port: u16,

    /// Operator control surface port (consumed by whichever transport the
    /// deployer wires on top of `gps_server::control::ControlSurface`)
    #[arg(long, env = "CONTROL_PORT", default_value_t = 3000)]
    control_port: u16,

    /// Directory for persisted logs, if the log sink is file-backed
    #[arg(long, env = "LOG_DIR")]
    log_dir: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("gps-server starting");
    if let Some(log_dir) = &args.log_dir {
        tracing::info!(log_dir, "file log sink directory configured (wiring is external)");
    }
    tracing::info!(control_port = args.control_port, "control surface port reserved for deployer transport");

    let config = ServerConfig { listen_address: ([0, 0, 0, 0], args.listen_port).into() };
    let server = Server::bind(config).await?;

    tracing::info!(address = %server.local_addr()?, "server listening");

    server.run().await?;

    Ok(())
}
