//! padsync server binary.
//!
//! Serves the collaborative editor backend until Ctrl-C or `POST /api/exit`.

use clap::Parser;
use padsync_crypto::KdfParams;
use padsync_server::{PadServer, ServerConfig};
use std::net::{IpAddr, SocketAddr};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Collaborative plain-text editor backend.
#[derive(Parser)]
#[command(name = "padsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address to bind to
    #[arg(long, env = "PADSYNC_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    port: u16,

    /// PBKDF2 iterations for secure save
    #[arg(long, env = "PADSYNC_KDF_ITERATIONS")]
    kdf_iterations: Option<u32>,

    /// Largest accepted document frame, in bytes
    #[arg(long, env = "PADSYNC_MAX_FRAME_BYTES")]
    max_frame_bytes: Option<usize>,

    /// Largest accepted upload, in bytes
    #[arg(long, env = "PADSYNC_MAX_UPLOAD_BYTES")]
    max_upload_bytes: Option<usize>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "PADSYNC_JSON_LOGS")]
    json_logs: bool,
}

impl Cli {
    fn config(&self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        let mut config = ServerConfig::new(SocketAddr::new(self.host, self.port));
        if let Some(iterations) = self.kdf_iterations {
            config = config.with_kdf(KdfParams::new(iterations)?);
        }
        if let Some(max) = self.max_frame_bytes {
            config = config.with_max_frame_bytes(max);
        }
        if let Some(max) = self.max_upload_bytes {
            config = config.with_max_upload_bytes(max);
        }
        Ok(config)
    }
}

fn init_logging(verbose: bool, json: bool) {
    // RUST_LOG wins over --verbose.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.json_logs);

    let config = cli.config()?;
    info!(
        addr = %config.bind_addr,
        kdf_iterations = config.kdf.iterations(),
        "starting padsync v{}",
        env!("CARGO_PKG_VERSION")
    );

    let server = PadServer::new(config);
    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown.trigger();
        }
    });

    server.bind_and_serve().await?;
    Ok(())
}
