use std::net::IpAddr;
use std::process::ExitCode;

use clap::Parser;
use hamms::{DEFAULT_BASE_PORT, HammsConfig, RetryStore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// A deliberately broken server for testing http clients.
///
/// Behaviors listen on consecutive ports starting at `port + 1`.
#[derive(Debug, Parser)]
#[command(name = "hamms", version, about)]
struct Cli {
    /// Base port, behaviors listen on port + 1 to port + 16
    #[arg(short, long, env = "HAMMS_PORT", default_value_t = DEFAULT_BASE_PORT)]
    port: u16,

    /// Address to listen on
    #[arg(long, env = "HAMMS_HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Seed for the random drops, for reproducible runs
    #[arg(long, env = "HAMMS_SEED")]
    seed: Option<u64>,

    /// Log filter, overrides RUST_LOG (e.g. `debug` or `hamms::access=warn`)
    #[arg(long)]
    log_level: Option<String>,
}

fn init_tracing(log_level: Option<&str>) {
    let filter = match log_level {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let config = HammsConfig::builder().host(cli.host).base_port(cli.port).seed(cli.seed).build();

    let shutdown = CancellationToken::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("received ctrl-c, shutting down"),
            Err(e) => warn!(cause = %e, "can't listen for ctrl-c, shutting down"),
        }
        ctrl_c.cancel();
    });

    match hamms::serve(config, RetryStore::new(), shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(cause = %e, "hamms failed to start");
            ExitCode::FAILURE
        }
    }
}
