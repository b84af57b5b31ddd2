//! `mirord`: the standalone daemon binary that serves a vault over the
//! replication protocol (spec.md §6, "mirord --vault <path> --listen
//! <addr>..."). Accepts connections in the server role via
//! [`n1_node::Daemon`] and runs until SIGINT/SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use n1_node::config::VaultConfig;
use n1_node::{daemon, Daemon, Vault};
use n1_wal::TransferLog;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "mirord")]
#[command(author = "n1 contributors")]
#[command(version)]
#[command(about = "Serve a vault over the n1 replication protocol")]
struct Args {
    /// Path to an existing vault file
    #[arg(long)]
    vault: PathBuf,

    /// Address to listen on; may be repeated. Defaults to 0.0.0.0:7001
    #[arg(long = "listen")]
    listen: Vec<String>,

    /// Override the WAL database path
    #[arg(long)]
    wal_path: Option<PathBuf>,

    /// Optional TOML config file layered under these flags
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable verbose debug logging (RUST_LOG overrides this)
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true).with_file(false))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = match &args.config {
        Some(toml_path) => VaultConfig::load(toml_path, args.vault.clone())?,
        None => VaultConfig::for_vault_path(args.vault.clone()),
    };
    if let Some(wal_path) = args.wal_path {
        config.vault.wal_path = Some(wal_path);
    }
    if !args.listen.is_empty() {
        config.daemon.listen = args.listen;
    }

    // `open` asserts the master key is reachable before the daemon starts
    // accepting connections, matching the CLI's fail-closed behavior.
    let vault = Vault::open(&config).await?;
    let store = vault.object_store();
    let wal = Arc::new(TransferLog::open(config.wal_path())?);

    let daemon = Daemon::new(store, wal, config.daemon.clone());
    let shutdown = daemon.shutdown_handle();

    let run = daemon.run();
    tokio::pin!(run);

    tokio::select! {
        result = &mut run => {
            result?;
        }
        _ = daemon::wait_for_shutdown_signal() => {
            tracing::info!("shutdown signal received, closing listeners");
            shutdown.shutdown();
            run.await?;
        }
    }

    tracing::info!(vault = %vault.path().display(), "mirord stopped");
    Ok(())
}
