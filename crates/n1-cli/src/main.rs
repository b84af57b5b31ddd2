//! n1 CLI: the `n1` front end over [`n1_node::Vault`] and the sync
//! operation in `n1_node::sync`. The `mirord` daemon binary lives
//! alongside this one in `src/bin/mirord.rs` (spec.md §6).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use n1_node::config::VaultConfig;
use n1_node::Vault;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "n1")]
#[command(author = "n1 contributors")]
#[command(version)]
#[command(about = "Encrypted, content-addressed key-value vault with peer-to-peer sync")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose debug logging (RUST_LOG overrides this)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new vault: generate a master key, persist it to the secret
    /// store, and create the vault file
    Init {
        /// Path to the vault file to create
        path: PathBuf,
    },

    /// Assert that a vault's file and master key are both accessible
    Open {
        /// Path to an existing vault file
        path: PathBuf,
    },

    /// Store a value under a key
    Put {
        /// Path to an existing vault file
        path: PathBuf,
        /// Application key
        key: String,
        /// Value to store
        value: String,
    },

    /// Fetch and decrypt the value stored under a key
    Get {
        /// Path to an existing vault file
        path: PathBuf,
        /// Application key
        key: String,
    },

    /// Key management operations
    Key {
        #[command(subcommand)]
        command: KeyCommands,
    },

    /// Reconcile this vault with a peer over the replication protocol
    Sync {
        /// Path to an existing vault file
        path: PathBuf,
        /// Peer address, e.g. `10.0.0.5:7001`
        peer: String,
        /// Push local objects to the peer instead of pulling from it
        #[arg(long)]
        push: bool,
        /// Keep syncing in a loop instead of a single round
        #[arg(long)]
        follow: bool,
        /// Per-operation timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Override the WAL database path
        #[arg(long)]
        wal_path: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum KeyCommands {
    /// Rotate the vault's master key: decrypt everything under the old
    /// key, re-encrypt under a fresh one, then swap the secret-store entry
    Rotate {
        /// Path to an existing vault file
        path: PathBuf,
        /// Only perform the decrypt pass; write nothing back
        #[arg(long)]
        dry_run: bool,
    },
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

fn config_for(path: &PathBuf, wal_path: Option<PathBuf>) -> VaultConfig {
    let mut config = VaultConfig::for_vault_path(path.clone());
    if let Some(wal_path) = wal_path {
        config.vault.wal_path = Some(wal_path);
    }
    config
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Init { path } => {
            let config = config_for(&path, None);
            Vault::init(&config).await?;
            println!("initialized vault at {}", path.display());
        }

        Commands::Open { path } => {
            let config = config_for(&path, None);
            let vault = Vault::open(&config).await?;
            println!("vault {} (uuid {}) is accessible", path.display(), vault.uuid());
        }

        Commands::Put { path, key, value } => {
            let config = config_for(&path, None);
            let vault = Vault::open(&config).await?;
            vault.put(&key, value.as_bytes()).await?;
        }

        Commands::Get { path, key } => {
            let config = config_for(&path, None);
            let vault = Vault::open(&config).await?;
            let value = vault.get(&key).await?;
            print!("{}", String::from_utf8_lossy(&value));
        }

        Commands::Key {
            command: KeyCommands::Rotate { path, dry_run },
        } => {
            let config = config_for(&path, None);
            let vault = Vault::open(&config).await?;
            vault.rotate_key(dry_run).await?;
            if dry_run {
                println!("dry run: every object decrypted cleanly under the current key");
            } else {
                println!("master key rotated");
            }
        }

        Commands::Sync {
            path,
            peer,
            push,
            follow,
            timeout,
            wal_path,
        } => {
            let config = config_for(&path, wal_path);
            let vault = Vault::open(&config).await?;
            let wal = std::sync::Arc::new(n1_wal::TransferLog::open(config.wal_path())?);

            let mut settings = config.sync.clone();
            settings.push = push;
            settings.follow = follow;
            if let Some(timeout) = timeout {
                settings.timeout_secs = Some(timeout);
            }

            let store = vault.object_store();
            let summary = n1_node::sync::sync_once(&peer, &settings, store, wal).await?;
            println!(
                "sync complete: {} objects, {} bytes",
                summary.objects_transferred, summary.bytes_transferred
            );
        }
    }

    Ok(())
}
