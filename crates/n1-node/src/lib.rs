//! # n1 Node
//!
//! Vault lifecycle, daemon listener, and configuration assembly atop the
//! leaf crates (`n1-seal`, `n1-store`, `n1-wal`, `n1-transport`,
//! `n1-replicator`, `n1-secrets`). This is the layer `n1-cli` drives: the
//! CLI surface spec.md §6 describes (`init`, `open`, `put`, `get`, `key
//! rotate`, `sync`, and the `mirord` daemon) is a thin wrapper over
//! [`vault::Vault`] and [`daemon::Daemon`].

pub mod config;
pub mod daemon;
pub mod error;
pub mod sync;
pub mod vault;

pub use config::VaultConfig;
pub use daemon::{Daemon, DaemonShutdown};
pub use error::{NodeError, Result};
pub use vault::Vault;
