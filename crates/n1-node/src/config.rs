//! Configuration for vault, sync, and daemon operation.
//!
//! Mirrors the teacher's `NodeConfig` layering: a TOML file loaded via the
//! `config` crate, overridable by environment variables under the `N1_`
//! prefix, with CLI flags taking final precedence at the call site.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{NodeError, Result};

/// Default replication port, per spec.md §6
pub const DEFAULT_PORT: u16 = 7001;

/// Top-level configuration for a single vault's sync/daemon behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Vault settings
    pub vault: VaultSettings,
    /// Sync/replication settings
    pub sync: SyncSettings,
    /// Daemon listener settings
    pub daemon: DaemonSettings,
}

/// Settings describing where the vault and its WAL live on disk
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VaultSettings {
    /// Path to the vault's SQLite blob map
    pub path: PathBuf,
    /// Path to the transfer WAL database. Defaults to `<path>.wal` when
    /// absent, matching the teacher's convention of deriving sidecar paths
    /// from the primary data file.
    pub wal_path: Option<PathBuf>,
    /// Directory the file-backed secret store keeps master keys under
    pub secrets_dir: PathBuf,
}

/// Settings controlling a single `sync` invocation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Push local objects to the peer instead of pulling
    #[serde(default)]
    pub push: bool,
    /// Keep syncing in a loop instead of a single round
    #[serde(default)]
    pub follow: bool,
    /// Per-operation timeout, in seconds; `None` means no deadline
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Quiescent sleep between follow-mode rounds, in milliseconds
    #[serde(default = "default_follow_interval_ms")]
    pub follow_interval_ms: u64,
}

fn default_follow_interval_ms() -> u64 {
    1000
}

impl SyncSettings {
    /// The timeout as a `Duration`, if one is configured
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// The follow-mode poll interval as a `Duration`
    pub fn follow_interval(&self) -> Duration {
        Duration::from_millis(self.follow_interval_ms)
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            push: false,
            follow: false,
            timeout_secs: None,
            follow_interval_ms: default_follow_interval_ms(),
        }
    }
}

/// Settings for the `mirord` daemon listener
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DaemonSettings {
    /// Addresses to listen on, e.g. `["0.0.0.0:7001"]`
    pub listen: Vec<String>,
    /// Maximum age a transfer session may reach before `cleanup_expired`
    /// removes it, in seconds
    #[serde(default = "default_session_max_age_secs")]
    pub session_max_age_secs: i64,
}

fn default_session_max_age_secs() -> i64 {
    24 * 3600
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            listen: vec![format!("0.0.0.0:{DEFAULT_PORT}")],
            session_max_age_secs: default_session_max_age_secs(),
        }
    }
}

impl VaultConfig {
    /// A config rooted at `vault_path`, with every other setting defaulted
    pub fn for_vault_path(vault_path: impl Into<PathBuf>) -> Self {
        let vault_path = vault_path.into();
        let secrets_dir = vault_path
            .parent()
            .map(|p| p.join(".n1-secrets"))
            .unwrap_or_else(|| PathBuf::from(".n1-secrets"));
        Self {
            vault: VaultSettings {
                path: vault_path,
                wal_path: None,
                secrets_dir,
            },
            sync: SyncSettings::default(),
            daemon: DaemonSettings::default(),
        }
    }

    /// Load a config from a TOML file, falling back to `for_vault_path`
    /// defaults for any settings the file doesn't set. Environment
    /// variables prefixed `N1_` (e.g. `N1_DAEMON__LISTEN`) override the
    /// file, matching the teacher's `config::Environment` usage.
    pub fn load(toml_path: &std::path::Path, vault_path: impl Into<PathBuf>) -> Result<Self> {
        let vault_path = vault_path.into();
        let defaults = Self::for_vault_path(vault_path);
        if !toml_path.exists() {
            return Ok(defaults);
        }

        let builder = config::Config::builder()
            .add_source(config::Config::try_from(&defaults).map_err(|e| NodeError::Config(e.to_string()))?)
            .add_source(config::File::from(toml_path.to_path_buf()))
            .add_source(config::Environment::with_prefix("N1").separator("__"));

        let merged = builder.build().map_err(|e| NodeError::Config(e.to_string()))?;
        merged
            .try_deserialize()
            .map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Path the WAL lives at, applying the `<path>.wal` convention when the
    /// config doesn't set one explicitly
    pub fn wal_path(&self) -> PathBuf {
        self.vault
            .wal_path
            .clone()
            .unwrap_or_else(|| self.vault.path.with_extension("wal.sqlite3"))
    }
}
