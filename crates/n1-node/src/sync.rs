//! The `sync` operation: dial a peer, run one (or, with `--follow`, many)
//! replication rounds against it as the [`n1_replicator::Role::Client`]
//! side (spec.md §6's `sync <path> <peer> [--push] [--follow] [--timeout
//! N]`).

use std::sync::Arc;

use n1_replicator::{Session, SessionSummary, SyncMode};
use n1_store::ObjectStore;
use n1_transport::CancelScope;
use n1_wal::TransferLog;
use tokio::net::TcpStream;

use crate::config::SyncSettings;
use crate::error::Result;

/// Dial `peer_addr` and run one client-side sync round (or, if
/// `settings.follow` is set, loop rounds until cancelled or the connection
/// drops). Returns the last round's summary.
pub async fn sync_once(
    peer_addr: &str,
    settings: &SyncSettings,
    store: Arc<ObjectStore>,
    wal: Arc<TransferLog>,
) -> Result<SessionSummary> {
    let stream = TcpStream::connect(peer_addr).await?;
    let mode = if settings.push { SyncMode::Push } else { SyncMode::Pull };
    let cancel = match settings.timeout() {
        Some(timeout) => CancelScope::with_timeout(timeout),
        None => CancelScope::new(),
    };

    let mut session = Session::new(n1_replicator::Role::Client, stream, store, wal, cancel.clone());

    if settings.follow {
        session.follow_client(mode, settings.follow_interval()).await?;
        Ok(SessionSummary::default())
    } else {
        Ok(session.run_client(mode).await?)
    }
}
