//! The `mirord` daemon listener: accepts connections and spawns one
//! [`n1_replicator::Session`] per peer connection (spec.md §2, "Daemon
//! listener").

use std::sync::Arc;

use futures::FutureExt;
use n1_replicator::{Role, Session};
use n1_store::ObjectStore;
use n1_transport::CancelScope;
use n1_wal::TransferLog;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::config::DaemonSettings;
use crate::error::Result;

/// A running daemon: one accept loop per configured listen address,
/// spawning a session task per accepted connection. Sessions share the
/// vault's [`ObjectStore`] and [`TransferLog`] (each internally
/// synchronized, per §5) but otherwise run independently.
pub struct Daemon {
    store: Arc<ObjectStore>,
    wal: Arc<TransferLog>,
    settings: DaemonSettings,
    shutdown: watch::Sender<bool>,
}

impl Daemon {
    pub fn new(store: Arc<ObjectStore>, wal: Arc<TransferLog>, settings: DaemonSettings) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            store,
            wal,
            settings,
            shutdown,
        }
    }

    /// A handle that, when called, signals every accept loop and in-flight
    /// session to wind down
    pub fn shutdown_handle(&self) -> DaemonShutdown {
        DaemonShutdown {
            tx: self.shutdown.clone(),
        }
    }

    /// Bind every configured listen address and run accept loops until the
    /// shutdown handle fires. Each accepted connection gets its own task
    /// running `Session::run_server` to completion (one protocol round, not
    /// follow mode — follow mode is opt-in per-session on the dialing side,
    /// matching §4.5.1's description of the daemon as a passive responder).
    pub async fn run(&self) -> Result<()> {
        let mut tasks = Vec::new();
        for addr in &self.settings.listen {
            let listener = TcpListener::bind(addr).await?;
            tracing::info!(%addr, "mirord listening");
            tasks.push(self.accept_loop(listener));
        }
        futures::future::join_all(tasks).await;
        Ok(())
    }

    async fn accept_loop(&self, listener: TcpListener) {
        let mut shutdown_rx = self.shutdown.subscribe();
        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer_addr) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    let store = Arc::clone(&self.store);
                    let wal = Arc::clone(&self.wal);
                    let mut session_shutdown = self.shutdown.subscribe();
                    tokio::spawn(async move {
                        let cancel = CancelScope::new();
                        let cancel_watcher = cancel.clone();
                        tokio::spawn(async move {
                            let _ = session_shutdown.changed().await;
                            if *session_shutdown.borrow() {
                                cancel_watcher.cancel();
                            }
                        });

                        let mut session = Session::new(Role::Server, stream, store, wal, cancel);
                        tracing::debug!(session = %session.id(), %peer_addr, "accepted connection");
                        // Per-connection panics are caught so one bad
                        // session can't bring down the listener (§7: panics
                        // inside a connection handler are recovered and
                        // logged, terminating only that session).
                        let result = std::panic::AssertUnwindSafe(session.run_server())
                            .catch_unwind()
                            .await;
                        match result {
                            Ok(Ok(summary)) => tracing::info!(
                                session = %session.id(),
                                %peer_addr,
                                objects = summary.objects_transferred,
                                bytes = summary.bytes_transferred,
                                "session completed"
                            ),
                            Ok(Err(e)) => tracing::warn!(session = %session.id(), %peer_addr, error = %e, "session failed"),
                            Err(_) => tracing::error!(%peer_addr, "session handler panicked"),
                        }
                    });
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("daemon shutting down accept loop");
                        return;
                    }
                }
            }
        }
    }
}

/// A cloneable handle that signals a running [`Daemon`] to shut down
#[derive(Clone)]
pub struct DaemonShutdown {
    tx: watch::Sender<bool>,
}

impl DaemonShutdown {
    pub fn shutdown(&self) {
        let _ = self.tx.send(true);
    }
}

/// Block until SIGINT or SIGTERM is received, matching the teacher's
/// `RopeNode::wait_for_shutdown` (spec.md §6: "SIGINT/SIGTERM request
/// graceful shutdown").
pub async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use n1_store::SqliteBlobMap;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn settings(addr: &str) -> DaemonSettings {
        DaemonSettings {
            listen: vec![addr.to_string()],
            session_max_age_secs: 3600,
        }
    }

    #[tokio::test]
    async fn accepts_a_connection_and_completes_an_empty_offer_session() {
        let map = Arc::new(SqliteBlobMap::open_in_memory().unwrap());
        let store = Arc::new(ObjectStore::open(map).unwrap());
        let wal = Arc::new(TransferLog::open_in_memory().unwrap());
        let daemon = Daemon::new(store, wal, settings("127.0.0.1:0"));

        // Bind manually first so we can learn the ephemeral port, then feed
        // that listener into a one-shot accept loop.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accept_task = tokio::spawn({
            let daemon_store = Arc::clone(&daemon.store);
            let daemon_wal = Arc::clone(&daemon.wal);
            async move {
                let (stream, _) = listener.accept().await.unwrap();
                let cancel = CancelScope::new();
                let mut session = Session::new(Role::Server, stream, daemon_store, daemon_wal, cancel);
                session.run_server().await
            }
        });

        let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
        // Read the server's unconditional OFFER header (type=0x02) and
        // reply COMPLETE with a zero session id, per the empty-offer
        // end-to-end scenario (spec.md §8 scenario 6).
        let mut header = [0u8; 5];
        client.read_exact(&mut header).await.unwrap();
        assert_eq!(header[0], 0x02);
        let len = u32::from_be_bytes(header[1..5].try_into().unwrap());
        let mut body = vec![0u8; len as usize];
        client.read_exact(&mut body).await.unwrap();
        assert_eq!(&body, &0u32.to_be_bytes());

        let mut complete_frame = vec![0x06u8];
        complete_frame.extend_from_slice(&32u32.to_be_bytes());
        complete_frame.extend_from_slice(&[0u8; 32]);
        client.write_all(&complete_frame).await.unwrap();

        let summary = accept_task.await.unwrap().unwrap();
        assert_eq!(summary.objects_transferred, 0);
    }
}
