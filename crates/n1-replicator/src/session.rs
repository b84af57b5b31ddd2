//! The session state machine itself: one [`Session`] drives one connection,
//! either as the accepting [`Role::Server`] or the dialing [`Role::Client`].
//!
//! A single object is transferred as one or more DATA frames ("chunks") of
//! up to [`DATA_CHUNK_SIZE`] bytes each, carrying a cumulative byte offset.
//! The first chunk for an object additionally prefixes its payload with an
//! 8-byte big-endian total length, so a receiver that has never seen this
//! digest before knows how many bytes to expect without a separate
//! announce message. This keeps the wire-level DATA frame exactly
//! `digest | offset | payload` while still making `offset` — and
//! `TransferLog::log_progress` — meaningful: a transport drop mid-object
//! leaves a transfer record whose offset reflects real partial progress,
//! not just "started" vs "finished".
//!
//! Cross-connection resume (reconnecting mid-object and picking up where a
//! dropped connection left off) is out of scope here, matching the wire
//! format's RESUME message code being reserved rather than specified:
//! within one still-open connection, a sender asked to send the same
//! digest again will pick up from the WAL's recorded offset, but a fresh
//! connection always restarts a digest's transfer from byte zero.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use n1_seal::ObjectDigest;
use n1_store::ObjectStore;
use n1_transport::{CancelScope, Message, Transport};
use n1_wal::{SessionId, TransferLog};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::{ReplicatorError, Result};
use crate::progress::{ProgressObserver, SessionEvent};
use crate::role::{Role, SyncMode};
use crate::state::SessionState;

/// Maximum bytes of one object's sealed form sent per DATA frame
pub const DATA_CHUNK_SIZE: usize = 1024 * 1024;

/// Outcome of one completed sync round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionSummary {
    pub objects_transferred: u64,
    pub bytes_transferred: u64,
}

impl SessionSummary {
    fn empty() -> Self {
        Self::default()
    }
}

/// One replication session, driving a single connection's protocol state
/// machine. Sessions are single-threaded: all `&mut self` methods are meant
/// to be driven by one task per connection, with multiple sessions sharing
/// only the [`ObjectStore`] and [`TransferLog`] (each internally
/// synchronized).
pub struct Session<S> {
    id: SessionId,
    role: Role,
    state: SessionState,
    transport: Transport<S>,
    store: Arc<ObjectStore>,
    wal: Arc<TransferLog>,
    cancel: CancelScope,
    observer: Option<ProgressObserver>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Start a new session over `stream`, with a freshly generated random
    /// session id
    pub fn new(
        role: Role,
        stream: S,
        store: Arc<ObjectStore>,
        wal: Arc<TransferLog>,
        cancel: CancelScope,
    ) -> Self {
        Self {
            id: SessionId::generate(),
            role,
            state: SessionState::Closed,
            transport: Transport::new(stream),
            store,
            wal,
            cancel,
            observer: None,
        }
    }

    /// Attach a progress observer
    pub fn with_observer(mut self, observer: ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    fn set_state(&mut self, state: SessionState) {
        self.state = state.clone();
        self.emit(SessionEvent::StateChanged {
            session_id: self.id,
            state,
        });
        tracing::debug!(session = %self.id, state = ?self.state, "session state transition");
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(observer) = &self.observer {
            observer(event);
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_expired() {
            return Err(ReplicatorError::Cancelled);
        }
        Ok(())
    }

    fn protocol_violation(&mut self, msg: &Message) -> ReplicatorError {
        let err = ReplicatorError::InvalidState(format!("unexpected message {msg:?}"));
        self.state = SessionState::Error {
            message: err.to_string(),
            ended_at: Instant::now(),
        };
        err
    }

    /// Run one accept-side round: unconditionally offer every local digest,
    /// then react to whichever of ACCEPT / OFFER / COMPLETE the peer sends
    /// back (§4.5.1).
    pub async fn run_server(&mut self) -> Result<SessionSummary> {
        self.set_state(SessionState::Connecting);
        self.set_state(SessionState::Handshaking);
        self.check_cancelled()?;

        self.set_state(SessionState::Offering);
        let local = self.store.list();
        self.transport
            .send(&Message::Offer(local), &self.cancel)
            .await?;

        self.set_state(SessionState::Negotiating);
        let reply = self.transport.recv(&self.cancel).await?;
        let summary = match reply {
            Message::Accept(wanted) => {
                self.set_state(SessionState::Transferring);
                self.send_objects(&wanted).await?
            }
            Message::Offer(offered) => {
                let needed: Vec<_> = offered.into_iter().filter(|d| !self.store.has(d)).collect();
                self.transport
                    .send(&Message::Accept(needed.clone()), &self.cancel)
                    .await?;
                self.set_state(SessionState::Transferring);
                self.receive_objects(&needed).await?
            }
            Message::Complete(_) => SessionSummary::empty(),
            other => return Err(self.protocol_violation(&other)),
        };

        self.set_state(SessionState::Closed);
        Ok(summary)
    }

    /// Run one dial-side round: wait for the server's unconditional OFFER,
    /// then either pull what's missing or push what the peer lacks,
    /// depending on `mode` (§4.5.2).
    pub async fn run_client(&mut self, mode: SyncMode) -> Result<SessionSummary> {
        self.set_state(SessionState::Connecting);
        self.set_state(SessionState::Handshaking);
        self.check_cancelled()?;

        self.set_state(SessionState::Negotiating);
        let offer = self.transport.recv(&self.cancel).await?;
        let offered = match offer {
            Message::Offer(list) => list,
            other => return Err(self.protocol_violation(&other)),
        };

        let summary = match mode {
            SyncMode::Pull => self.run_client_pull(offered).await?,
            SyncMode::Push => self.run_client_push(offered).await?,
        };

        self.set_state(SessionState::Closed);
        Ok(summary)
    }

    async fn run_client_pull(&mut self, offered: Vec<ObjectDigest>) -> Result<SessionSummary> {
        let needed: Vec<_> = offered.into_iter().filter(|d| !self.store.has(d)).collect();
        if needed.is_empty() {
            // Nothing to pull: skip straight to COMPLETE rather than
            // round-tripping an empty ACCEPT, matching the empty-offer
            // end-to-end scenario.
            self.transport
                .send(&Message::Complete(self.id), &self.cancel)
                .await?;
            return Ok(SessionSummary::empty());
        }
        self.transport
            .send(&Message::Accept(needed.clone()), &self.cancel)
            .await?;
        self.set_state(SessionState::Transferring);
        self.receive_objects(&needed).await
    }

    async fn run_client_push(&mut self, offered: Vec<ObjectDigest>) -> Result<SessionSummary> {
        let offered_set: HashSet<_> = offered.into_iter().collect();
        let to_push: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|d| !offered_set.contains(d))
            .collect();
        if to_push.is_empty() {
            self.transport
                .send(&Message::Complete(self.id), &self.cancel)
                .await?;
            return Ok(SessionSummary::empty());
        }
        self.transport
            .send(&Message::Offer(to_push), &self.cancel)
            .await?;
        let reply = self.transport.recv(&self.cancel).await?;
        let accepted = match reply {
            Message::Accept(list) => list,
            other => return Err(self.protocol_violation(&other)),
        };
        self.set_state(SessionState::Transferring);
        self.send_objects(&accepted).await
    }

    /// Send each digest in `digests` as one or more chunked DATA frames,
    /// then COMPLETE. Waits for the peer's own COMPLETE afterward unless
    /// nothing was sent.
    async fn send_objects(&mut self, digests: &[ObjectDigest]) -> Result<SessionSummary> {
        let mut bytes_total = 0u64;
        for digest in digests {
            self.check_cancelled()?;
            self.wal.log_send(&self.id, digest)?;
            let resume_from = self.wal.get_progress(&self.id, digest)?.offset;
            let sealed = self.store.get_sealed(digest)?;
            let total_len = sealed.len() as u64;

            let mut offset = resume_from;
            while offset < total_len {
                self.check_cancelled()?;
                let start = offset as usize;
                let remaining = sealed.len() - start;
                let take = remaining.min(DATA_CHUNK_SIZE);
                let chunk = &sealed[start..start + take];

                let payload = if offset == 0 {
                    let mut p = Vec::with_capacity(8 + chunk.len());
                    p.extend_from_slice(&total_len.to_be_bytes());
                    p.extend_from_slice(chunk);
                    p
                } else {
                    chunk.to_vec()
                };

                self.transport
                    .send(
                        &Message::Data {
                            digest: *digest,
                            offset,
                            payload,
                        },
                        &self.cancel,
                    )
                    .await?;
                offset += take as u64;
                self.wal.log_progress(&self.id, digest, offset)?;
            }

            self.wal.complete_transfer(&self.id, digest)?;
            bytes_total += total_len;
            self.emit(SessionEvent::ObjectTransferred {
                session_id: self.id,
                digest: *digest,
                bytes: total_len,
            });
        }

        self.set_state(SessionState::Completing);
        self.transport
            .send(&Message::Complete(self.id), &self.cancel)
            .await?;

        if !digests.is_empty() {
            match self.transport.recv(&self.cancel).await? {
                Message::Complete(_) => {}
                other => return Err(self.protocol_violation(&other)),
            }
        }

        Ok(SessionSummary {
            objects_transferred: digests.len() as u64,
            bytes_transferred: bytes_total,
        })
    }

    /// Receive chunked DATA frames for every digest in `expected`, then
    /// exchange a final COMPLETE with the peer.
    async fn receive_objects(&mut self, expected: &[ObjectDigest]) -> Result<SessionSummary> {
        let mut remaining: HashSet<ObjectDigest> = expected.iter().copied().collect();
        let mut bytes_total = 0u64;
        // (digest, declared total length, bytes accumulated so far)
        let mut current: Option<(ObjectDigest, u64, Vec<u8>)> = None;

        while !remaining.is_empty() {
            self.check_cancelled()?;
            let (digest, offset, payload) = match self.transport.recv(&self.cancel).await? {
                Message::Data { digest, offset, payload } => (digest, offset, payload),
                other => return Err(self.protocol_violation(&other)),
            };

            if !remaining.contains(&digest) {
                return Err(ReplicatorError::TransferFailed(format!(
                    "unexpected digest {digest} outside the negotiated set"
                )));
            }

            let consumed: u64;
            if offset == 0 {
                if payload.len() < 8 {
                    return Err(ReplicatorError::TransferFailed(
                        "DATA chunk at offset 0 missing its length header".into(),
                    ));
                }
                let total_len = u64::from_be_bytes(payload[..8].try_into().unwrap());
                let chunk = &payload[8..];
                consumed = chunk.len() as u64;
                self.wal.log_receive(&self.id, &digest)?;
                current = Some((digest, total_len, chunk.to_vec()));
            } else {
                consumed = payload.len() as u64;
                match &mut current {
                    Some((buf_digest, _, buf)) if *buf_digest == digest => {
                        buf.extend_from_slice(&payload);
                    }
                    _ => {
                        return Err(ReplicatorError::TransferFailed(format!(
                            "DATA continuation for {digest} with no matching in-progress transfer"
                        )))
                    }
                }
            }

            let new_offset = offset + consumed;
            self.wal.log_progress(&self.id, &digest, new_offset)?;

            let total_len = current.as_ref().unwrap().1;
            if new_offset > total_len {
                return Err(ReplicatorError::TransferFailed(format!(
                    "received more bytes than declared for {digest}"
                )));
            }
            if new_offset == total_len {
                let (_, _, buf) = current.take().unwrap();
                self.store.put_sealed(&digest, &buf)?;
                self.wal.complete_transfer(&self.id, &digest)?;
                bytes_total += total_len;
                self.emit(SessionEvent::ObjectTransferred {
                    session_id: self.id,
                    digest,
                    bytes: total_len,
                });
                remaining.remove(&digest);
            }
        }

        self.set_state(SessionState::Completing);
        match self.transport.recv(&self.cancel).await? {
            Message::Complete(_) => {}
            other => return Err(self.protocol_violation(&other)),
        }
        self.transport
            .send(&Message::Complete(self.id), &self.cancel)
            .await?;

        Ok(SessionSummary {
            objects_transferred: expected.len() as u64,
            bytes_transferred: bytes_total,
        })
    }

    /// Repeatedly run accept-side rounds over the same connection until
    /// cancelled, re-entering Offering fresh each time (§9: follow mode
    /// performs a complete OFFER/ACCEPT handshake every round, never an
    /// abbreviated resume).
    pub async fn follow_server(&mut self, poll_interval: Duration) -> Result<()> {
        loop {
            let summary = self.run_server().await?;
            self.emit(SessionEvent::FollowRoundCompleted {
                session_id: self.id,
                objects_transferred: summary.objects_transferred,
            });
            if self.cancel.is_expired() {
                return Ok(());
            }
            tokio::select! {
                _ = tokio::time::sleep(poll_interval) => {}
                _ = self.cancel.wait_for_expiry() => return Ok(()),
            }
        }
    }

    /// Repeatedly run dial-side rounds until cancelled
    pub async fn follow_client(&mut self, mode: SyncMode, poll_interval: Duration) -> Result<()> {
        loop {
            let summary = self.run_client(mode).await?;
            self.emit(SessionEvent::FollowRoundCompleted {
                session_id: self.id,
                objects_transferred: summary.objects_transferred,
            });
            if self.cancel.is_expired() {
                return Ok(());
            }
            tokio::select! {
                _ = tokio::time::sleep(poll_interval) => {}
                _ = self.cancel.wait_for_expiry() => return Ok(()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use n1_seal::MasterKey;
    use n1_store::{ObjectStore, SqliteBlobMap};
    use n1_wal::TransferLog;
    use tokio::io::DuplexStream;

    fn store() -> Arc<ObjectStore> {
        let map = Arc::new(SqliteBlobMap::open_in_memory().unwrap());
        Arc::new(ObjectStore::open(map).unwrap())
    }

    fn wal() -> Arc<TransferLog> {
        Arc::new(TransferLog::open_in_memory().unwrap())
    }

    fn pair() -> (Session<DuplexStream>, Session<DuplexStream>, Arc<ObjectStore>, Arc<ObjectStore>) {
        let (server_io, client_io) = tokio::io::duplex(64 * 1024);
        let server_store = store();
        let client_store = store();
        let server = Session::new(
            Role::Server,
            server_io,
            Arc::clone(&server_store),
            wal(),
            CancelScope::new(),
        );
        let client = Session::new(
            Role::Client,
            client_io,
            Arc::clone(&client_store),
            wal(),
            CancelScope::new(),
        );
        (server, client, server_store, client_store)
    }

    #[tokio::test]
    async fn empty_vaults_sync_with_zero_transfers() {
        let (mut server, mut client, _s, _c) = pair();
        let (server_res, client_res) = tokio::join!(server.run_server(), client.run_client(SyncMode::Pull));
        let server_summary = server_res.unwrap();
        let client_summary = client_res.unwrap();
        assert_eq!(server_summary, SessionSummary::empty());
        assert_eq!(client_summary, SessionSummary::empty());
    }

    #[tokio::test]
    async fn client_pull_converges_on_server_contents() {
        let (mut server, mut client, server_store, client_store) = pair();
        let key = MasterKey::generate();
        let d1 = server_store.put_plaintext(&key, b"v1").unwrap();
        let d2 = server_store.put_plaintext(&key, b"v2").unwrap();

        let (server_res, client_res) = tokio::join!(server.run_server(), client.run_client(SyncMode::Pull));
        server_res.unwrap();
        let summary = client_res.unwrap();

        assert_eq!(summary.objects_transferred, 2);
        assert!(client_store.has(&d1));
        assert!(client_store.has(&d2));
        assert_eq!(client_store.get(&key, &d1).unwrap(), b"v1");
        assert_eq!(client_store.get(&key, &d2).unwrap(), b"v2");
    }

    #[tokio::test]
    async fn client_push_delivers_objects_the_server_lacks() {
        let (mut server, mut client, server_store, client_store) = pair();
        let key = MasterKey::generate();
        let digest = client_store.put_plaintext(&key, b"pushed value").unwrap();

        let (server_res, client_res) = tokio::join!(server.run_server(), client.run_client(SyncMode::Push));
        server_res.unwrap();
        client_res.unwrap();

        assert!(server_store.has(&digest));
        assert_eq!(server_store.get(&key, &digest).unwrap(), b"pushed value");
    }

    #[tokio::test]
    async fn server_push_when_client_offers_nothing_new() {
        // Client has nothing the server lacks and needs nothing from the
        // server: client's ACCEPT on an empty needed set still round-trips
        // a COMPLETE with no DATA frames.
        let (mut server, mut client, server_store, client_store) = pair();
        let key = MasterKey::generate();
        let digest = server_store.put_plaintext(&key, b"already shared").unwrap();
        client_store.put_sealed(&digest, &server_store.get_sealed(&digest).unwrap()).unwrap();

        let (server_res, client_res) = tokio::join!(server.run_server(), client.run_client(SyncMode::Pull));
        let server_summary = server_res.unwrap();
        let client_summary = client_res.unwrap();
        assert_eq!(server_summary.objects_transferred, 0);
        assert_eq!(client_summary.objects_transferred, 0);
    }

    #[tokio::test]
    async fn rejects_data_for_a_digest_outside_the_negotiated_set() {
        let (peer_io, client_io) = tokio::io::duplex(64 * 1024);
        let client_store = store();
        let mut peer = n1_transport::Transport::new(peer_io);
        let scope = CancelScope::new();

        let mut client = Session::new(Role::Client, client_io, client_store, wal(), CancelScope::new());
        let client_task = tokio::spawn(async move { client.run_client(SyncMode::Pull).await });

        let wanted = ObjectDigest::of_sealed(b"wanted");
        let decoy = ObjectDigest::of_sealed(b"never negotiated");
        peer.send(&Message::Offer(vec![wanted]), &scope).await.unwrap();

        let accept = peer.recv(&scope).await.unwrap();
        assert_eq!(accept, Message::Accept(vec![wanted]));

        peer.send(
            &Message::Data {
                digest: decoy,
                offset: 0,
                payload: 0u64.to_be_bytes().to_vec(),
            },
            &scope,
        )
        .await
        .unwrap();

        let err = client_task.await.unwrap().unwrap_err();
        assert!(matches!(err, ReplicatorError::TransferFailed(_)));
    }
}
