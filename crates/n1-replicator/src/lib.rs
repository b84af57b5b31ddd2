//! # n1 Replicator
//!
//! The protocol state machine that drives one replication session per
//! connection, atop [`n1_transport::Transport`], [`n1_store::ObjectStore`],
//! and [`n1_wal::TransferLog`]. A session is single-threaded: the state
//! machine in [`session::Session`] never shares mutable state with another
//! session directly, only through those three components' own internal
//! synchronization.
//!
//! Server sessions always speak first (§4.5.1: unconditional OFFER on
//! accept); client sessions wait for that OFFER and then decide whether
//! they're pulling or pushing (§4.5.2). [`role::SyncMode`] distinguishes the
//! two on the dialing side. [`session::Session::follow_server`] and
//! [`session::Session::follow_client`] loop a session through repeated
//! rounds for follow mode (§4.5, "Follow mode").

pub mod error;
pub mod progress;
pub mod role;
pub mod session;
pub mod state;

pub use error::{ReplicatorError, Result};
pub use progress::{ProgressObserver, SessionEvent};
pub use role::{Role, SyncMode};
pub use session::{Session, SessionSummary, DATA_CHUNK_SIZE};
pub use state::SessionState;
