//! Progress reporting: a session emits coarse-grained events an observer
//! (the CLI's progress bar, a daemon's session table, a test harness) can
//! subscribe to without reaching into session internals.

use n1_seal::ObjectDigest;
use n1_wal::SessionId;

use crate::state::SessionState;

/// A single progress event emitted by a running session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The session transitioned to a new state
    StateChanged { session_id: SessionId, state: SessionState },
    /// An object finished sending or receiving
    ObjectTransferred { session_id: SessionId, digest: ObjectDigest, bytes: u64 },
    /// A follow-mode round completed and the session is looping back to
    /// negotiate another
    FollowRoundCompleted { session_id: SessionId, objects_transferred: u64 },
}

/// Callback type a caller supplies to observe a session's progress
pub type ProgressObserver = Box<dyn Fn(SessionEvent) + Send + Sync>;
