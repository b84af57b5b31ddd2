//! The ambient cancellation scope threaded through transport sends/receives
//! and, one level up, whole replicator sessions.
//!
//! Deliberately minimal: an atomic cancelled flag plus an optional deadline.
//! Actual waiting is done with `tokio::select!` at each call site rather
//! than through a structured-concurrency abstraction — there's exactly one
//! thing to race against a given operation (cancellation-or-deadline), so a
//! dedicated combinator would only add indirection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A cancellation signal and optional deadline shared by every operation in
/// one session.
#[derive(Clone)]
pub struct CancelScope {
    inner: Arc<Inner>,
}

struct Inner {
    cancelled: AtomicBool,
    deadline: Option<Instant>,
}

impl CancelScope {
    /// A scope with no deadline that is never cancelled unless [`cancel`]
    /// is called
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline: None,
            }),
        }
    }

    /// A scope that is automatically considered expired after `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                deadline: Some(Instant::now() + timeout),
            }),
        }
    }

    /// Signal cancellation. Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    /// Has this scope been explicitly cancelled or has its deadline passed?
    pub fn is_expired(&self) -> bool {
        if self.inner.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        matches!(self.inner.deadline, Some(d) if Instant::now() >= d)
    }

    /// Was this scope explicitly cancelled (as opposed to merely timed out)?
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Time remaining until the deadline, if one was set and hasn't passed
    pub fn remaining(&self) -> Option<Duration> {
        self.inner.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Resolve once this scope is cancelled or its deadline passes. Useful
    /// as one arm of a `tokio::select!` alongside an I/O future.
    pub async fn wait_for_expiry(&self) {
        loop {
            if self.is_expired() {
                return;
            }
            match self.remaining() {
                Some(remaining) => tokio::time::sleep(remaining.min(Duration::from_millis(50))).await,
                None => tokio::time::sleep(Duration::from_millis(50)).await,
            }
        }
    }
}

impl Default for CancelScope {
    fn default() -> Self {
        Self::new()
    }
}
