//! Transport error types

use thiserror::Error;

/// Result type alias for transport operations
pub type Result<T> = std::result::Result<T, TransportError>;

/// Errors that can occur while sending or receiving a frame
#[derive(Error, Debug)]
pub enum TransportError {
    /// The ambient cancellation scope was cancelled before the operation
    /// could complete
    #[error("operation cancelled")]
    Cancelled,

    /// The ambient cancellation scope's deadline elapsed
    #[error("operation timed out")]
    Timeout,

    /// The peer closed the stream in the middle of a frame, or before any
    /// frame at all
    #[error("transport closed by peer")]
    Closed,

    /// Bytes arrived but did not form a well-formed frame for a known
    /// message type
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Underlying I/O error on the byte stream
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}
