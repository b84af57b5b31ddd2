//! # n1 Transport
//!
//! Length-prefixed typed messages over any bidirectional, reliable byte
//! stream (TCP in production; an in-memory duplex pipe in tests). A frame
//! is `type:u8 | length:u32 BE | body`; [`Transport::send`] writes one
//! whole frame per call and [`Transport::recv`] only ever returns a
//! complete one, racing both against an ambient [`CancelScope`] so a
//! stalled peer can be interrupted.

pub mod cancel;
pub mod error;
pub mod frame;
pub mod message;
mod transport;

pub use cancel::CancelScope;
pub use error::{Result, TransportError};
pub use frame::{Frame, MessageType, MAX_BODY_LEN};
pub use message::Message;
pub use transport::Transport;
