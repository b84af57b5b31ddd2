//! Wire-level frame: `type:u8 | length:u32 BE | body:length bytes`.

use crate::error::{Result, TransportError};

/// Maximum body length accepted from the wire, guarding against a corrupt
/// or hostile length prefix causing an unbounded allocation
pub const MAX_BODY_LEN: u32 = 64 * 1024 * 1024;

/// The fixed set of message type codes carried in a frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Hello,
    Offer,
    Accept,
    Data,
    Ack,
    Complete,
    Error,
    Version,
    VersionAck,
    Resume,
}

impl MessageType {
    pub fn code(self) -> u8 {
        match self {
            MessageType::Hello => 0x01,
            MessageType::Offer => 0x02,
            MessageType::Accept => 0x03,
            MessageType::Data => 0x04,
            MessageType::Ack => 0x05,
            MessageType::Complete => 0x06,
            MessageType::Error => 0x07,
            MessageType::Version => 0x08,
            MessageType::VersionAck => 0x09,
            MessageType::Resume => 0x0A,
        }
    }

    pub fn from_code(code: u8) -> Result<Self> {
        Ok(match code {
            0x01 => MessageType::Hello,
            0x02 => MessageType::Offer,
            0x03 => MessageType::Accept,
            0x04 => MessageType::Data,
            0x05 => MessageType::Ack,
            0x06 => MessageType::Complete,
            0x07 => MessageType::Error,
            0x08 => MessageType::Version,
            0x09 => MessageType::VersionAck,
            0x0A => MessageType::Resume,
            other => return Err(TransportError::Protocol(format!("unknown message type 0x{other:02x}"))),
        })
    }
}

/// A decoded frame: its type and raw body bytes, before the body is parsed
/// into a typed [`crate::message::Message`]
#[derive(Debug, Clone)]
pub struct Frame {
    pub msg_type: MessageType,
    pub body: Vec<u8>,
}

impl Frame {
    pub fn new(msg_type: MessageType, body: Vec<u8>) -> Self {
        Self { msg_type, body }
    }

    /// Encode this frame to its wire form
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + 4 + self.body.len());
        out.push(self.msg_type.code());
        out.extend_from_slice(&(self.body.len() as u32).to_be_bytes());
        out.extend_from_slice(&self.body);
        out
    }
}
