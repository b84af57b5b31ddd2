//! Typed protocol messages, encoded to and decoded from [`Frame`] bodies.

use n1_seal::ObjectDigest;
use n1_wal::SessionId;

use crate::error::{Result, TransportError};
use crate::frame::{Frame, MessageType};

const DIGEST_LEN: usize = 32;
const SESSION_ID_LEN: usize = 32;

/// A fully decoded protocol message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Hello,
    Offer(Vec<ObjectDigest>),
    Accept(Vec<ObjectDigest>),
    Data {
        digest: ObjectDigest,
        offset: u64,
        payload: Vec<u8>,
    },
    Ack,
    Complete(SessionId),
    Error(String),
    Version,
    VersionAck,
    Resume,
}

fn encode_digest_list(digests: &[ObjectDigest]) -> Vec<u8> {
    let mut body = Vec::with_capacity(4 + digests.len() * DIGEST_LEN);
    body.extend_from_slice(&(digests.len() as u32).to_be_bytes());
    for d in digests {
        body.extend_from_slice(d.as_bytes());
    }
    body
}

fn decode_digest_list(body: &[u8]) -> Result<Vec<ObjectDigest>> {
    if body.len() < 4 {
        return Err(TransportError::Protocol("digest list body too short for count".into()));
    }
    let count = u32::from_be_bytes(body[..4].try_into().unwrap()) as usize;
    let expected_len = 4 + count * DIGEST_LEN;
    if body.len() != expected_len {
        return Err(TransportError::Protocol(format!(
            "digest list body length {} does not match count {count}",
            body.len()
        )));
    }
    let mut out = Vec::with_capacity(count);
    for chunk in body[4..].chunks_exact(DIGEST_LEN) {
        let arr: [u8; DIGEST_LEN] = chunk.try_into().unwrap();
        out.push(ObjectDigest::from_bytes(arr));
    }
    Ok(out)
}

impl Message {
    /// Encode this message to its wire frame
    pub fn to_frame(&self) -> Frame {
        match self {
            Message::Hello => Frame::new(MessageType::Hello, Vec::new()),
            Message::Offer(digests) => Frame::new(MessageType::Offer, encode_digest_list(digests)),
            Message::Accept(digests) => Frame::new(MessageType::Accept, encode_digest_list(digests)),
            Message::Data { digest, offset, payload } => {
                let mut body = Vec::with_capacity(DIGEST_LEN + 8 + payload.len());
                body.extend_from_slice(digest.as_bytes());
                body.extend_from_slice(&offset.to_be_bytes());
                body.extend_from_slice(payload);
                Frame::new(MessageType::Data, body)
            }
            Message::Ack => Frame::new(MessageType::Ack, Vec::new()),
            Message::Complete(session_id) => {
                Frame::new(MessageType::Complete, session_id.as_bytes().to_vec())
            }
            Message::Error(reason) => Frame::new(MessageType::Error, reason.as_bytes().to_vec()),
            Message::Version => Frame::new(MessageType::Version, Vec::new()),
            Message::VersionAck => Frame::new(MessageType::VersionAck, Vec::new()),
            Message::Resume => Frame::new(MessageType::Resume, Vec::new()),
        }
    }

    /// Decode a message from an already-typed frame
    pub fn from_frame(frame: Frame) -> Result<Self> {
        Ok(match frame.msg_type {
            MessageType::Hello => Message::Hello,
            MessageType::Offer => Message::Offer(decode_digest_list(&frame.body)?),
            MessageType::Accept => Message::Accept(decode_digest_list(&frame.body)?),
            MessageType::Data => {
                if frame.body.len() < DIGEST_LEN + 8 {
                    return Err(TransportError::Protocol("DATA body too short".into()));
                }
                let digest_bytes: [u8; DIGEST_LEN] = frame.body[..DIGEST_LEN].try_into().unwrap();
                let offset_bytes: [u8; 8] = frame.body[DIGEST_LEN..DIGEST_LEN + 8].try_into().unwrap();
                Message::Data {
                    digest: ObjectDigest::from_bytes(digest_bytes),
                    offset: u64::from_be_bytes(offset_bytes),
                    payload: frame.body[DIGEST_LEN + 8..].to_vec(),
                }
            }
            MessageType::Ack => Message::Ack,
            MessageType::Complete => {
                if frame.body.len() != SESSION_ID_LEN {
                    return Err(TransportError::Protocol("COMPLETE body must be 32 bytes".into()));
                }
                let bytes: [u8; SESSION_ID_LEN] = frame.body.try_into().unwrap();
                Message::Complete(SessionId::from_bytes(bytes))
            }
            MessageType::Error => {
                let reason = String::from_utf8(frame.body)
                    .map_err(|_| TransportError::Protocol("ERROR body is not valid UTF-8".into()))?;
                Message::Error(reason)
            }
            MessageType::Version => Message::Version,
            MessageType::VersionAck => Message::VersionAck,
            MessageType::Resume => Message::Resume,
        })
    }
}
