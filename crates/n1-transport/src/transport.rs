//! A framed transport over any bidirectional, reliable byte stream.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::cancel::CancelScope;
use crate::error::{Result, TransportError};
use crate::frame::{Frame, MessageType, MAX_BODY_LEN};
use crate::message::Message;

const HEADER_LEN: usize = 1 + 4;

/// A length-prefixed message transport over a byte stream `S`.
///
/// `send` writes a whole frame in one shot; `recv` blocks until a whole
/// frame has arrived, never returning a partial one. Both race the
/// in-flight I/O against the supplied [`CancelScope`], so a cancelled or
/// expired scope interrupts a stalled peer instead of hanging forever.
pub struct Transport<S> {
    stream: S,
}

impl<S> Transport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a byte stream as a framed transport
    pub fn new(stream: S) -> Self {
        Self { stream }
    }

    /// Send one message as a single, atomic frame
    pub async fn send(&mut self, msg: &Message, scope: &CancelScope) -> Result<()> {
        let wire = msg.to_frame().encode();
        let write = self.stream.write_all(&wire);
        tokio::select! {
            biased;
            res = write => res.map_err(TransportError::Io),
            _ = scope.wait_for_expiry() => Err(Self::expiry_error(scope)),
        }
    }

    /// Receive one message, blocking until a whole frame has arrived
    pub async fn recv(&mut self, scope: &CancelScope) -> Result<Message> {
        let frame = self.recv_frame(scope).await?;
        Message::from_frame(frame)
    }

    async fn recv_frame(&mut self, scope: &CancelScope) -> Result<Frame> {
        let read = Self::read_frame(&mut self.stream);
        tokio::select! {
            biased;
            res = read => res,
            _ = scope.wait_for_expiry() => Err(Self::expiry_error(scope)),
        }
    }

    async fn read_frame(stream: &mut S) -> Result<Frame> {
        let mut header = [0u8; HEADER_LEN];
        Self::read_exact_or_closed(stream, &mut header).await?;

        let code = header[0];
        let len = u32::from_be_bytes(header[1..5].try_into().unwrap());
        if len > MAX_BODY_LEN {
            return Err(TransportError::Protocol(format!(
                "frame body length {len} exceeds maximum {MAX_BODY_LEN}"
            )));
        }

        let mut body = vec![0u8; len as usize];
        Self::read_exact_or_closed(stream, &mut body).await?;

        let msg_type = MessageType::from_code(code)?;
        Ok(Frame::new(msg_type, body))
    }

    async fn read_exact_or_closed(stream: &mut S, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        match stream.read_exact(buf).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(TransportError::Closed),
            Err(e) => Err(TransportError::Io(e)),
        }
    }

    fn expiry_error(scope: &CancelScope) -> TransportError {
        if scope.is_cancelled() {
            TransportError::Cancelled
        } else {
            TransportError::Timeout
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use n1_seal::ObjectDigest;
    use n1_wal::SessionId;
    use std::time::Duration;
    use tokio::io::duplex;

    #[tokio::test]
    async fn send_then_recv_roundtrips_a_message() {
        let (client_io, server_io) = duplex(4096);
        let mut client = Transport::new(client_io);
        let mut server = Transport::new(server_io);
        let scope = CancelScope::new();

        let msg = Message::Offer(vec![ObjectDigest::of_sealed(b"x")]);
        client.send(&msg, &scope).await.unwrap();
        let received = server.recv(&scope).await.unwrap();
        assert_eq!(received, msg);
    }

    #[tokio::test]
    async fn multiple_messages_do_not_tear() {
        let (client_io, server_io) = duplex(4096);
        let mut client = Transport::new(client_io);
        let mut server = Transport::new(server_io);
        let scope = CancelScope::new();

        let a = Message::Complete(SessionId::generate());
        let b = Message::Error("oops".to_string());
        client.send(&a, &scope).await.unwrap();
        client.send(&b, &scope).await.unwrap();

        assert_eq!(server.recv(&scope).await.unwrap(), a);
        assert_eq!(server.recv(&scope).await.unwrap(), b);
    }

    #[tokio::test]
    async fn recv_on_closed_stream_is_closed_error() {
        let (client_io, server_io) = duplex(4096);
        drop(client_io);
        let mut server = Transport::new(server_io);
        let scope = CancelScope::new();
        let err = server.recv(&scope).await.unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[tokio::test]
    async fn recv_blocks_until_cancelled_scope_interrupts_it() {
        let (_client_io, server_io) = duplex(4096);
        let mut server = Transport::new(server_io);
        let scope = CancelScope::with_timeout(Duration::from_millis(10));
        let err = server.recv(&scope).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout));
    }

    #[tokio::test]
    async fn recv_on_oversized_length_is_protocol_error() {
        let (mut client_io, server_io) = duplex(64);
        let mut server = Transport::new(server_io);
        let scope = CancelScope::new();

        let mut bad_header = vec![MessageType::Data.code()];
        bad_header.extend_from_slice(&(MAX_BODY_LEN + 1).to_be_bytes());
        client_io.write_all(&bad_header).await.unwrap();

        let err = server.recv(&scope).await.unwrap_err();
        assert!(matches!(err, TransportError::Protocol(_)));
    }
}
