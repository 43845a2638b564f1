//! Stream Client
//!
//! Replica-side helper for consuming the streaming protocol: connect,
//! handshake with a claimed log position, then request windows of events
//! and read payload frames. Downstream replica implementations and the
//! integration tests both drive the server through this type.

use std::time::Duration;

use bytes::Bytes;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::{read_message, write_message};
use crate::error::{Error, Result};
use crate::eventlog::{EpochNumber, Seqno};
use crate::stream::Message;

/// Client side of one streaming connection
pub struct StreamClient {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
}

impl StreamClient {
    /// Connect to a master
    pub async fn connect(address: &str, connect_timeout: Duration) -> Result<Self> {
        let result = timeout(connect_timeout, TcpStream::connect(address)).await;

        match result {
            Ok(Ok(stream)) => {
                stream.set_nodelay(true)?;
                let (reader, writer) = stream.into_split();
                Ok(Self { reader, writer })
            }
            Ok(Err(e)) => Err(Error::ConnectionFailed {
                address: address.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(Error::ConnectionTimeout(address.to_string())),
        }
    }

    /// Run the handshake, returning the master's stored `(min, max)`
    /// seqno range.
    ///
    /// Passing negative `last_epoch`/`last_seqno` skips the divergence
    /// check. A handshake the master rejects surfaces on the next read
    /// as a [`Error::Remote`] or a disconnect.
    pub async fn handshake(
        &mut self,
        source_id: &str,
        last_epoch: EpochNumber,
        last_seqno: Seqno,
    ) -> Result<(Seqno, Seqno)> {
        let range = match read_message(&mut self.reader).await? {
            Message::Handshake {
                min_seqno,
                max_seqno,
            } => (min_seqno, max_seqno),
            Message::Error { code, message } => {
                return Err(Error::Remote {
                    code: code.to_string(),
                    message,
                })
            }
            other => {
                return Err(Error::Protocol(format!(
                    "Expected Handshake, got {}",
                    other.type_name()
                )))
            }
        };

        write_message(
            &mut self.writer,
            &Message::HandshakeResponse {
                source_id: source_id.to_string(),
                last_epoch,
                last_seqno,
            },
        )
        .await?;

        Ok(range)
    }

    /// Request `prefetch_range` events starting at `seqno`.
    ///
    /// Requests address whole events: delivery starts at fragment 0, so
    /// a resume after a partial window must re-request the whole event.
    pub async fn request(&mut self, seqno: Seqno, prefetch_range: u64) -> Result<()> {
        write_message(
            &mut self.writer,
            &Message::EventRequest {
                seqno,
                prefetch_range,
            },
        )
        .await
    }

    /// Read the next fragment payload.
    ///
    /// A server `Error` frame is surfaced as [`Error::Remote`]; end of
    /// stream surfaces as an I/O error classified by
    /// [`Error::is_disconnect`].
    pub async fn next_payload(&mut self) -> Result<Bytes> {
        match read_message(&mut self.reader).await? {
            Message::Event { payload } => Ok(Bytes::from(payload)),
            Message::Error { code, message } => Err(Error::Remote {
                code: code.to_string(),
                message,
            }),
            other => Err(Error::Protocol(format!(
                "Expected Event, got {}",
                other.type_name()
            ))),
        }
    }

    /// Close the connection
    pub async fn close(mut self) -> Result<()> {
        use tokio::io::AsyncWriteExt;
        self.writer.shutdown().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_failure() {
        // Nothing listens on a fresh ephemeral port that was never bound
        let result = StreamClient::connect("127.0.0.1:1", Duration::from_millis(500)).await;
        assert!(result.is_err());
    }
}
