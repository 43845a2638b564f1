//! Network Module
//!
//! Framed message transport between master and replicas.

mod client;
mod server;

pub use client::StreamClient;
pub use server::ReplicationServer;

use crate::error::{Error, Result};
use crate::stream::{FrameHeader, Message};

/// Read a framed message from a reader
pub async fn read_message<R: tokio::io::AsyncRead + Unpin>(reader: &mut R) -> Result<Message> {
    use tokio::io::AsyncReadExt;

    // Read header
    let mut header_bytes = [0u8; FrameHeader::SIZE];
    reader.read_exact(&mut header_bytes).await?;
    let header = FrameHeader::from_bytes(&header_bytes);

    // Read body
    let mut body = vec![0u8; header.length as usize];
    reader.read_exact(&mut body).await?;

    // Verify checksum
    let computed_checksum = crc32fast::hash(&body);
    if computed_checksum != header.checksum {
        return Err(Error::Protocol("Message checksum mismatch".into()));
    }

    // Deserialize
    let message = Message::deserialize(&body)?;
    Ok(message)
}

/// Write a framed message to a writer
pub async fn write_message<W: tokio::io::AsyncWrite + Unpin>(
    writer: &mut W,
    message: &Message,
) -> Result<()> {
    use tokio::io::AsyncWriteExt;

    let body = message.serialize()?;
    let header = FrameHeader::new(&body);

    writer.write_all(&header.to_bytes()).await?;
    writer.write_all(&body).await?;
    writer.flush().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frame_roundtrip() {
        let (mut a, mut b) = tokio::io::duplex(4096);

        let msg = Message::EventRequest {
            seqno: 50,
            prefetch_range: 4,
        };
        write_message(&mut a, &msg).await.unwrap();

        match read_message(&mut b).await.unwrap() {
            Message::EventRequest {
                seqno,
                prefetch_range,
            } => {
                assert_eq!(seqno, 50);
                assert_eq!(prefetch_range, 4);
            }
            other => panic!("Wrong message type: {}", other.type_name()),
        }
    }

    #[tokio::test]
    async fn test_corrupt_frame_rejected() {
        use tokio::io::AsyncWriteExt;

        let (mut a, mut b) = tokio::io::duplex(4096);

        let body = Message::Event {
            payload: b"payload".to_vec(),
        }
        .serialize()
        .unwrap();
        let mut header = FrameHeader::new(&body);
        header.checksum ^= 0xFFFF_FFFF;

        a.write_all(&header.to_bytes()).await.unwrap();
        a.write_all(&body).await.unwrap();

        let err = read_message(&mut b).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
