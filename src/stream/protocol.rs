//! Streaming Protocol
//!
//! Defines the wire protocol between the master and its replicas: the
//! handshake exchange, event requests and the fragment frames that answer
//! them. Messages are bincode-encoded and framed by [`FrameHeader`].

use serde::{Deserialize, Serialize};

use crate::eventlog::{EpochNumber, Seqno};

/// Protocol messages exchanged with replicas
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    // ========== Handshake ==========
    /// Opening advertisement from the master: the stored log range.
    /// Both fields are -1 when the log is empty.
    Handshake {
        min_seqno: Seqno,
        max_seqno: Seqno,
    },

    /// Replica's reply: who it is and where it last read. Negative
    /// `last_epoch`/`last_seqno` disables the divergence check.
    HandshakeResponse {
        source_id: String,
        last_epoch: EpochNumber,
        last_seqno: Seqno,
    },

    // ========== Event Streaming ==========
    /// Request for `prefetch_range` consecutive events starting at
    /// `seqno`. Fragments of one event count once toward the range.
    /// Requests address whole events: delivery starts at fragment 0, and
    /// a replica resuming after a partial window re-requests the event
    /// it was in the middle of.
    EventRequest {
        seqno: Seqno,
        prefetch_range: u64,
    },

    /// One fragment's opaque payload. Fragment boundaries and the
    /// last-fragment marker travel inside the payload encoding, which
    /// the replica decodes.
    Event {
        payload: Vec<u8>,
    },

    // ========== Error ==========
    /// Terminal error notice sent before the master closes the stream
    Error {
        code: ErrorCode,
        message: String,
    },
}

/// Error codes for terminal protocol errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    /// Replica and master histories diverge at the claimed position
    DivergedHistory,
    /// A gated event was missing from the log store
    DeliveryGap,
    /// Malformed or out-of-sequence message
    Protocol,
    /// Internal server error
    Internal,
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCode::DivergedHistory => "DivergedHistory",
            ErrorCode::DeliveryGap => "DeliveryGap",
            ErrorCode::Protocol => "Protocol",
            ErrorCode::Internal => "Internal",
        };
        write!(f, "{}", name)
    }
}

impl Message {
    /// Serialize message to bytes
    pub fn serialize(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize message from bytes
    pub fn deserialize(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }

    /// Get the message type name (for logging)
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::Handshake { .. } => "Handshake",
            Message::HandshakeResponse { .. } => "HandshakeResponse",
            Message::EventRequest { .. } => "EventRequest",
            Message::Event { .. } => "Event",
            Message::Error { .. } => "Error",
        }
    }
}

/// Frame header for length-prefixed messages
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    /// Message length
    pub length: u32,
    /// Message checksum
    pub checksum: u32,
}

impl FrameHeader {
    /// Header size in bytes
    pub const SIZE: usize = 8;

    /// Create a new frame header
    pub fn new(data: &[u8]) -> Self {
        Self {
            length: data.len() as u32,
            checksum: crc32fast::hash(data),
        }
    }

    /// Serialize header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&self.length.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.checksum.to_le_bytes());
        bytes
    }

    /// Deserialize header from bytes
    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Self {
        Self {
            length: u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            checksum: u32::from_le_bytes(bytes[4..8].try_into().unwrap()),
        }
    }
}
