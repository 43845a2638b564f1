//! Log Event Types
//!
//! Defines the structure of events stored in the transaction history log
//! and streamed to replicas. A logical event may be split into multiple
//! wire fragments; fragments of one event share a sequence number and are
//! indexed contiguously from zero, with the highest index flagged as the
//! last fragment.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Sequence number - monotonically increasing identifier of a logical event
pub type Seqno = i64;

/// Fragment index within one event's multi-fragment encoding
pub type FragNo = u16;

/// Identifier of the master incarnation that produced an event
pub type EpochNumber = i64;

/// Sentinel for "position unknown" in handshake fields and empty logs
pub const POSITION_UNKNOWN: i64 = -1;

/// One stored fragment of a logical log event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Sequence number of the logical event
    pub seqno: Seqno,
    /// Fragment index within the event
    pub fragno: FragNo,
    /// Whether this is the event's final fragment
    pub last_frag: bool,
    /// Epoch number of the master incarnation that wrote the event
    pub epoch: EpochNumber,
    /// Node ID that originated this event
    pub source_id: String,
    /// Timestamp when the event was extracted
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Opaque payload bytes; replicas decode these, this server does not
    pub payload: Bytes,
}

impl LogEvent {
    /// Create a single-fragment event
    pub fn single(
        seqno: Seqno,
        epoch: EpochNumber,
        source_id: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            seqno,
            fragno: 0,
            last_frag: true,
            epoch,
            source_id: source_id.into(),
            timestamp: chrono::Utc::now(),
            payload: payload.into(),
        }
    }

    /// Create one fragment of a multi-fragment event
    pub fn fragment(
        seqno: Seqno,
        fragno: FragNo,
        last_frag: bool,
        epoch: EpochNumber,
        source_id: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            seqno,
            fragno,
            last_frag,
            epoch,
            source_id: source_id.into(),
            timestamp: chrono::Utc::now(),
            payload: payload.into(),
        }
    }

    /// Check if this fragment opens a logical event
    pub fn is_first(&self) -> bool {
        self.fragno == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_fragment_event() {
        let event = LogEvent::single(7, 1, "master-1", &b"payload"[..]);
        assert_eq!(event.seqno, 7);
        assert_eq!(event.fragno, 0);
        assert!(event.last_frag);
        assert!(event.is_first());
    }

    #[test]
    fn test_fragmented_event() {
        let head = LogEvent::fragment(7, 0, false, 1, "master-1", &b"aa"[..]);
        let tail = LogEvent::fragment(7, 1, true, 1, "master-1", &b"bb"[..]);
        assert!(head.is_first());
        assert!(!head.last_frag);
        assert!(!tail.is_first());
        assert!(tail.last_frag);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let event = LogEvent::single(42, 3, "master-1", &b"row data"[..]);
        let bytes = bincode::serialize(&event).unwrap();
        let restored: LogEvent = bincode::deserialize(&bytes).unwrap();
        assert_eq!(restored, event);
    }
}
