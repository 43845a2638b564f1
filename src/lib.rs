//! RepLog - Transaction Log Streaming Server
//!
//! The master-side streaming half of a transaction-log replication protocol.
//! RepLog serves an ordered, append-only sequence of database-change events
//! to downstream replicas over persistent connections, guaranteeing strict
//! sequence order, resumption at an arbitrary position, and protection
//! against silently diverging from the master's history.
//!
//! # Architecture
//!
//! Each replica connection is served by its own task running a
//! [`stream::StreamSession`]: a handshake that validates the replica's
//! claimed log position, followed by a request/stream loop that walks the
//! requested window of events fragment by fragment. Sessions tail the log
//! through the [`gate::SequenceGate`], a broadcast counter that suspends
//! them until the log writer has appended the event they need.
//!
//! # Features
//!
//! - Strict `(seqno, fragno)` delivery order per connection
//! - Blocking tail reads without polling via the sequence gate
//! - Handshake-time epoch/seqno divergence detection
//! - Fragment-aware prefetch windows (a multi-fragment event counts once)
//! - Cooperative per-session cancellation with bounded shutdown

pub mod config;
pub mod error;
pub mod eventlog;
pub mod gate;
pub mod network;
pub mod stream;

pub use config::ReplogConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::ReplogConfig;
    pub use crate::error::{Error, Result};
    pub use crate::eventlog::{EventStore, LogEvent, MemoryStore, Seqno};
    pub use crate::gate::SequenceGate;
    pub use crate::network::{ReplicationServer, StreamClient};
    pub use crate::stream::{Message, SessionHandler, SessionRegistry, StreamSession};
}
