//! Streaming Module
//!
//! Serves the transaction history log to replicas: the wire protocol,
//! the handshake position validator, the per-connection session state
//! machine, and the handler/registry pair that owns session lifecycles.

pub mod protocol;
mod handler;
mod registry;
mod session;
mod validator;

pub use handler::SessionHandler;
pub use protocol::{ErrorCode, FrameHeader, Message};
pub use registry::SessionRegistry;
pub use session::{SessionState, StreamSession};
pub use validator::PositionValidator;

use crate::eventlog::{EpochNumber, Seqno};

/// A replica's claimed log position, received during the handshake.
///
/// A negative epoch or seqno means "position unknown" and disables the
/// divergence check.
#[derive(Debug, Clone)]
pub struct HandshakeInfo {
    /// Replica's source identifier
    pub source_id: String,
    /// Epoch number of the last event the replica applied
    pub last_epoch: EpochNumber,
    /// Sequence number of the last event the replica applied
    pub last_seqno: Seqno,
}
