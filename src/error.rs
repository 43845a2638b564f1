//! RepLog Error Types

use thiserror::Error;

use crate::eventlog::{EpochNumber, FragNo, Seqno};

/// Result type alias for RepLog operations
pub type Result<T> = std::result::Result<T, Error>;

/// RepLog error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Log store errors
    #[error("Event store error: {0}")]
    Store(String),

    #[error("Fragment out of order at seqno {seqno}: expected fragno {expected}, got {got}")]
    FragmentOrder {
        seqno: Seqno,
        expected: FragNo,
        got: FragNo,
    },

    // Handshake consistency errors
    #[error(
        "Replica log has higher sequence number than master: source ID={source_id} \
         seqno={seqno} replica epoch number={replica_epoch}"
    )]
    DivergedHistory {
        source_id: String,
        seqno: Seqno,
        replica_epoch: EpochNumber,
    },

    #[error(
        "Log epoch numbers do not match: source ID={source_id} seqno={seqno} \
         master epoch number={master_epoch} replica epoch number={replica_epoch}"
    )]
    EpochMismatch {
        source_id: String,
        seqno: Seqno,
        master_epoch: EpochNumber,
        replica_epoch: EpochNumber,
    },

    // Streaming errors
    #[error("Requested event (#{seqno}/{fragno}) not found in log")]
    DeliveryGap { seqno: Seqno, fragno: FragNo },

    // Protocol errors
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Message serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Remote error [{code}]: {message}")]
    Remote { code: String, message: String },

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Connection failed to {address}: {reason}")]
    ConnectionFailed { address: String, reason: String },

    #[error("Connection timeout to {0}")]
    ConnectionTimeout(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Shutdown in progress")]
    ShuttingDown,
}

impl Error {
    /// Check if this error is a normal client disconnect rather than a fault
    pub fn is_disconnect(&self) -> bool {
        match self {
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }

    /// Check if this error indicates replica/master log divergence
    pub fn is_divergence(&self) -> bool {
        matches!(
            self,
            Error::DivergedHistory { .. } | Error::EpochMismatch { .. }
        )
    }

    /// Check if this error is an expected termination path (no fault)
    pub fn is_expected_termination(&self) -> bool {
        matches!(self, Error::Cancelled | Error::ShuttingDown) || self.is_disconnect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnect_classification() {
        let eof = Error::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "eof",
        ));
        assert!(eof.is_disconnect());
        assert!(eof.is_expected_termination());

        let refused = Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert!(!refused.is_disconnect());
    }

    #[test]
    fn test_divergence_classification() {
        let diverged = Error::DivergedHistory {
            source_id: "replica-1".to_string(),
            seqno: 42,
            replica_epoch: 7,
        };
        assert!(diverged.is_divergence());
        assert!(!diverged.is_expected_termination());

        let mismatch = Error::EpochMismatch {
            source_id: "replica-1".to_string(),
            seqno: 42,
            master_epoch: 3,
            replica_epoch: 7,
        };
        assert!(mismatch.is_divergence());

        // Both epoch numbers must be visible to operators
        let text = mismatch.to_string();
        assert!(text.contains('3'));
        assert!(text.contains('7'));
    }

    #[test]
    fn test_cancelled_is_expected() {
        assert!(Error::Cancelled.is_expected_termination());
        assert!(!Error::DeliveryGap { seqno: 5, fragno: 0 }.is_expected_termination());
    }
}
