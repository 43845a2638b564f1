//! Log Position Validator
//!
//! Handshake-time consistency check between a replica's claimed log
//! position and the master's log. A replica that was promoted or rolled
//! back under a different master incarnation must not silently continue
//! streaming; this check is the single point that stops it.

use std::sync::Arc;

use crate::error::{Error, Result};
use crate::eventlog::EventStore;
use crate::stream::HandshakeInfo;

/// Validates a replica's claimed position against the master's log
pub struct PositionValidator {
    store: Arc<dyn EventStore>,
}

impl PositionValidator {
    /// Create a validator reading from the given store
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Ensure the replica may safely continue from its claimed position.
    ///
    /// A negative epoch or seqno disables the check. Otherwise the event
    /// at `(last_seqno, 0)` must exist in the master's log and carry the
    /// replica's epoch number; a missing event or a differing epoch is a
    /// structural inconsistency, not a transient fault, and fails the
    /// handshake.
    pub async fn validate(&self, info: &HandshakeInfo) -> Result<()> {
        tracing::info!("New replica connection from source ID: {}", info.source_id);

        if info.last_epoch < 0 || info.last_seqno < 0 {
            tracing::info!("Replica log checking disabled; not checking for diverging histories");
            return Ok(());
        }

        match self.store.lookup(info.last_seqno, 0).await? {
            None => Err(Error::DivergedHistory {
                source_id: info.source_id.clone(),
                seqno: info.last_seqno,
                replica_epoch: info.last_epoch,
            }),
            Some(event) if event.epoch != info.last_epoch => Err(Error::EpochMismatch {
                source_id: info.source_id.clone(),
                seqno: info.last_seqno,
                master_epoch: event.epoch,
                replica_epoch: info.last_epoch,
            }),
            Some(_) => {
                tracing::info!(
                    "Log epoch numbers checked and match: source ID={} seqno={} epoch number={}",
                    info.source_id,
                    info.last_seqno,
                    info.last_epoch
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventlog::{LogEvent, MemoryStore, POSITION_UNKNOWN};

    async fn store_with_epochs() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        for seqno in 1..=10 {
            let epoch = if seqno <= 5 { 1 } else { 2 };
            store
                .append(LogEvent::single(seqno, epoch, "master-1", &b"x"[..]))
                .await
                .unwrap();
        }
        store
    }

    fn info(last_epoch: i64, last_seqno: i64) -> HandshakeInfo {
        HandshakeInfo {
            source_id: "replica-1".to_string(),
            last_epoch,
            last_seqno,
        }
    }

    #[tokio::test]
    async fn test_matching_position_succeeds() {
        let validator = PositionValidator::new(store_with_epochs().await);
        assert!(validator.validate(&info(1, 5)).await.is_ok());
        assert!(validator.validate(&info(2, 6)).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_position_skips_check() {
        let validator = PositionValidator::new(store_with_epochs().await);
        assert!(validator
            .validate(&info(POSITION_UNKNOWN, POSITION_UNKNOWN))
            .await
            .is_ok());
        // Either field negative disables the check
        assert!(validator.validate(&info(-1, 9999)).await.is_ok());
        assert!(validator.validate(&info(9999, -1)).await.is_ok());
    }

    #[tokio::test]
    async fn test_seqno_beyond_log_fails() {
        let validator = PositionValidator::new(store_with_epochs().await);
        let err = validator.validate(&info(2, 11)).await.unwrap_err();
        match err {
            Error::DivergedHistory {
                source_id,
                seqno,
                replica_epoch,
            } => {
                assert_eq!(source_id, "replica-1");
                assert_eq!(seqno, 11);
                assert_eq!(replica_epoch, 2);
            }
            other => panic!("Expected DivergedHistory, got {}", other),
        }
    }

    #[tokio::test]
    async fn test_epoch_mismatch_fails_citing_both_epochs() {
        let validator = PositionValidator::new(store_with_epochs().await);
        // Seqno 3 was written in epoch 1
        let err = validator.validate(&info(2, 3)).await.unwrap_err();
        assert!(err.is_divergence());

        let text = err.to_string();
        assert!(text.contains("master epoch number=1"));
        assert!(text.contains("replica epoch number=2"));
    }
}
