//! Sequence Gate
//!
//! A monotonically increasing counter with a blocking "wait until at
//! least N" operation. The log writer advances the gate after each
//! durable append; streaming sessions wait on it to tail the log without
//! polling. Built on a watch channel so waiters are woken by broadcast
//! and a wait that is already satisfied returns immediately.

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::eventlog::{Seqno, POSITION_UNKNOWN};

/// Broadcast counter gating event delivery on durable appends
#[derive(Debug)]
pub struct SequenceGate {
    current: watch::Sender<Seqno>,
}

impl SequenceGate {
    /// Create a gate at the given sequence number
    pub fn new(initial: Seqno) -> Self {
        let (current, _) = watch::channel(initial);
        Self { current }
    }

    /// Create a gate at the "nothing stored" position
    pub fn empty() -> Self {
        Self::new(POSITION_UNKNOWN)
    }

    /// Highest sequence number the gate has been advanced to
    pub fn current(&self) -> Seqno {
        *self.current.borrow()
    }

    /// Advance the gate to `seqno` if it is ahead of the current value.
    ///
    /// Called by the log-writing side after a durable append. Waiters at
    /// or below the new value are released; a lower or equal value is a
    /// no-op and wakes nobody.
    pub fn advance(&self, seqno: Seqno) {
        self.current.send_if_modified(|current| {
            if seqno > *current {
                *current = seqno;
                true
            } else {
                false
            }
        });
    }

    /// Block until the gate reaches at least `seqno` or `cancel` fires.
    ///
    /// Returns immediately when the gate is already at or past `seqno`.
    /// Any number of sessions may wait concurrently on the same or
    /// different thresholds.
    pub async fn wait_at_least(&self, seqno: Seqno, cancel: &CancellationToken) -> Result<()> {
        let mut rx = self.current.subscribe();

        loop {
            // borrow_and_update marks the current value seen, so an
            // advance racing with the check below still flags changed()
            if *rx.borrow_and_update() >= seqno {
                return Ok(());
            }

            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                changed = rx.changed() => {
                    changed.map_err(|_| Error::ShuttingDown)?;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_already_satisfied_returns_immediately() {
        let gate = SequenceGate::new(10);
        let cancel = CancellationToken::new();

        // Advance-then-wait must never block
        let result = tokio::time::timeout(
            Duration::from_millis(100),
            gate.wait_at_least(10, &cancel),
        )
        .await;
        assert!(result.is_ok());

        let result = tokio::time::timeout(
            Duration::from_millis(100),
            gate.wait_at_least(5, &cancel),
        )
        .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_wait_blocks_until_advance() {
        let gate = Arc::new(SequenceGate::new(0));
        let cancel = CancellationToken::new();

        let waiter = {
            let gate = Arc::clone(&gate);
            let cancel = cancel.clone();
            tokio::spawn(async move { gate.wait_at_least(3, &cancel).await })
        };

        // Not released by an insufficient advance
        gate.advance(2);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        gate.advance(3);
        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_waiters_mixed_thresholds() {
        let gate = Arc::new(SequenceGate::new(0));
        let cancel = CancellationToken::new();

        let mut waiters = Vec::new();
        for threshold in [1, 5, 5, 9] {
            let gate = Arc::clone(&gate);
            let cancel = cancel.clone();
            waiters.push(tokio::spawn(async move {
                gate.wait_at_least(threshold, &cancel).await
            }));
        }

        gate.advance(9);
        for waiter in waiters {
            let result = tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .unwrap()
                .unwrap();
            assert!(result.is_ok());
        }
    }

    #[tokio::test]
    async fn test_advance_is_monotonic() {
        let gate = SequenceGate::new(7);
        gate.advance(3);
        assert_eq!(gate.current(), 7);
        gate.advance(12);
        assert_eq!(gate.current(), 12);
    }

    #[tokio::test]
    async fn test_cancel_wakes_blocked_waiter() {
        let gate = Arc::new(SequenceGate::new(0));
        let cancel = CancellationToken::new();

        let waiter = {
            let gate = Arc::clone(&gate);
            let cancel = cancel.clone();
            tokio::spawn(async move { gate.wait_at_least(100, &cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
