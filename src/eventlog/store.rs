//! Event Store Access
//!
//! The read interface streaming sessions use to fetch events, plus an
//! in-memory implementation for tests and embedded use. Lookups are
//! concurrent-safe; sessions never coordinate around the store.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::event::{FragNo, LogEvent, Seqno, POSITION_UNKNOWN};
use crate::error::{Error, Result};

/// Read access to the transaction history log.
///
/// Append happens elsewhere (the log writer path); sessions only look
/// events up by position and query the stored range.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Look up a stored fragment by position
    async fn lookup(&self, seqno: Seqno, fragno: FragNo) -> Result<Option<LogEvent>>;

    /// Lowest stored sequence number, [`POSITION_UNKNOWN`] when empty
    async fn min_seqno(&self) -> Result<Seqno>;

    /// Highest stored sequence number, [`POSITION_UNKNOWN`] when empty
    async fn max_seqno(&self) -> Result<Seqno>;
}

/// In-memory event store keyed by `(seqno, fragno)`.
///
/// Backs the test suite and small embedded deployments; production
/// deployments put a durable log implementation behind [`EventStore`].
pub struct MemoryStore {
    events: RwLock<BTreeMap<(Seqno, FragNo), LogEvent>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            events: RwLock::new(BTreeMap::new()),
        }
    }

    /// Append one fragment.
    ///
    /// Enforces the fragment invariant: within a sequence number, fragnos
    /// are contiguous from 0 and nothing may follow the last fragment.
    pub async fn append(&self, event: LogEvent) -> Result<()> {
        let mut events = self.events.write().await;

        let seqno = event.seqno;
        let expected: FragNo = match events.range((seqno, 0)..=(seqno, FragNo::MAX)).next_back() {
            Some(((_, fragno), prev)) => {
                if prev.last_frag {
                    return Err(Error::Store(format!(
                        "event #{} is already complete at fragno {}",
                        seqno, fragno
                    )));
                }
                fragno + 1
            }
            None => 0,
        };

        if event.fragno != expected {
            return Err(Error::FragmentOrder {
                seqno,
                expected,
                got: event.fragno,
            });
        }

        events.insert((seqno, event.fragno), event);
        Ok(())
    }

    /// Append every fragment of a logical event
    pub async fn append_all(&self, fragments: Vec<LogEvent>) -> Result<()> {
        for fragment in fragments {
            self.append(fragment).await?;
        }
        Ok(())
    }

    /// Number of stored fragments
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    /// Check whether the store holds no fragments
    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn lookup(&self, seqno: Seqno, fragno: FragNo) -> Result<Option<LogEvent>> {
        let events = self.events.read().await;
        Ok(events.get(&(seqno, fragno)).cloned())
    }

    async fn min_seqno(&self) -> Result<Seqno> {
        let events = self.events.read().await;
        Ok(events
            .keys()
            .next()
            .map(|(seqno, _)| *seqno)
            .unwrap_or(POSITION_UNKNOWN))
    }

    async fn max_seqno(&self) -> Result<Seqno> {
        let events = self.events.read().await;
        Ok(events
            .keys()
            .next_back()
            .map(|(seqno, _)| *seqno)
            .unwrap_or(POSITION_UNKNOWN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_store_range() {
        let store = MemoryStore::new();
        assert_eq!(store.min_seqno().await.unwrap(), POSITION_UNKNOWN);
        assert_eq!(store.max_seqno().await.unwrap(), POSITION_UNKNOWN);
        assert!(store.lookup(1, 0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_append_and_lookup() {
        let store = MemoryStore::new();
        for seqno in 1..=5 {
            store
                .append(LogEvent::single(seqno, 1, "master-1", &b"data"[..]))
                .await
                .unwrap();
        }

        assert_eq!(store.min_seqno().await.unwrap(), 1);
        assert_eq!(store.max_seqno().await.unwrap(), 5);

        let event = store.lookup(3, 0).await.unwrap().unwrap();
        assert_eq!(event.seqno, 3);
        assert!(store.lookup(3, 1).await.unwrap().is_none());
        assert!(store.lookup(6, 0).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fragment_order_enforced() {
        let store = MemoryStore::new();

        // First fragment must be fragno 0
        let out_of_order = LogEvent::fragment(9, 1, false, 1, "master-1", &b"x"[..]);
        assert!(matches!(
            store.append(out_of_order).await,
            Err(Error::FragmentOrder { expected: 0, .. })
        ));

        store
            .append(LogEvent::fragment(9, 0, false, 1, "master-1", &b"a"[..]))
            .await
            .unwrap();

        // Skipping a fragment index is rejected
        let skipped = LogEvent::fragment(9, 2, true, 1, "master-1", &b"c"[..]);
        assert!(store.append(skipped).await.is_err());

        store
            .append(LogEvent::fragment(9, 1, true, 1, "master-1", &b"b"[..]))
            .await
            .unwrap();

        // Nothing may follow the last fragment
        let extra = LogEvent::fragment(9, 2, true, 1, "master-1", &b"d"[..]);
        assert!(store.append(extra).await.is_err());
    }
}
