//! Session Registry
//!
//! Tracks the live connection handlers so the server can account for
//! them and stop them all on shutdown. Handlers register on start and
//! deregister from their own cleanup path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::handler::SessionHandler;

/// Registry of active session handlers
pub struct SessionRegistry {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<u64, Arc<SessionHandler>>>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            handlers: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate a handler ID
    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Track a handler until it deregisters
    pub fn register(&self, handler: Arc<SessionHandler>) {
        let mut handlers = self.handlers.lock();
        handlers.insert(handler.id(), handler);
    }

    /// Drop a handler from tracking
    pub fn remove(&self, id: u64) {
        let mut handlers = self.handlers.lock();
        handlers.remove(&id);
    }

    /// Number of live handlers
    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Check whether any handlers are live
    pub fn is_empty(&self) -> bool {
        self.handlers.lock().is_empty()
    }

    /// Snapshot of the live handlers
    pub fn handlers(&self) -> Vec<Arc<SessionHandler>> {
        self.handlers.lock().values().cloned().collect()
    }

    /// Stop every live handler and wait for each to exit.
    ///
    /// The lock is released before any `stop()` await so handler cleanup
    /// can deregister concurrently.
    pub async fn shutdown_all(&self) {
        let handlers = self.handlers();
        if !handlers.is_empty() {
            tracing::info!("Stopping {} active replica session(s)", handlers.len());
        }
        for handler in handlers {
            handler.stop().await;
        }
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_ids_are_unique() {
        let registry = SessionRegistry::new();
        let a = registry.next_id();
        let b = registry.next_id();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_register_remove() {
        let registry = Arc::new(SessionRegistry::new());
        let handler = SessionHandler::new(Arc::clone(&registry), Duration::from_secs(10));
        let id = handler.id();

        registry.register(Arc::clone(&handler));
        assert_eq!(registry.len(), 1);

        registry.remove(id);
        assert!(registry.is_empty());

        // Removing twice is harmless
        registry.remove(id);
        assert!(registry.is_empty());
    }
}
