//! Connection Handler
//!
//! Owns one streaming session's task and lifecycle: `start` spawns the
//! session, `stop` cancels it and waits for the task to exit, and the
//! cleanup path (deregister, mark finished) runs exactly once no matter
//! how the session ended. A session failure never propagates beyond its
//! own handler; other replicas keep streaming.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::stream::registry::SessionRegistry;
use crate::stream::session::StreamSession;

/// Lifecycle owner for one replica connection
pub struct SessionHandler {
    id: u64,
    cancel: CancellationToken,
    registry: Arc<SessionRegistry>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    finished: AtomicBool,
    stop_timeout: Duration,
}

impl SessionHandler {
    /// Create a handler registered against the given registry
    pub fn new(registry: Arc<SessionRegistry>, stop_timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            id: registry.next_id(),
            cancel: CancellationToken::new(),
            registry,
            task: tokio::sync::Mutex::new(None),
            finished: AtomicBool::new(false),
            stop_timeout,
        })
    }

    /// Handler ID within the registry
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Token the session must observe at every blocking point
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Returns true once the session task has exited and cleanup ran
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Register and spawn the session task; returns immediately
    pub async fn start<S>(self: Arc<Self>, session: StreamSession<S>)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        self.registry.register(Arc::clone(&self));

        let this = Arc::clone(&self);
        let handle = tokio::spawn(async move {
            let result = session.run().await;
            this.log_outcome(&result);
            this.finish();
        });

        *self.task.lock().await = Some(handle);
    }

    /// Cancel the session and wait for its task to exit.
    ///
    /// Idempotent: a no-op once the handler has finished. The wait is
    /// bounded by the configured stop timeout; if that elapses the wait
    /// continues unbounded rather than leaking the task, and the
    /// cancellation token guarantees every blocking point inside the
    /// session has already been woken.
    pub async fn stop(&self) {
        if self.is_finished() {
            return;
        }

        self.cancel.cancel();

        let handle = self.task.lock().await.take();
        if let Some(mut handle) = handle {
            match tokio::time::timeout(self.stop_timeout, &mut handle).await {
                Ok(_) => {}
                Err(_) => {
                    tracing::warn!(
                        "Session {} still running after {:?}; waiting for it to exit",
                        self.id,
                        self.stop_timeout
                    );
                    let _ = handle.await;
                }
            }
        }
    }

    /// Single-execution cleanup shared by every exit path
    fn finish(&self) {
        self.registry.remove(self.id);
        self.finished.store(true, Ordering::SeqCst);
    }

    /// Map the session's exit cause to its log severity
    fn log_outcome(&self, result: &Result<()>) {
        match result {
            Ok(()) => {
                tracing::debug!("Session {} ended at end of stream", self.id);
            }
            Err(Error::Cancelled) | Err(Error::ShuttingDown) => {
                tracing::info!("Session {} cancelled", self.id);
            }
            Err(e) if e.is_disconnect() => {
                tracing::info!("Session {} terminated by replica disconnect", self.id);
            }
            Err(e) if e.is_divergence() => {
                tracing::error!("Session {} rejected diverged replica: {}", self.id, e);
            }
            Err(e @ Error::DeliveryGap { .. }) => {
                tracing::error!("Session {} terminated by delivery gap: {}", self.id, e);
            }
            Err(e @ Error::Io(_)) | Err(e @ Error::Network(_)) => {
                tracing::info!("Session {} terminated by i/o error: {}", self.id, e);
            }
            Err(e) => {
                tracing::error!("Session {} terminated by unexpected error: {}", self.id, e);
            }
        }
    }
}
