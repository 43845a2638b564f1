//! Replication Server
//!
//! TCP server accepting replica connections. Each accepted socket gets
//! its own session handler; a failure in any one session leaves the
//! server and every other session running.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::ReplogConfig;
use crate::error::Result;
use crate::eventlog::EventStore;
use crate::gate::SequenceGate;
use crate::stream::{SessionHandler, SessionRegistry, StreamSession};

/// Streaming server for replica connections
pub struct ReplicationServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: ReplogConfig,
    store: Arc<dyn EventStore>,
    gate: Arc<SequenceGate>,
    registry: Arc<SessionRegistry>,
    shutdown: tokio::sync::watch::Sender<bool>,
}

impl ReplicationServer {
    /// Bind the listener; call [`serve`](Self::serve) to start accepting
    pub async fn bind(
        config: ReplogConfig,
        store: Arc<dyn EventStore>,
        gate: Arc<SequenceGate>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(&config.server.bind_address).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown, _) = tokio::sync::watch::channel(false);

        Ok(Self {
            listener,
            local_addr,
            config,
            store,
            gate,
            registry: Arc::new(SessionRegistry::new()),
            shutdown,
        })
    }

    /// Address the server is listening on
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Registry of live sessions
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Accept replica connections until shutdown
    pub async fn serve(&self) -> Result<()> {
        tracing::info!("Replication server listening on {}", self.local_addr);

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            // Also covers a shutdown requested before this loop subscribed
            if *shutdown_rx.borrow_and_update() {
                break;
            }

            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((socket, addr)) => {
                            if let Err(e) = socket.set_nodelay(true) {
                                tracing::warn!("Could not set nodelay for {}: {}", addr, e);
                            }
                            tracing::debug!("New replica connection from {}", addr);

                            let handler = SessionHandler::new(
                                Arc::clone(&self.registry),
                                self.config.stop_timeout(),
                            );
                            let mut session = StreamSession::new(
                                socket,
                                Arc::clone(&self.store),
                                Arc::clone(&self.gate),
                                handler.cancel_token(),
                            );
                            if let Some(timeout) = self.config.handshake_timeout() {
                                session = session.with_handshake_timeout(timeout);
                            }
                            handler.start(session).await;
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.changed() => {}
            }
        }

        tracing::info!("Replication server stopped");
        Ok(())
    }

    /// Stop accepting connections and stop every live session
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        self.registry.shutdown_all().await;
    }
}
