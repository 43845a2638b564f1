//! Stream Session
//!
//! The per-connection protocol state machine. A session performs the
//! handshake (advertise stored range, receive the replica's position,
//! validate it), then loops serving event requests: each request names a
//! start seqno and a prefetch range, and the session walks that window
//! fragment by fragment, waiting on the sequence gate before every
//! lookup so it can tail events that have not been written yet.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::eventlog::{EventStore, FragNo, Seqno};
use crate::gate::SequenceGate;
use crate::network::{read_message, write_message};
use crate::stream::protocol::{ErrorCode, Message};
use crate::stream::validator::PositionValidator;
use crate::stream::HandshakeInfo;

/// Session lifecycle states. Transitions only move forward; any
/// unrecoverable error jumps straight to `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Handshaking,
    Serving,
    Closed,
}

/// Per-connection streaming session
pub struct StreamSession<S> {
    reader: ReadHalf<S>,
    writer: WriteHalf<S>,
    store: Arc<dyn EventStore>,
    gate: Arc<SequenceGate>,
    cancel: CancellationToken,
    handshake_timeout: Option<Duration>,
    state: SessionState,
    source_id: Option<String>,
}

impl<S> StreamSession<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Create a session bound to a transport, log store and gate
    pub fn new(
        stream: S,
        store: Arc<dyn EventStore>,
        gate: Arc<SequenceGate>,
        cancel: CancellationToken,
    ) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            reader,
            writer,
            store,
            gate,
            cancel,
            handshake_timeout: None,
            state: SessionState::Connecting,
            source_id: None,
        }
    }

    /// Bound the handshake phase to the given duration
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }

    /// Run the session to completion.
    ///
    /// Returns `Ok` on a normal client disconnect, `Err(Cancelled)` on
    /// shutdown, and other errors for handshake or delivery failures.
    /// The transport is shut down on every exit path.
    pub async fn run(mut self) -> Result<()> {
        let result = self.run_inner().await;
        self.state = SessionState::Closed;

        // Flush and close our half of the stream; dropping the halves
        // releases the socket either way.
        let _ = self.writer.shutdown().await;

        if let Some(source) = &self.source_id {
            tracing::info!("Terminating replica connection from source ID: {}", source);
        }
        result
    }

    async fn run_inner(&mut self) -> Result<()> {
        self.state = SessionState::Handshaking;
        match self.handshake_timeout {
            Some(timeout) => tokio::time::timeout(timeout, self.handshake())
                .await
                .map_err(|_| Error::Network("Handshake timed out".into()))??,
            None => self.handshake().await?,
        }

        self.state = SessionState::Serving;
        while !self.cancel.is_cancelled() {
            let message = match self.recv().await {
                Ok(message) => message,
                Err(e) if e.is_disconnect() => {
                    tracing::info!("Replica went away while waiting for a request");
                    return Ok(());
                }
                Err(e) => return Err(e),
            };

            match message {
                Message::EventRequest {
                    seqno,
                    prefetch_range,
                } => {
                    tracing::debug!("Request {} range {}", seqno, prefetch_range);
                    self.stream_window(seqno, prefetch_range).await?;
                }
                other => {
                    let err = Error::Protocol(format!(
                        "Unexpected {} while serving",
                        other.type_name()
                    ));
                    self.send_error(ErrorCode::Protocol, &err.to_string()).await;
                    return Err(err);
                }
            }
        }

        Err(Error::Cancelled)
    }

    /// Exchange handshakes and validate the replica's claimed position
    async fn handshake(&mut self) -> Result<()> {
        let min_seqno = self.store.min_seqno().await?;
        let max_seqno = self.store.max_seqno().await?;
        write_message(
            &mut self.writer,
            &Message::Handshake {
                min_seqno,
                max_seqno,
            },
        )
        .await?;

        let info = match self.recv().await? {
            Message::HandshakeResponse {
                source_id,
                last_epoch,
                last_seqno,
            } => HandshakeInfo {
                source_id,
                last_epoch,
                last_seqno,
            },
            other => {
                let err = Error::Protocol(format!(
                    "Expected HandshakeResponse, got {}",
                    other.type_name()
                ));
                self.send_error(ErrorCode::Protocol, &err.to_string()).await;
                return Err(err);
            }
        };

        let validator = PositionValidator::new(Arc::clone(&self.store));
        if let Err(e) = validator.validate(&info).await {
            self.send_error(ErrorCode::DivergedHistory, &e.to_string())
                .await;
            return Err(e);
        }

        self.source_id = Some(info.source_id);
        Ok(())
    }

    /// Deliver `prefetch_range` events starting at `start`, fragment by
    /// fragment. A multi-fragment event advances the window cursor only
    /// on its last fragment, so the range counts events, not frames.
    async fn stream_window(&mut self, start: Seqno, prefetch_range: u64) -> Result<()> {
        let mut fragno: FragNo = 0;
        let mut i: u64 = 0;

        while i < prefetch_range {
            let target = start + i as Seqno;

            // Waiting here means a replica going away is only noticed
            // once the next event or two is extracted.
            tracing::debug!("Waiting for sequence number: {}", target);
            self.gate.wait_at_least(target, &self.cancel).await?;

            let event = match self.store.lookup(target, fragno).await? {
                Some(event) => event,
                None => {
                    // The gate released this seqno, so absence is a
                    // gate/store inconsistency, not a tailing race.
                    tracing::warn!(
                        "Requested event (#{}/{}) not found in log",
                        target,
                        fragno
                    );
                    let gap = Error::DeliveryGap {
                        seqno: target,
                        fragno,
                    };
                    self.send_error(ErrorCode::DeliveryGap, &gap.to_string())
                        .await;
                    return Err(gap);
                }
            };

            write_message(
                &mut self.writer,
                &Message::Event {
                    payload: event.payload.to_vec(),
                },
            )
            .await?;

            if event.last_frag {
                i += 1;
                fragno = 0;
            } else {
                fragno += 1;
            }
        }

        Ok(())
    }

    /// Receive one message, waking promptly on cancellation
    async fn recv(&mut self) -> Result<Message> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            message = read_message(&mut self.reader) => message,
        }
    }

    /// Best-effort terminal error notice; the session is closing anyway
    async fn send_error(&mut self, code: ErrorCode, message: &str) {
        let notice = Message::Error {
            code,
            message: message.to_string(),
        };
        if let Err(e) = write_message(&mut self.writer, &notice).await {
            tracing::debug!("Could not deliver {} notice: {}", code, e);
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        self.state
    }
}
