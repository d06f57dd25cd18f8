//! Streaming transport.
//!
//! The session engine talks to the service over a single full-duplex text
//! channel. [`StreamingTransport`] is the seam: the production
//! implementation is [`WsTransport`] (TLS WebSocket via
//! `tokio-tungstenite`), tests substitute a scripted double.
//!
//! A [`WsTransport`] owns one background I/O task. The task holds the
//! socket, forwards outbound frames, answers pings, queues inbound text
//! frames and flips the liveness signal to `false` the moment the socket
//! closes or errors.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::transport::CertificatePolicy;

// ── Channel capacities ───────────────────────────────────────────────

const OUTBOUND_CAPACITY: usize = 16;
const INBOUND_CAPACITY: usize = 64;

/// Close code reported when the socket drops without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;

// ── Traits ───────────────────────────────────────────────────────────

/// A connected, full-duplex text channel.
#[async_trait]
pub trait StreamingTransport: Send {
    /// Queue one text frame for sending.
    async fn send(&mut self, payload: String) -> Result<(), Error>;

    /// Wait for the next inbound text frame, at most `timeout`.
    async fn receive(&mut self, timeout: Duration) -> Result<String, Error>;

    /// Drop inbound frames that arrived but were never received, returning
    /// how many. Called before each command so a reply that missed its
    /// deadline cannot be taken for the next command's.
    fn discard_pending(&mut self) -> usize;

    fn is_connected(&self) -> bool;

    /// Liveness signal; flips to `false` when the channel drops.
    fn liveness(&self) -> watch::Receiver<bool>;

    /// Close the channel. Idempotent.
    async fn disconnect(&mut self);
}

/// Opens [`StreamingTransport`]s.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(&self, endpoint: &Url) -> Result<Box<dyn StreamingTransport>, Error>;
}

// ── WsConnector ──────────────────────────────────────────────────────

/// Production connector: TLS WebSocket, host checked against a
/// [`CertificatePolicy`] before the handshake.
#[derive(Debug, Clone)]
pub struct WsConnector {
    policy: CertificatePolicy,
    connect_timeout: Duration,
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(CertificatePolicy::default())
    }
}

impl WsConnector {
    pub fn new(policy: CertificatePolicy) -> Self {
        Self {
            policy,
            connect_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[async_trait]
impl TransportConnector for WsConnector {
    async fn connect(&self, endpoint: &Url) -> Result<Box<dyn StreamingTransport>, Error> {
        self.policy.check(endpoint)?;

        tracing::info!(url = %endpoint, "connecting streaming transport");

        let handshake = tokio_tungstenite::connect_async(endpoint.as_str());
        let (stream, _response) = tokio::time::timeout(self.connect_timeout, handshake)
            .await
            .map_err(|_| Error::Timeout {
                timeout_ms: millis(self.connect_timeout),
            })?
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        tracing::info!("streaming transport connected");
        Ok(Box::new(WsTransport::spawn(stream)))
    }
}

// ── WsTransport ──────────────────────────────────────────────────────

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Handle to a live WebSocket and its I/O task.
pub struct WsTransport {
    outbound: mpsc::Sender<String>,
    inbound: mpsc::Receiver<String>,
    alive: watch::Receiver<bool>,
    closed: Arc<OnceLock<(u16, String)>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl WsTransport {
    fn spawn(socket: Socket) -> Self {
        let (out_tx, out_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (in_tx, in_rx) = mpsc::channel(INBOUND_CAPACITY);
        let (alive_tx, alive_rx) = watch::channel(true);
        let closed = Arc::new(OnceLock::new());
        let cancel = CancellationToken::new();

        let task = tokio::spawn(io_loop(
            socket,
            out_rx,
            in_tx,
            alive_tx,
            Arc::clone(&closed),
            cancel.clone(),
        ));

        Self {
            outbound: out_tx,
            inbound: in_rx,
            alive: alive_rx,
            closed,
            cancel,
            task: Some(task),
        }
    }

    fn closed_error(&self) -> Error {
        let (code, reason) = self
            .closed
            .get()
            .cloned()
            .unwrap_or_else(|| (ABNORMAL_CLOSURE, "connection dropped".into()));
        Error::WebSocketClosed { code, reason }
    }
}

#[async_trait]
impl StreamingTransport for WsTransport {
    async fn send(&mut self, payload: String) -> Result<(), Error> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        self.outbound
            .send(payload)
            .await
            .map_err(|_| Error::NotConnected)
    }

    async fn receive(&mut self, timeout: Duration) -> Result<String, Error> {
        match tokio::time::timeout(timeout, self.inbound.recv()).await {
            Ok(Some(text)) => Ok(text),
            Ok(None) => Err(self.closed_error()),
            Err(_) => Err(Error::Timeout {
                timeout_ms: millis(timeout),
            }),
        }
    }

    fn discard_pending(&mut self) -> usize {
        let mut dropped = 0;
        while self.inbound.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }

    fn is_connected(&self) -> bool {
        *self.alive.borrow()
    }

    fn liveness(&self) -> watch::Receiver<bool> {
        self.alive.clone()
    }

    async fn disconnect(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── I/O task ─────────────────────────────────────────────────────────

async fn io_loop(
    socket: Socket,
    mut outbound: mpsc::Receiver<String>,
    inbound: mpsc::Sender<String>,
    alive: watch::Sender<bool>,
    closed: Arc<OnceLock<(u16, String)>>,
    cancel: CancellationToken,
) {
    let (mut write, mut read) = socket.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                let _ = closed.set((1000, "closed by client".into()));
                break;
            }
            msg = outbound.recv() => {
                let Some(text) = msg else { break };
                tracing::trace!(len = text.len(), "stream frame out");
                if let Err(e) = write.send(Message::text(text)).await {
                    tracing::warn!(error = %e, "stream send failed");
                    break;
                }
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        tracing::trace!(len = text.len(), "stream frame in");
                        if inbound.send(text.as_str().to_owned()).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            tracing::warn!(error = %e, "stream pong failed");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame.map_or_else(
                            || (ABNORMAL_CLOSURE, "closed without payload".to_owned()),
                            |cf| (u16::from(cf.code), cf.reason.as_str().to_owned()),
                        );
                        tracing::info!(code, %reason, "stream close frame received");
                        let _ = closed.set((code, reason));
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "stream read failed");
                        let _ = closed.set((ABNORMAL_CLOSURE, e.to_string()));
                        break;
                    }
                    None => {
                        tracing::info!("stream ended");
                        break;
                    }
                    // Binary, Pong, raw frames
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    alive.send_replace(false);
    tracing::debug!("stream I/O task exiting");
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connector_refuses_foreign_identity_before_dialing() {
        let connector = WsConnector::default();
        let endpoint = Url::parse("wss://stream.example.org/socket").unwrap();
        let Err(err) = connector.connect(&endpoint).await else {
            panic!("connect should have been refused");
        };
        assert!(matches!(err, Error::CertificateIdentity { .. }));
    }

    #[tokio::test]
    async fn connector_refuses_plaintext_by_default() {
        let connector = WsConnector::default();
        let endpoint = Url::parse("ws://awlclientproxy.mywaterfurnace.com/").unwrap();
        assert!(connector.connect(&endpoint).await.is_err());
    }

    #[test]
    fn millis_saturates() {
        assert_eq!(millis(Duration::from_millis(10_000)), 10_000);
        assert_eq!(millis(Duration::MAX), u64::MAX);
    }
}
