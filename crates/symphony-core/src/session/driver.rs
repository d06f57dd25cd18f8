// ── Session background task ──
//
// One iteration: make sure a web session and an authenticated stream
// exist (establishing whatever is missing), then run one polling cycle.
// Failures never end the task; they are logged, the state machine drops
// back to `Disconnected`, and the next iteration starts over. An expired
// web session is renewed in place; the host only hears about it if the
// renewal fails.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use secrecy::ExposeSecret;
use symphony_api::protocol::{self, LoginResponse, Request};
use symphony_api::{Gateway, StreamingTransport};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{BridgeInner, Session, SessionState};
use crate::diff::diff;
use crate::error::CoreError;
use crate::model::UnitRecord;
use crate::poll::{self, Cycle};
use crate::setpoint::SetpointQueues;
use crate::transaction::TransactionCounter;

pub(super) struct Driver {
    shared: Arc<BridgeInner>,
    cancel: CancellationToken,
    queues: SetpointQueues,
    session: Option<Session>,
    stream: Option<Box<dyn StreamingTransport>>,
    liveness: Option<watch::Receiver<bool>>,
    /// Roster from the last successful streaming login.
    roster: Vec<Gateway>,
    counter: TransactionCounter,
}

impl Driver {
    pub(super) fn new(
        shared: Arc<BridgeInner>,
        cancel: CancellationToken,
        queues: SetpointQueues,
    ) -> Self {
        Self {
            roster: shared.registry.all().iter().map(|record| roster_entry(record)).collect(),
            shared,
            cancel,
            queues,
            session: None,
            stream: None,
            liveness: None,
            counter: TransactionCounter::new(),
        }
    }

    /// Run until cancelled, then hand the setpoint queues back.
    pub(super) async fn run(mut self) -> SetpointQueues {
        let cancel = self.cancel.clone();
        let interval = self.shared.config.poll_interval;
        debug!("session task started");

        loop {
            if cancel.is_cancelled() {
                break;
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = self.iterate() => {}
            }

            let mut liveness = self.liveness.clone();
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
                () = stream_lost(liveness.as_mut()) => debug!("stream dropped while idle"),
            }
        }

        self.tear_down().await;
        debug!("session task exiting");
        self.queues
    }

    // ── Iteration ────────────────────────────────────────────────────

    async fn iterate(&mut self) {
        if let Err(e) = self.ensure_ready().await {
            warn!(
                error = %e,
                retry_in = ?self.shared.config.poll_interval,
                "session not ready"
            );
            self.set_state(SessionState::Disconnected);
            self.go_offline();
            return;
        }

        match self.poll().await {
            Ok(report) => {
                self.shared.last_cycle.send_replace(Some(report));
            }
            Err(e) => {
                warn!(error = %e, "poll cycle failed, restarting session");
                self.tear_down().await;
            }
        }
    }

    fn is_ready(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.authenticated)
            && self.stream.as_ref().is_some_and(|s| s.is_connected())
    }

    /// Walk the state machine up to `Ready`.
    async fn ensure_ready(&mut self) -> Result<(), CoreError> {
        if self.session.as_ref().is_some_and(Session::is_expired) {
            // Renewed without telling the host; units stay online unless
            // the renewal fails.
            info!("web session expired, logging in again");
            self.close().await;
        }
        if self.stream.as_ref().is_some_and(|s| !s.is_connected()) {
            info!("stream disconnected");
            self.tear_down().await;
        }
        if self.is_ready() {
            return Ok(());
        }

        if self.session.is_none() {
            self.set_state(SessionState::WebAuthenticating);
            let credentials = self.shared.credentials.load_full();
            let session_id = self
                .shared
                .web
                .login(&credentials.username, &credentials.password)
                .await?;
            self.session = Some(Session::new(session_id, self.shared.config.session_timeout));
            info!(user = %credentials.username, "web login succeeded");
        }

        // A previous half-open stream is useless without a handshake.
        if let Some(mut stale) = self.stream.take() {
            stale.disconnect().await;
        }
        self.liveness = None;

        self.set_state(SessionState::StreamConnecting);
        let endpoint = self.shared.web.discover_endpoint().await?;
        let mut stream = self.shared.connector.connect(&endpoint).await?;

        self.set_state(SessionState::StreamAuthenticating);
        let gateways = match self.handshake(stream.as_mut()).await {
            Ok(gateways) => gateways,
            Err(e) => {
                stream.disconnect().await;
                if matches!(e, CoreError::AuthenticationFailed { .. }) {
                    // The service refused this session id; get a new one.
                    self.session = None;
                }
                return Err(e);
            }
        };

        self.liveness = Some(stream.liveness());
        self.stream = Some(stream);
        if let Some(session) = self.session.as_mut() {
            session.authenticated = true;
        }
        self.sync_roster(gateways);

        self.set_state(SessionState::Ready);
        if !self.shared.connectivity.send_replace(true) {
            info!(units = self.shared.registry.len(), "connected to Symphony");
            self.shared.surface.connectivity_changed(true);
        }
        Ok(())
    }

    /// Streaming login. Returns the flattened roster on success.
    async fn handshake(
        &mut self,
        stream: &mut dyn StreamingTransport,
    ) -> Result<Vec<Gateway>, CoreError> {
        self.counter = TransactionCounter::new();
        let session = self.session.as_ref().ok_or(CoreError::NotReady)?;
        let request = Request::login(session.session_id.expose_secret(), self.counter.next());

        let reply = poll::exchange(
            stream,
            &request,
            self.shared.config.receive_timeout,
            self.shared.verbose.load(Ordering::Relaxed),
        )
        .await?;
        let response: LoginResponse = protocol::decode(&reply)?;

        if !response.success {
            return Err(CoreError::AuthenticationFailed {
                message: format!(
                    "streaming login rejected: {}",
                    response.err.as_deref().unwrap_or("no reason given")
                ),
            });
        }

        debug!(
            locations = response.locations.len(),
            "streaming login accepted"
        );
        Ok(response.gateways())
    }

    fn sync_roster(&mut self, gateways: Vec<Gateway>) {
        let changes = diff(&self.roster, &gateways);
        self.shared.registry.apply_diff(&changes);
        self.roster = gateways;
    }

    async fn poll(&mut self) -> Result<poll::CycleReport, CoreError> {
        let (Some(session), Some(stream)) = (self.session.as_ref(), self.stream.as_mut()) else {
            return Err(CoreError::NotReady);
        };

        Cycle {
            transport: stream.as_mut(),
            session_id: session.session_id.expose_secret(),
            counter: &self.counter,
            registry: &self.shared.registry,
            receive_timeout: self.shared.config.receive_timeout,
            verbose: self.shared.verbose.load(Ordering::Relaxed),
        }
        .run(&mut self.queues)
        .await
    }

    // ── Teardown ─────────────────────────────────────────────────────

    /// Drop the stream and the web session, force units offline.
    async fn tear_down(&mut self) {
        self.close().await;
        self.set_state(SessionState::Disconnected);
        self.go_offline();
    }

    /// Drop the stream and the web session.
    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.disconnect().await;
        }
        self.liveness = None;
        self.session = None;
    }

    /// Tell the host the service is gone. No-op unless it was connected.
    ///
    /// Units and the surface are updated before the flag flips, so a
    /// watcher of `connectivity` sees them already offline.
    fn go_offline(&self) {
        if !*self.shared.connectivity.borrow() {
            return;
        }
        self.shared.registry.set_all_offline();
        info!("disconnected from Symphony");
        self.shared.surface.connectivity_changed(false);
        self.shared.connectivity.send_replace(false);
    }

    fn set_state(&self, next: SessionState) {
        let changed = self.shared.state.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        });
        if changed {
            debug!(state = %next, "session state");
        }
    }
}

/// Resolves once the stream reports it is gone; never without a stream.
async fn stream_lost(liveness: Option<&mut watch::Receiver<bool>>) {
    match liveness {
        Some(rx) => {
            let _ = rx.wait_for(|alive| !*alive).await;
        }
        None => std::future::pending().await,
    }
}

/// Minimal roster entry for a unit the registry already knows, so a
/// restarted task diffs against what is registered.
fn roster_entry(record: &UnitRecord) -> Gateway {
    Gateway {
        gateway_id: record.awl_id.clone(),
        thermostat_name: Some(record.display_name.clone()),
        online: record.online,
        ..Gateway::default()
    }
}
