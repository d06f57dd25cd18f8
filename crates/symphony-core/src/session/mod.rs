// ── Session manager ──
//
// Owns the account credentials, the web session and the streaming
// connection, and drives them through one background task. `Bridge` is the
// host-facing handle; the task itself lives in `driver`.

mod driver;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use arc_swap::ArcSwap;
use chrono::{DateTime, TimeDelta, Utc};
use secrecy::SecretString;
use serde::Serialize;
use strum::Display;
use symphony_api::{TransportConfig, TransportConnector, WebClient, WsConnector};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{BridgeConfig, Credentials};
use crate::device::DeviceSurface;
use crate::error::CoreError;
use crate::poll::CycleReport;
use crate::registry::UnitRegistry;
use crate::setpoint::{self, SetpointHandle, SetpointQueues};

use self::driver::Driver;

// ── SessionState ─────────────────────────────────────────────────────

/// Where the session state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum SessionState {
    Disconnected,
    WebAuthenticating,
    StreamConnecting,
    StreamAuthenticating,
    Ready,
}

// ── Session ──────────────────────────────────────────────────────────

/// Outcome of a web login. At most one exists at a time.
pub(crate) struct Session {
    session_id: SecretString,
    /// Set once the streaming login accepted this session id.
    authenticated: bool,
    expires_at: DateTime<Utc>,
}

impl Session {
    fn new(session_id: SecretString, lifetime: Duration) -> Self {
        let now = Utc::now();
        let expires_at = TimeDelta::from_std(lifetime)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            session_id,
            authenticated: false,
            expires_at,
        }
    }

    fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

// ── Bridge ───────────────────────────────────────────────────────────

/// Host-facing handle to the engine.
///
/// Cheaply cloneable via `Arc<BridgeInner>`. Created idle; call
/// [`start()`](Self::start) to spawn the background task and
/// [`stop()`](Self::stop) to tear everything down again.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    config: BridgeConfig,
    credentials: ArcSwap<Credentials>,
    verbose: AtomicBool,
    web: WebClient,
    connector: Arc<dyn TransportConnector>,
    surface: Arc<dyn DeviceSurface>,
    registry: Arc<UnitRegistry>,
    setpoints: SetpointHandle,
    queues: Mutex<Option<SetpointQueues>>,
    state: watch::Sender<SessionState>,
    connectivity: watch::Sender<bool>,
    last_cycle: watch::Sender<Option<CycleReport>>,
    worker: Mutex<Option<Worker>>,
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<SetpointQueues>,
}

impl Bridge {
    /// Bridge talking to the production service over TLS WebSockets.
    pub fn new(config: BridgeConfig, surface: Arc<dyn DeviceSurface>) -> Result<Self, CoreError> {
        let connector = WsConnector::new(config.certificate_policy())
            .with_connect_timeout(config.http_timeout);
        Self::with_connector(config, surface, Arc::new(connector))
    }

    /// Bridge with a caller-supplied streaming connector.
    pub fn with_connector(
        config: BridgeConfig,
        surface: Arc<dyn DeviceSurface>,
        connector: Arc<dyn TransportConnector>,
    ) -> Result<Self, CoreError> {
        config.validate()?;

        let transport = TransportConfig {
            timeout: config.http_timeout,
        };
        let web = WebClient::new(config.endpoints.clone(), &transport)?;
        let (setpoints, queues) = setpoint::channel();
        let registry = Arc::new(UnitRegistry::new(
            Arc::clone(&surface),
            Arc::new(setpoints.clone()),
        ));
        let (state, _) = watch::channel(SessionState::Disconnected);
        let (connectivity, _) = watch::channel(false);
        let (last_cycle, _) = watch::channel(None);

        Ok(Self {
            inner: Arc::new(BridgeInner {
                credentials: ArcSwap::from_pointee(config.credentials.clone()),
                verbose: AtomicBool::new(config.verbose_protocol),
                config,
                web,
                connector,
                surface,
                registry,
                setpoints,
                queues: Mutex::new(Some(queues)),
                state,
                connectivity,
                last_cycle,
                worker: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the background task. A no-op while it is already running.
    pub async fn start(&self) -> Result<(), CoreError> {
        let mut worker = self.inner.worker.lock().await;
        if worker.is_some() {
            debug!("bridge already running");
            return Ok(());
        }

        let queues = self
            .inner
            .queues
            .lock()
            .await
            .take()
            .ok_or_else(|| CoreError::Internal("setpoint queues were lost".into()))?;

        let cancel = CancellationToken::new();
        let driver = Driver::new(Arc::clone(&self.inner), cancel.clone(), queues);
        *worker = Some(Worker {
            cancel,
            handle: tokio::spawn(driver.run()),
        });

        info!("bridge started");
        Ok(())
    }

    /// Cancel the background task, wait for it, and drop all session state.
    ///
    /// The registry survives a stop, so a later `start()` reconciles
    /// against the roster it already knows.
    pub async fn stop(&self) {
        let Some(worker) = self.inner.worker.lock().await.take() else {
            return;
        };

        worker.cancel.cancel();
        match worker.handle.await {
            Ok(queues) => *self.inner.queues.lock().await = Some(queues),
            Err(e) => warn!(error = %e, "session task ended abnormally"),
        }

        self.inner.state.send_replace(SessionState::Disconnected);
        info!("bridge stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.inner.worker.lock().await.is_some()
    }

    // ── Observation ──────────────────────────────────────────────────

    /// Subscribe to state machine transitions.
    pub fn state(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn current_state(&self) -> SessionState {
        *self.inner.state.borrow()
    }

    /// Subscribe to connectivity changes (`true` while `Ready`).
    pub fn connectivity(&self) -> watch::Receiver<bool> {
        self.inner.connectivity.subscribe()
    }

    /// Subscribe to per-cycle reports.
    pub fn cycles(&self) -> watch::Receiver<Option<CycleReport>> {
        self.inner.last_cycle.subscribe()
    }

    pub fn registry(&self) -> &Arc<UnitRegistry> {
        &self.inner.registry
    }

    /// Handle for queueing setpoints from any thread.
    pub fn setpoints(&self) -> SetpointHandle {
        self.inner.setpoints.clone()
    }

    // ── Runtime overrides ────────────────────────────────────────────

    /// Replace the username; used from the next web login on.
    pub fn override_username(&self, username: impl Into<String>) {
        let username = username.into();
        self.inner.credentials.rcu(|current| Credentials {
            username: username.clone(),
            password: current.password.clone(),
        });
    }

    /// Replace the password; used from the next web login on.
    pub fn override_password(&self, password: SecretString) {
        self.inner.credentials.rcu(|current| Credentials {
            username: current.username.clone(),
            password: password.clone(),
        });
    }

    pub fn username(&self) -> String {
        self.inner.credentials.load().username.clone()
    }

    /// Toggle protocol payload logging.
    pub fn set_verbose(&self, verbose: bool) {
        self.inner.verbose.store(verbose, Ordering::Relaxed);
    }

    pub fn is_verbose(&self) -> bool {
        self.inner.verbose.load(Ordering::Relaxed)
    }
}
