// Shared test doubles: a scripted streaming transport, its connector, and a
// device surface that records every call.

#![allow(clippy::unwrap_used, dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::{Value, json};
use tokio::sync::watch;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use symphony_api::{Error, ReadResponse, StreamingTransport, TransportConnector, WebEndpoints};
use symphony_core::{
    BridgeConfig, ConnectableDevice, Credentials, DeviceSurface, PlatformProtocol, UnitId,
    UnitRecord,
};

// ── Scripted transport ──────────────────────────────────────────────

/// What the fake service does with one command.
pub enum Reply {
    Json(Value),
    /// Answer after the receive gave up: the frame lands right after the
    /// next command is sent.
    Late(Value),
    /// Answer, then send the same frame again unprompted.
    Twice(Value),
    /// Never answer; the receive runs into its timeout.
    Hang,
    /// Drop the connection.
    Close,
}

pub type Script = Arc<dyn Fn(&Value) -> Reply + Send + Sync>;

pub struct MockTransport {
    script: Script,
    sent: Arc<Mutex<Vec<Value>>>,
    pending: VecDeque<Reply>,
    /// Frames on the wire that nobody has received yet.
    arrived: VecDeque<Value>,
    late: Option<Value>,
    alive: Arc<watch::Sender<bool>>,
}

#[async_trait]
impl StreamingTransport for MockTransport {
    async fn send(&mut self, payload: String) -> Result<(), Error> {
        if !*self.alive.borrow() {
            return Err(Error::NotConnected);
        }
        let value: Value = serde_json::from_str(&payload).unwrap();
        self.pending.push_back((self.script)(&value));
        self.sent.lock().unwrap().push(value);
        if let Some(late) = self.late.take() {
            self.arrived.push_back(late);
        }
        Ok(())
    }

    async fn receive(&mut self, timeout: Duration) -> Result<String, Error> {
        if let Some(frame) = self.arrived.pop_front() {
            return Ok(frame.to_string());
        }
        match self.pending.pop_front() {
            Some(Reply::Json(value)) => Ok(value.to_string()),
            Some(Reply::Twice(value)) => {
                self.arrived.push_back(value.clone());
                Ok(value.to_string())
            }
            Some(Reply::Late(value)) => {
                tokio::time::sleep(timeout).await;
                self.late = Some(value);
                Err(Error::Timeout {
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap(),
                })
            }
            Some(Reply::Close) => {
                self.alive.send_replace(false);
                Err(Error::WebSocketClosed {
                    code: 1006,
                    reason: "closed by fake service".into(),
                })
            }
            Some(Reply::Hang) | None => {
                tokio::time::sleep(timeout).await;
                Err(Error::Timeout {
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap(),
                })
            }
        }
    }

    fn discard_pending(&mut self) -> usize {
        let dropped = self.arrived.len();
        self.arrived.clear();
        dropped
    }

    fn is_connected(&self) -> bool {
        *self.alive.borrow()
    }

    fn liveness(&self) -> watch::Receiver<bool> {
        self.alive.subscribe()
    }

    async fn disconnect(&mut self) {
        self.alive.send_replace(false);
    }
}

impl MockTransport {
    pub fn new(script: Script) -> (Self, Arc<Mutex<Vec<Value>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let (alive, _) = watch::channel(true);
        (
            Self {
                script,
                sent: Arc::clone(&sent),
                pending: VecDeque::new(),
                arrived: VecDeque::new(),
                late: None,
                alive: Arc::new(alive),
            },
            sent,
        )
    }
}

/// Hands out scripted transports and keeps a kill switch for each.
pub struct MockConnector {
    script: Mutex<Script>,
    pub sent: Arc<Mutex<Vec<Value>>>,
    connections: Mutex<Vec<Arc<watch::Sender<bool>>>>,
    connects: AtomicUsize,
    fail: AtomicBool,
}

impl MockConnector {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            sent: Arc::new(Mutex::new(Vec::new())),
            connections: Mutex::new(Vec::new()),
            connects: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        })
    }

    pub fn set_script(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Drop the most recent connection from the service side.
    pub fn kill_current(&self) {
        if let Some(alive) = self.connections.lock().unwrap().last() {
            alive.send_replace(false);
        }
    }

    pub fn current_alive(&self) -> Option<bool> {
        self.connections
            .lock()
            .unwrap()
            .last()
            .map(|alive| *alive.borrow())
    }

    pub fn sent_commands(&self, cmd: &str) -> Vec<Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|v| v["cmd"] == cmd)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TransportConnector for MockConnector {
    async fn connect(&self, _endpoint: &Url) -> Result<Box<dyn StreamingTransport>, Error> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::WebSocketConnect("connection refused".into()));
        }
        let script = Arc::clone(&*self.script.lock().unwrap());
        let (mut transport, _) = MockTransport::new(script);
        transport.sent = Arc::clone(&self.sent);
        self.connections
            .lock()
            .unwrap()
            .push(Arc::clone(&transport.alive));
        Ok(Box::new(transport))
    }
}

// ── Fake service ────────────────────────────────────────────────────

pub fn gateway(id: &str, name: &str) -> Value {
    json!({ "gwid": id, "tstat_name": name, "online": true, "awlabctype": 3 })
}

pub fn read_reply(awl_id: &str) -> Value {
    json!({
        "rsp": "read",
        "awlid": awl_id,
        "modeofoperation": 5,
        "awlabctype": 3,
        "actualcompressorspeed": 6,
        "tstatroomtemp": 69.5,
        "totalunitpower": 1800,
        "activesettings": { "activemode": 3, "heatingsp_read": 69, "coolingsp_read": 75 }
    })
}

/// `reply` stamped with the command's transaction id, as the service does.
pub fn answering(cmd: &Value, mut reply: Value) -> Value {
    reply["tid"] = cmd["tid"].clone();
    reply
}

/// A well-behaved service with the given roster.
pub fn service(roster: Vec<Value>) -> Script {
    Arc::new(move |cmd: &Value| match cmd["cmd"].as_str() {
        Some("login") => Reply::Json(json!({
            "rsp": "login",
            "success": true,
            "tid": cmd["tid"],
            "locations": [{ "description": "Home", "gateways": roster }]
        })),
        Some("read") => Reply::Json(answering(
            cmd,
            read_reply(cmd["awlid"].as_str().unwrap_or_default()),
        )),
        Some("write") => Reply::Json(json!({
            "rsp": "write",
            "tid": cmd["tid"],
            "awlid": cmd["awlid"],
            "success": true
        })),
        _ => Reply::Hang,
    })
}

// ── Recording surface ───────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSurface {
    calls: Mutex<Vec<String>>,
}

impl RecordingSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

struct RecordingDevice {
    unit: UnitId,
    surface: Arc<RecordingSurface>,
}

impl ConnectableDevice for RecordingDevice {
    fn set_connection_status(&self, online: bool) {
        self.surface.push(format!("online {} {online}", self.unit));
    }

    fn refresh_with_data(&self, data: &ReadResponse) {
        self.surface
            .push(format!("refresh {} {}", self.unit, data.room_temp));
    }
}

/// Wrapper so the surface can hand out devices holding an `Arc` to it.
pub struct SurfaceHandle(pub Arc<RecordingSurface>);

impl DeviceSurface for SurfaceHandle {
    fn add_unit(
        &self,
        record: &UnitRecord,
        _protocol: Arc<dyn PlatformProtocol>,
    ) -> Arc<dyn ConnectableDevice> {
        self.0
            .push(format!("add {} {}", record.unit_id, record.display_name));
        Arc::new(RecordingDevice {
            unit: record.unit_id.clone(),
            surface: Arc::clone(&self.0),
        })
    }

    fn rename_unit(&self, unit: &UnitId, name: &str) {
        self.0.push(format!("rename {unit} {name}"));
    }

    fn remove_unit(&self, unit: &UnitId) {
        self.0.push(format!("remove {unit}"));
    }

    fn connectivity_changed(&self, connected: bool) {
        self.0.push(format!("connectivity {connected}"));
    }
}

// ── Web side ────────────────────────────────────────────────────────

pub async fn mount_web_ok(server: &MockServer) {
    mount_login(server, ResponseTemplate::new(302)
        .insert_header("location", "/")
        .insert_header("set-cookie", "sessionid=s3cr3t; Path=/"))
    .await;
    mount_config(server).await;
}

pub async fn mount_login(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/account/login"))
        .respond_with(response)
        .mount(server)
        .await;
}

pub async fn mount_config(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/assets/js/awlconfig.js.php"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"var awl = { url: "wss://awlclientproxy.mywaterfurnace.com/" };"#,
        ))
        .mount(server)
        .await;
}

pub async fn request_count(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == route)
        .count()
}

pub fn config(server: &MockServer) -> BridgeConfig {
    let base = Url::parse(&server.uri()).unwrap();
    let mut config = BridgeConfig::new(Credentials::new(
        "owner@example.com",
        SecretString::from("hunter2"),
    ))
    .unwrap();
    config.endpoints = WebEndpoints::new(
        base.join("/account/login").unwrap(),
        base.join("/assets/js/awlconfig.js.php").unwrap(),
    );
    config.poll_interval = Duration::from_millis(20);
    config.receive_timeout = Duration::from_millis(500);
    config.http_timeout = Duration::from_secs(5);
    config
}

/// Poll `check` every 10 ms for up to five seconds.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..500 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}
