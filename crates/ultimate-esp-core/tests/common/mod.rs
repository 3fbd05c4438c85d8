//! Scriptable serial, engine and fetcher doubles shared by the integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use ultimate_esp_core::device::{
    ChipEngine, ConnectionSession, EngineError, FlashRequest, Loader, LoaderOptions,
    SerialCapability, SerialError, SerialPortHandle, SessionConfig, SessionState, Transport,
};
use ultimate_esp_core::firmware::{FetchError, FirmwareFetcher};
use ultimate_esp_core::status::{ProgressReporter, Severity, StatusSink};

pub const CHIP: &str = "ESP32-D0WD-V3 (revision v3.0)";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Failure injection and engine behavior
#[derive(Debug, Clone)]
pub struct Script {
    pub unavailable: bool,
    pub fail_request: Option<&'static str>,
    pub fail_open: Option<&'static str>,
    pub fail_transport: Option<&'static str>,
    pub fail_handshake: Option<&'static str>,
    pub fail_transport_disconnect: Option<&'static str>,
    pub fail_close: Option<&'static str>,
    pub fail_write: Option<&'static str>,
    pub chip: String,
    pub fractions: Vec<f64>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            unavailable: false,
            fail_request: None,
            fail_open: None,
            fail_transport: None,
            fail_handshake: None,
            fail_transport_disconnect: None,
            fail_close: None,
            fail_write: None,
            chip: CHIP.to_string(),
            fractions: vec![0.5, 1.0],
        }
    }
}

#[derive(Default)]
struct RigState {
    script: Mutex<Script>,
    events: Mutex<Vec<String>>,
    write_gate: Mutex<Option<Arc<Notify>>>,
}

/// Shared script and call log behind every double
#[derive(Clone, Default)]
pub struct Rig(Arc<RigState>);

impl Rig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, edit: impl FnOnce(&mut Script)) {
        edit(&mut self.0.script.lock().unwrap());
    }

    fn current(&self) -> Script {
        self.0.script.lock().unwrap().clone()
    }

    fn record(&self, event: impl Into<String>) {
        self.0.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.events.lock().unwrap().clone()
    }

    pub fn clear_events(&self) {
        self.0.events.lock().unwrap().clear();
    }

    /// Make the next flash writes wait on `gate` after reporting progress
    pub fn gate_writes(&self, gate: Arc<Notify>) {
        *self.0.write_gate.lock().unwrap() = Some(gate);
    }

    pub fn serial(&self) -> MockSerial {
        MockSerial { rig: self.clone() }
    }

    pub fn engine(&self) -> MockEngine {
        MockEngine { rig: self.clone() }
    }
}

fn fail<E>(reason: Option<&'static str>, make: impl FnOnce(&'static str) -> E) -> Result<(), E> {
    match reason {
        Some(reason) => Err(make(reason)),
        None => Ok(()),
    }
}

pub struct MockSerial {
    rig: Rig,
}

impl SerialCapability for MockSerial {
    type Port = MockPort;

    fn is_available(&self) -> bool {
        !self.rig.current().unavailable
    }

    async fn request_port(&self) -> Result<MockPort, SerialError> {
        self.rig.record("request");
        fail(self.rig.current().fail_request, SerialError::new)?;
        Ok(MockPort {
            rig: self.rig.clone(),
        })
    }
}

pub struct MockPort {
    rig: Rig,
}

impl SerialPortHandle for MockPort {
    async fn open(&mut self, baud_rate: u32) -> Result<(), SerialError> {
        self.rig.record(format!("open {}", baud_rate));
        fail(self.rig.current().fail_open, SerialError::new)
    }

    async fn close(&mut self) -> Result<(), SerialError> {
        self.rig.record("close");
        fail(self.rig.current().fail_close, SerialError::new)
    }
}

pub struct MockEngine {
    rig: Rig,
}

impl ChipEngine<MockPort> for MockEngine {
    type Transport = MockTransport;
    type Loader = MockLoader;

    fn transport(&self, _port: &MockPort) -> Result<MockTransport, EngineError> {
        self.rig.record("transport");
        fail(self.rig.current().fail_transport, EngineError::new)?;
        Ok(MockTransport {
            rig: self.rig.clone(),
        })
    }

    fn loader(&self, options: LoaderOptions<MockTransport>) -> Result<MockLoader, EngineError> {
        self.rig.record(format!("loader {}", options.baud_rate));
        let mut terminal = options.terminal;
        terminal.write_line("esptool.js");
        Ok(MockLoader {
            rig: self.rig.clone(),
            _transport: options.transport,
        })
    }
}

#[derive(Clone)]
pub struct MockTransport {
    rig: Rig,
}

impl Transport for MockTransport {
    async fn disconnect(&mut self) -> Result<(), EngineError> {
        self.rig.record("transport disconnect");
        fail(self.rig.current().fail_transport_disconnect, EngineError::new)
    }
}

pub struct MockLoader {
    rig: Rig,
    _transport: MockTransport,
}

impl Loader for MockLoader {
    async fn handshake(&mut self) -> Result<String, EngineError> {
        self.rig.record("handshake");
        let script = self.rig.current();
        fail(script.fail_handshake, EngineError::new)?;
        Ok(script.chip)
    }

    async fn write_flash(
        &mut self,
        request: FlashRequest<'_>,
        progress: &mut dyn FnMut(f64),
    ) -> Result<(), EngineError> {
        self.rig.record(format!(
            "write {:#x} {}",
            request.address,
            request.payload.len()
        ));
        let script = self.rig.current();
        for fraction in script.fractions {
            progress(fraction);
        }

        let gate = self.rig.0.write_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        fail(script.fail_write, EngineError::new)
    }
}

/// Fetcher serving fixed bodies; anything else is a 404
#[derive(Default)]
pub struct MockFetcher {
    bodies: Mutex<HashMap<String, Vec<u8>>>,
    fetched: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, body: Vec<u8>) {
        self.bodies.lock().unwrap().insert(url.to_string(), body);
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

impl FirmwareFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.fetched.lock().unwrap().push(url.to_string());
        self.bodies
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or(FetchError::Status(404))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusEvent {
    Status(String, Severity),
    Alert(String),
    State(SessionState, Option<String>),
}

/// Status sink keeping every event, for asserting on sequences
#[derive(Default)]
pub struct RecordingStatus {
    events: Mutex<Vec<StatusEvent>>,
}

impl RecordingStatus {
    pub fn events(&self) -> Vec<StatusEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn states(&self) -> Vec<SessionState> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                StatusEvent::State(state, _) => Some(state),
                _ => None,
            })
            .collect()
    }

    pub fn last_status(&self) -> Option<(String, Severity)> {
        self.events().into_iter().rev().find_map(|e| match e {
            StatusEvent::Status(message, severity) => Some((message, severity)),
            _ => None,
        })
    }

    pub fn alerts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                StatusEvent::Alert(message) => Some(message),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl StatusSink for RecordingStatus {
    fn set_status(&self, message: &str, severity: Severity) {
        self.events
            .lock()
            .unwrap()
            .push(StatusEvent::Status(message.to_string(), severity));
    }

    fn alert(&self, message: &str) {
        self.events
            .lock()
            .unwrap()
            .push(StatusEvent::Alert(message.to_string()));
    }

    fn session_changed(&self, state: SessionState, chip_id: Option<&str>) {
        self.events
            .lock()
            .unwrap()
            .push(StatusEvent::State(state, chip_id.map(str::to_string)));
    }
}

/// Progress reporter keeping every value
#[derive(Default)]
pub struct RecordingProgress {
    values: Mutex<Vec<f64>>,
}

impl RecordingProgress {
    pub fn values(&self) -> Vec<f64> {
        self.values.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.lock().unwrap().last().copied()
    }
}

impl ProgressReporter for RecordingProgress {
    fn set_progress(&self, percent: f64) {
        self.values.lock().unwrap().push(percent);
    }
}

pub type MockSession = ConnectionSession<MockSerial, MockEngine>;

pub fn session(rig: &Rig) -> (MockSession, Arc<RecordingStatus>) {
    init_tracing();
    let status = Arc::new(RecordingStatus::default());
    let session = ConnectionSession::new(
        rig.serial(),
        rig.engine(),
        SessionConfig::default(),
        status.clone(),
    );
    (session, status)
}
