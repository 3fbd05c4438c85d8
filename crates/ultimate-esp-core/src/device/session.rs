//! Connection session
//!
//! Owns the serial port, the engine transport and the engine loader for one
//! device and drives them through the connection lifecycle.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{
    ChipEngine, DeviceError, EngineError, Loader, LoaderOptions, NullTerminal, SerialCapability,
    SerialPortHandle, Terminal, TracingTerminal, Transport, DEFAULT_BAUD_RATE,
};
use crate::status::{messages, Severity, StatusSink};

/// Connection state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No port held
    #[default]
    Disconnected,
    /// Port acquisition and handshake in progress
    Connecting,
    /// Handshake done, ready to flash
    Connected,
    /// Teardown in progress
    Disconnecting,
}

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Baud rate used to open the port and handed to the engine
    pub baud_rate: u32,
    /// Forward engine console output to `tracing` instead of discarding it
    pub engine_log: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            engine_log: false,
        }
    }
}

/// Live binding to one device over a serial link.
///
/// The transport and loader only exist while the session is connected and are
/// always released before the port.
pub struct ConnectionSession<S, E>
where
    S: SerialCapability,
    E: ChipEngine<S::Port>,
{
    serial: S,
    engine: E,
    config: SessionConfig,
    status: Arc<dyn StatusSink>,
    state: SessionState,
    port: Option<S::Port>,
    transport: Option<E::Transport>,
    loader: Option<E::Loader>,
    chip_id: Option<String>,
}

impl<S, E> ConnectionSession<S, E>
where
    S: SerialCapability,
    E: ChipEngine<S::Port>,
{
    /// Create a disconnected session
    pub fn new(serial: S, engine: E, config: SessionConfig, status: Arc<dyn StatusSink>) -> Self {
        Self {
            serial,
            engine,
            config,
            status,
            state: SessionState::Disconnected,
            port: None,
            transport: None,
            loader: None,
            chip_id: None,
        }
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Chip identifier reported by the handshake (if connected)
    pub fn chip_id(&self) -> Option<&str> {
        self.chip_id.as_deref()
    }

    /// Whether the session is connected
    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    /// Whether a flash can be started right now
    pub fn can_flash(&self) -> bool {
        self.is_connected() && self.loader.is_some()
    }

    /// Session configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Connect to the device and return its chip identifier.
    ///
    /// On failure the session is back in `Disconnected` and whatever was
    /// partially acquired has been released.
    pub async fn connect(&mut self) -> Result<String, DeviceError> {
        if self.state != SessionState::Disconnected {
            return Err(DeviceError::AlreadyConnected);
        }

        if !self.serial.is_available() {
            tracing::warn!("connect: serial access is not available on this host");
            self.status
                .set_status(messages::SERIAL_UNSUPPORTED, Severity::Warning);
            return Err(DeviceError::SerialUnsupported);
        }

        self.transition(SessionState::Connecting);

        match self.establish().await {
            Ok(chip) => {
                tracing::info!("Connected to {} at {} baud", chip, self.config.baud_rate);
                self.chip_id = Some(chip.clone());
                self.transition(SessionState::Connected);
                self.status.set_status(messages::CONNECTED, Severity::Normal);
                Ok(chip)
            }
            Err(e) => {
                tracing::warn!("connect failed: {}", e);
                self.release().await;
                self.chip_id = None;
                self.transition(SessionState::Disconnected);
                self.status
                    .set_status(messages::CONNECT_FAILED, Severity::Warning);
                Err(e)
            }
        }
    }

    /// Disconnect from the device.
    ///
    /// Transport teardown and port close are each attempted regardless of the
    /// other's outcome; failures are logged and the session always ends up
    /// `Disconnected` with its fields cleared.
    pub async fn disconnect(&mut self) {
        if self.state != SessionState::Disconnected {
            self.transition(SessionState::Disconnecting);
        }

        self.release().await;
        self.chip_id = None;
        self.transition(SessionState::Disconnected);
        self.status.set_status(messages::DISCONNECTED, Severity::Normal);
    }

    /// Loader of the connected chip
    pub(crate) fn loader_mut(&mut self) -> Result<&mut E::Loader, DeviceError> {
        if self.state != SessionState::Connected {
            return Err(DeviceError::NotConnected);
        }
        self.loader.as_mut().ok_or(DeviceError::NotConnected)
    }

    async fn establish(&mut self) -> Result<String, DeviceError> {
        let mut port = self
            .serial
            .request_port()
            .await
            .map_err(DeviceError::PortRequest)?;
        port.open(self.config.baud_rate)
            .await
            .map_err(DeviceError::PortOpen)?;
        let port = self.port.insert(port);

        let transport = self
            .engine
            .transport(port)
            .map_err(DeviceError::Transport)?;
        self.transport = Some(transport.clone());

        let mut loader = self
            .engine
            .loader(LoaderOptions {
                transport,
                baud_rate: self.config.baud_rate,
                terminal: self.terminal(),
            })
            .map_err(DeviceError::Transport)?;

        let chip = loader.handshake().await.map_err(DeviceError::Handshake)?;
        let chip = chip.trim();
        if chip.is_empty() {
            return Err(DeviceError::Handshake(EngineError::new(
                "Engine reported an empty chip identifier",
            )));
        }

        self.loader = Some(loader);
        Ok(chip.to_string())
    }

    /// Best-effort release of loader, transport and port, in that order
    async fn release(&mut self) {
        self.loader = None;

        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.disconnect().await {
                tracing::warn!("release: transport disconnect failed: {}", e);
            }
        }

        if let Some(mut port) = self.port.take() {
            if let Err(e) = port.close().await {
                tracing::warn!("release: port close failed: {}", e);
            }
        }
    }

    fn terminal(&self) -> Box<dyn Terminal> {
        if self.config.engine_log {
            Box::new(TracingTerminal::default())
        } else {
            Box::new(NullTerminal)
        }
    }

    fn transition(&mut self, next: SessionState) {
        tracing::debug!("session: {:?} -> {:?}", self.state, next);
        self.state = next;
        self.status.session_changed(next, self.chip_id.as_deref());
    }
}
