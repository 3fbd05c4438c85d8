//! Status and progress reporting
//!
//! The core never polls a front-end. It pushes every session transition,
//! status message, alert and progress update into the sinks defined here.

use serde::Serialize;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc;

use crate::device::SessionState;

/// Operator-facing status messages
pub mod messages {
    /// Handshake completed
    pub const CONNECTED: &str = "connected";
    /// Session torn down
    pub const DISCONNECTED: &str = "not connected";
    /// Port request, open, transport setup or handshake failed
    pub const CONNECT_FAILED: &str = "connection failed";
    /// The host has no serial access
    pub const SERIAL_UNSUPPORTED: &str = "serial access not supported";
    /// Catalog could not be loaded
    pub const NO_CATALOG: &str = "no firmware catalog";
    /// Nothing resolved from the current selection
    pub const NO_FIRMWARE: &str = "no firmware selected";
    /// Prefix of the alert raised when a flash fails
    pub const FLASH_FAILED: &str = "flash failed";
}

/// Status severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Normal status
    #[default]
    Normal,
    /// Something the operator should notice
    Warning,
}

impl Severity {
    /// Whether this is a warning
    pub fn is_warning(self) -> bool {
        self == Severity::Warning
    }
}

/// Receiver of connection and operation status
pub trait StatusSink: Send + Sync {
    /// Replace the current status line
    fn set_status(&self, message: &str, severity: Severity);

    /// Raise an operator alert (flash outcome, missing firmware)
    fn alert(&self, message: &str) {
        self.set_status(message, Severity::Warning);
    }

    /// Called on every session state transition
    fn session_changed(&self, _state: SessionState, _chip_id: Option<&str>) {}
}

/// Receiver of flash progress, in percent.
///
/// Values arrive in whatever order the engine reports them and are not
/// clamped; an engine overshooting 1.0 shows up as more than 100.
pub trait ProgressReporter: Send + Sync {
    /// Report the current percentage
    fn set_progress(&self, percent: f64);
}

/// Round to the nearest whole percentage, halves rounding up
pub fn round_percent(percent: f64) -> i64 {
    (percent + 0.5).floor() as i64
}

/// Display form of a percentage, e.g. `"42%"`
pub fn format_percent(percent: f64) -> String {
    format!("{}%", round_percent(percent))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// What a status line currently shows
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusSnapshot {
    /// Latest status message
    pub message: String,
    /// Whether the latest message is a warning
    pub warning: bool,
    /// Latest alert, if any was raised
    pub alert: Option<String>,
    /// Latest session state
    pub state: SessionState,
    /// Chip identifier shown next to the state
    pub chip_id: Option<String>,
}

impl StatusSnapshot {
    /// Whether the session is connected
    pub fn connected(&self) -> bool {
        self.state == SessionState::Connected
    }
}

/// Status sink keeping only the latest values
#[derive(Debug, Default)]
pub struct StatusLine {
    inner: Mutex<StatusSnapshot>,
}

impl StatusLine {
    /// Copy of what is currently shown
    pub fn snapshot(&self) -> StatusSnapshot {
        lock(&self.inner).clone()
    }

    /// Dismiss the current alert
    pub fn clear_alert(&self) {
        lock(&self.inner).alert = None;
    }
}

impl StatusSink for StatusLine {
    fn set_status(&self, message: &str, severity: Severity) {
        let mut inner = lock(&self.inner);
        inner.message = message.to_string();
        inner.warning = severity.is_warning();
    }

    fn alert(&self, message: &str) {
        lock(&self.inner).alert = Some(message.to_string());
    }

    fn session_changed(&self, state: SessionState, chip_id: Option<&str>) {
        let mut inner = lock(&self.inner);
        inner.state = state;
        inner.chip_id = chip_id.map(str::to_string);
    }
}

/// Status sink that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingStatus;

impl StatusSink for TracingStatus {
    fn set_status(&self, message: &str, severity: Severity) {
        match severity {
            Severity::Normal => tracing::info!("status: {}", message),
            Severity::Warning => tracing::warn!("status: {}", message),
        }
    }

    fn alert(&self, message: &str) {
        tracing::warn!("alert: {}", message);
    }

    fn session_changed(&self, state: SessionState, chip_id: Option<&str>) {
        tracing::info!("session: {:?} (chip: {})", state, chip_id.unwrap_or("-"));
    }
}

/// Progress label showing the latest percentage
#[derive(Debug, Default)]
pub struct ProgressLabel {
    percent: Mutex<f64>,
}

impl ProgressLabel {
    /// Latest percentage, rounded for display
    pub fn percent(&self) -> i64 {
        round_percent(*lock(&self.percent))
    }

    /// Display text, e.g. `"42%"`
    pub fn text(&self) -> String {
        format_percent(*lock(&self.percent))
    }
}

impl ProgressReporter for ProgressLabel {
    fn set_progress(&self, percent: f64) {
        *lock(&self.percent) = percent;
    }
}

/// Progress reporter feeding a bounded channel.
///
/// Updates are dropped while the channel is full, so a slow consumer never
/// stalls the transfer.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::Sender<f64>,
}

impl ChannelProgress {
    /// Create a reporter and the receiving end of its channel
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<f64>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl ProgressReporter for ChannelProgress {
    fn set_progress(&self, percent: f64) {
        if let Err(e) = self.tx.try_send(percent) {
            tracing::trace!("progress update dropped: {}", e);
        }
    }
}
