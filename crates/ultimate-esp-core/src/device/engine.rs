//! Chip-programming engine capability
//!
//! The engine implements the bootloader protocol: it builds a transport over a
//! raw port, identifies the chip and writes flash. The session only reaches it
//! through these traits, so any engine (or a test double) can be plugged in.

use thiserror::Error;

/// Error reported by the engine. The message is surfaced to the operator as-is.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct EngineError(pub String);

impl EngineError {
    /// Create an engine error from a message
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Log sink handed to the engine for its console output
pub trait Terminal: Send {
    /// Clear any pending output
    fn clean(&mut self);
    /// Write a full line
    fn write_line(&mut self, line: &str);
    /// Write a fragment without a line break
    fn write(&mut self, data: &str);
}

/// Terminal that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTerminal;

impl Terminal for NullTerminal {
    fn clean(&mut self) {}

    fn write_line(&mut self, _line: &str) {}

    fn write(&mut self, _data: &str) {}
}

/// Terminal that forwards engine output to `tracing` at debug level.
///
/// Fragments passed to [`Terminal::write`] are buffered until a line break.
#[derive(Debug, Default)]
pub struct TracingTerminal {
    pending: String,
}

impl TracingTerminal {
    fn flush_lines(&mut self) {
        while let Some(pos) = self.pending.find('\n') {
            let line: String = self.pending.drain(..=pos).collect();
            tracing::debug!(target: "engine", "{}", line.trim_end());
        }
    }
}

impl Terminal for TracingTerminal {
    fn clean(&mut self) {
        self.pending.clear();
    }

    fn write_line(&mut self, line: &str) {
        self.pending.push_str(line);
        self.pending.push('\n');
        self.flush_lines();
    }

    fn write(&mut self, data: &str) {
        self.pending.push_str(data);
        self.flush_lines();
    }
}

impl Drop for TracingTerminal {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            tracing::debug!(target: "engine", "{}", self.pending);
        }
    }
}

/// Everything the engine needs to build its programming session
pub struct LoaderOptions<T> {
    /// Transport built over the open port
    pub transport: T,
    /// Baud rate the port was opened with
    pub baud_rate: u32,
    /// Sink for engine console output
    pub terminal: Box<dyn Terminal>,
}

/// A single flash write
#[derive(Debug, Clone, Copy)]
pub struct FlashRequest<'a> {
    /// Complete firmware image
    pub payload: &'a [u8],
    /// Flash address the image starts at
    pub address: u32,
}

/// Byte-level channel over the raw serial port
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Tear the transport down. The port itself is closed separately.
    async fn disconnect(&mut self) -> Result<(), EngineError>;
}

/// The engine's programming session for one connected chip
#[allow(async_fn_in_trait)]
pub trait Loader {
    /// Sync with the bootloader and return the chip identifier
    async fn handshake(&mut self) -> Result<String, EngineError>;

    /// Write `request.payload` at `request.address`.
    ///
    /// `progress` is invoked zero or more times with the completed fraction,
    /// nominally in `[0, 1]`.
    async fn write_flash(
        &mut self,
        request: FlashRequest<'_>,
        progress: &mut dyn FnMut(f64),
    ) -> Result<(), EngineError>;
}

/// Factory for transports and loaders over ports of type `P`
pub trait ChipEngine<P> {
    /// Transport handle. Cloned so the session can tear it down independently
    /// of the loader that uses it.
    type Transport: Transport + Clone;
    /// Programming session type
    type Loader: Loader;

    /// Build a transport over an open port
    fn transport(&self, port: &P) -> Result<Self::Transport, EngineError>;

    /// Build a programming session over a transport
    fn loader(&self, options: LoaderOptions<Self::Transport>) -> Result<Self::Loader, EngineError>;
}
