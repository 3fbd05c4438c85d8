//! Device Connection
//!
//! Manages the serial link to a microcontroller: port acquisition, transport
//! and engine construction, chip handshake, and teardown.
//!
//! The bootloader protocol is not implemented here. It is provided by an
//! external chip-programming engine through the [`ChipEngine`] capability.

pub mod engine;
mod error;
pub mod serial;
mod session;

pub use engine::{
    ChipEngine, EngineError, FlashRequest, Loader, LoaderOptions, NullTerminal, Terminal,
    TracingTerminal, Transport,
};
pub use error::DeviceError;
pub use serial::{list_ports, HostPort, HostSerial, PortInfo, SerialCapability, SerialError, SerialPortHandle};
pub use session::{ConnectionSession, SessionConfig, SessionState};

/// Default baud rate for the bootloader link
pub const DEFAULT_BAUD_RATE: u32 = 115200;
