//! Device errors

use thiserror::Error;

use super::{EngineError, SerialError};

/// Errors that can occur while connecting to or talking with a device
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("Serial access is not supported on this host")]
    SerialUnsupported,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Not connected to a device")]
    NotConnected,

    #[error("Another operation is in progress")]
    Busy,

    #[error("Port request failed: {0}")]
    PortRequest(SerialError),

    #[error("Failed to open port: {0}")]
    PortOpen(SerialError),

    #[error("Transport setup failed: {0}")]
    Transport(EngineError),

    #[error("Handshake failed: {0}")]
    Handshake(EngineError),
}
