//! Serial port handling
//!
//! Defines the serial capability the session consumes and a host
//! implementation on top of the `serialport` crate.

use serialport::{SerialPort, SerialPortInfo, SerialPortType};
use std::collections::HashMap;
#[cfg(target_os = "linux")]
use std::fs;
use std::time::Duration;
use thiserror::Error;

/// Error reported by the serial capability or a port handle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct SerialError(pub String);

impl SerialError {
    /// Create a serial error from a message
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<serialport::Error> for SerialError {
    fn from(err: serialport::Error) -> Self {
        Self(err.to_string())
    }
}

/// Host access to serial ports
#[allow(async_fn_in_trait)]
pub trait SerialCapability {
    /// Port handle handed out by [`SerialCapability::request_port`]
    type Port: SerialPortHandle;

    /// Whether the host supports serial access at all
    fn is_available(&self) -> bool;

    /// Ask for a port to use. The returned port is not open yet.
    async fn request_port(&self) -> Result<Self::Port, SerialError>;
}

/// A single serial port
#[allow(async_fn_in_trait)]
pub trait SerialPortHandle {
    /// Open the port at the given baud rate
    async fn open(&mut self, baud_rate: u32) -> Result<(), SerialError>;

    /// Close the port
    async fn close(&mut self) -> Result<(), SerialError>;
}

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyUSB0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Product name (if available)
    pub product: Option<String>,
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (vid, pid, product) = match info.port_type {
            SerialPortType::UsbPort(usb_info) => {
                (Some(usb_info.vid), Some(usb_info.pid), usb_info.product)
            }
            _ => (None, None, None),
        };

        Self {
            name: info.port_name,
            vid,
            pid,
            product,
        }
    }
}

/// Sort key placing ttyACM* first, then ttyUSB* (both numerically), then the rest by name
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    if let Some(rest) = basename.strip_prefix("ttyACM") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (0, num, basename.to_string());
    }
    if let Some(rest) = basename.strip_prefix("ttyUSB") {
        let num = rest.parse::<usize>().unwrap_or(usize::MAX);
        return (1, num, basename.to_string());
    }
    (2, 0, basename.to_string())
}

/// List all available serial ports, with /dev fallbacks and deterministic ordering
pub fn list_ports() -> Vec<PortInfo> {
    let mut map: HashMap<String, PortInfo> = HashMap::new();
    for info in serialport::available_ports().unwrap_or_default() {
        let p = PortInfo::from(info);
        map.entry(p.name.clone()).or_insert(p);
    }

    // USB-serial bridges sometimes miss from the enumeration API on Linux
    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(fname) = entry.file_name().to_str() {
                if fname.starts_with("ttyACM") || fname.starts_with("ttyUSB") {
                    let full = format!("/dev/{}", fname);
                    map.entry(full.clone()).or_insert_with(|| PortInfo {
                        name: full,
                        vid: None,
                        pid: None,
                        product: None,
                    });
                }
            }
        }
    }

    let mut v: Vec<PortInfo> = map.into_values().collect();
    v.sort_by_key(|p| port_sort_key(&p.name));
    v
}

/// Configure a port for the bootloader link: 8N1, no flow control.
///
/// DTR and RTS are released so the board is neither held in reset nor forced
/// into download mode; the engine drives them itself when it needs to.
fn configure_port(port: &mut dyn SerialPort) -> Result<(), SerialError> {
    port.set_data_bits(serialport::DataBits::Eight)?;
    port.set_parity(serialport::Parity::None)?;
    port.set_stop_bits(serialport::StopBits::One)?;
    port.set_flow_control(serialport::FlowControl::None)?;

    if let Err(e) = port.write_data_terminal_ready(false) {
        tracing::debug!("configure_port: failed to release DTR: {} (continuing)", e);
    }
    if let Err(e) = port.write_request_to_send(false) {
        tracing::debug!("configure_port: failed to release RTS: {} (continuing)", e);
    }

    Ok(())
}

/// Serial capability backed by the host's serial ports
#[derive(Debug, Clone, Default)]
pub struct HostSerial {
    preferred_port: Option<String>,
}

impl HostSerial {
    /// Pick the first detected port on request
    pub fn new() -> Self {
        Self::default()
    }

    /// Always hand out the named port
    pub fn with_port(name: impl Into<String>) -> Self {
        Self {
            preferred_port: Some(name.into()),
        }
    }
}

impl SerialCapability for HostSerial {
    type Port = HostPort;

    fn is_available(&self) -> bool {
        serialport::available_ports().is_ok()
    }

    async fn request_port(&self) -> Result<HostPort, SerialError> {
        if let Some(name) = &self.preferred_port {
            return Ok(HostPort::new(name.clone()));
        }

        list_ports()
            .into_iter()
            .next()
            .map(|info| {
                tracing::info!("Selected serial port {} ({:?})", info.name, info.product);
                HostPort::new(info.name)
            })
            .ok_or_else(|| SerialError::new("No serial ports found"))
    }
}

/// A host serial port, closed until [`SerialPortHandle::open`] succeeds
pub struct HostPort {
    name: String,
    port: Option<Box<dyn SerialPort>>,
}

impl HostPort {
    /// Create a handle for the named port
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port: None,
        }
    }

    /// Port name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the port is currently open
    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    /// Independent handle to the open port, for an engine building its transport
    pub fn try_clone_port(&self) -> Result<Box<dyn SerialPort>, SerialError> {
        let port = self
            .port
            .as_ref()
            .ok_or_else(|| SerialError::new(format!("Port {} is not open", self.name)))?;
        Ok(port.try_clone()?)
    }
}

impl std::fmt::Debug for HostPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostPort")
            .field("name", &self.name)
            .field("open", &self.is_open())
            .finish()
    }
}

impl SerialPortHandle for HostPort {
    async fn open(&mut self, baud_rate: u32) -> Result<(), SerialError> {
        if self.port.is_some() {
            return Err(SerialError::new(format!("Port {} is already open", self.name)));
        }

        let name = self.name.clone();
        let port = tokio::task::spawn_blocking(move || -> Result<Box<dyn SerialPort>, SerialError> {
            // Short timeout keeps engine reads responsive
            let mut port = serialport::new(&name, baud_rate)
                .timeout(Duration::from_millis(100))
                .open()?;
            configure_port(port.as_mut())?;
            Ok(port)
        })
        .await
        .map_err(|e| SerialError::new(format!("Port open task failed: {}", e)))??;

        tracing::debug!("Opened {} at {} baud", self.name, baud_rate);
        self.port = Some(port);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SerialError> {
        match self.port.take() {
            Some(port) => {
                drop(port);
                tracing::debug!("Closed {}", self.name);
                Ok(())
            }
            None => Err(SerialError::new(format!("Port {} is not open", self.name))),
        }
    }
}
