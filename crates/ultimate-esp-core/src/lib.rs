//! # Ultimate ESP Core Library
//!
//! Core functionality for flashing firmware onto ESP microcontrollers over a
//! serial link.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Firmware catalog loading and firmware selection
//! - The serial connection session (port, transport, engine lifecycle)
//! - Firmware download and transfer with progress reporting
//! - Status and progress sinks for a front-end to observe
//!
//! The bootloader protocol itself is supplied by an external chip-programming
//! engine implementing [`device::ChipEngine`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ultimate_esp_core::prelude::*;
//!
//! let settings = Settings::load_or_default(&path);
//! let fetcher = HttpFetcher::new();
//! let status = Arc::new(StatusLine::default());
//! let catalog = FirmwareCatalog::load_or_empty(&fetcher, &settings.catalog, status.as_ref()).await;
//!
//! let controller = FlashController::new(
//!     settings.host_serial(),
//!     my_engine,
//!     fetcher,
//!     settings.session_config(),
//!     catalog,
//!     status.clone(),
//!     Arc::new(ProgressLabel::default()),
//! );
//!
//! controller.connect().await?;
//! controller.flash(&selection).await?;
//! controller.disconnect().await?;
//! ```

pub mod controller;
pub mod device;
pub mod firmware;
pub mod flash;
pub mod settings;
pub mod status;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::controller::{FlashController, SessionSnapshot};
    pub use crate::device::{
        ChipEngine, ConnectionSession, DeviceError, HostSerial, SerialCapability, SessionConfig,
        SessionState,
    };
    pub use crate::firmware::{
        FirmwareCatalog, FirmwareDescriptor, FirmwareFetcher, FirmwareSelection, HttpFetcher,
    };
    pub use crate::flash::{FlashError, FlashOperation, FlashReport};
    pub use crate::settings::Settings;
    pub use crate::status::{ProgressLabel, ProgressReporter, Severity, StatusLine, StatusSink};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
