//! Flash controller
//!
//! Single entry point for a front-end: connect, flash, disconnect. The
//! controller owns the one connection session and admits a single operation at
//! a time. An overlapping request (a disconnect while a flash is mid-transfer,
//! a second connect while one is pending) is rejected with
//! [`DeviceError::Busy`] rather than queued.
//!
//! Failures are returned to the caller and also pushed to the status sink, so
//! a front-end that ignores the `Result` still shows them.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

use crate::device::{ChipEngine, ConnectionSession, DeviceError, SerialCapability, SessionConfig, SessionState};
use crate::firmware::{FirmwareCatalog, FirmwareDescriptor, FirmwareFetcher, FirmwareSelection};
use crate::flash::{FlashError, FlashOperation, FlashReport};
use crate::status::{messages, ProgressReporter, StatusSink};

/// Point-in-time view of the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    /// Session state
    pub state: SessionState,
    /// Chip identifier (if connected)
    pub chip_id: Option<String>,
    /// Whether flashing is currently possible
    pub can_flash: bool,
}

/// Orchestrates connect, flash and disconnect over one session
pub struct FlashController<S, E, F>
where
    S: SerialCapability,
    E: ChipEngine<S::Port>,
    F: FirmwareFetcher,
{
    session: Mutex<ConnectionSession<S, E>>,
    catalog: FirmwareCatalog,
    fetcher: F,
    status: Arc<dyn StatusSink>,
    progress: Arc<dyn ProgressReporter>,
}

impl<S, E, F> FlashController<S, E, F>
where
    S: SerialCapability,
    E: ChipEngine<S::Port>,
    F: FirmwareFetcher,
{
    /// Create a controller with a disconnected session
    pub fn new(
        serial: S,
        engine: E,
        fetcher: F,
        config: SessionConfig,
        catalog: FirmwareCatalog,
        status: Arc<dyn StatusSink>,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        let session = ConnectionSession::new(serial, engine, config, status.clone());
        Self {
            session: Mutex::new(session),
            catalog,
            fetcher,
            status,
            progress,
        }
    }

    /// Firmware catalog in use
    pub fn catalog(&self) -> &FirmwareCatalog {
        &self.catalog
    }

    /// Replace the firmware catalog
    pub fn set_catalog(&mut self, catalog: FirmwareCatalog) {
        self.catalog = catalog;
    }

    /// Resolve a selection against the catalog
    pub fn resolve(&self, selection: &FirmwareSelection) -> Option<FirmwareDescriptor> {
        selection.resolve(&self.catalog)
    }

    /// Whether an operation is in flight
    pub fn is_busy(&self) -> bool {
        self.session.try_lock().is_err()
    }

    /// Current session state, waiting for any in-flight operation to finish
    pub async fn snapshot(&self) -> SessionSnapshot {
        let session = self.session.lock().await;
        SessionSnapshot {
            state: session.state(),
            chip_id: session.chip_id().map(str::to_string),
            can_flash: session.can_flash(),
        }
    }

    /// Connect to the device and return its chip identifier
    pub async fn connect(&self) -> Result<String, DeviceError> {
        let mut session = self.acquire("connect")?;
        session.connect().await
    }

    /// Flash the firmware picked by `selection`.
    ///
    /// The connection stays up whatever the outcome.
    pub async fn flash(&self, selection: &FirmwareSelection) -> Result<FlashReport, FlashError> {
        let Some(firmware) = self.resolve(selection) else {
            tracing::warn!("flash: nothing resolved from {:?}", selection);
            self.status.alert(messages::NO_FIRMWARE);
            return Err(FlashError::NoFirmware);
        };

        let mut session = self.acquire("flash")?;
        match FlashOperation::new(firmware)
            .run(&mut *session, &self.fetcher, self.progress.as_ref())
            .await
        {
            Ok(report) => Ok(report),
            Err(e) => {
                tracing::error!("flash failed: {}", e);
                self.status
                    .alert(&format!("{}: {}", messages::FLASH_FAILED, e));
                Err(e)
            }
        }
    }

    /// Disconnect from the device. Teardown errors are logged, never returned.
    pub async fn disconnect(&self) -> Result<(), DeviceError> {
        let mut session = self.acquire("disconnect")?;
        session.disconnect().await;
        Ok(())
    }

    fn acquire(&self, operation: &str) -> Result<MutexGuard<'_, ConnectionSession<S, E>>, DeviceError> {
        self.session.try_lock().map_err(|_| {
            tracing::warn!("{}: rejected, another operation is in progress", operation);
            DeviceError::Busy
        })
    }
}
