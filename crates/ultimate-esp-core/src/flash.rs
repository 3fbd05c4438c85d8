//! Firmware flashing
//!
//! A [`FlashOperation`] downloads one firmware image in full, then hands it to
//! the engine of a connected session while relaying progress. It borrows the
//! session for the duration of the transfer and never changes its state, so a
//! failed flash can simply be retried on the same connection.

use std::time::{Duration, Instant};
use thiserror::Error;

use crate::device::{ChipEngine, ConnectionSession, DeviceError, EngineError, FlashRequest, Loader, SerialCapability};
use crate::firmware::{FetchError, FirmwareDescriptor, FirmwareFetcher};
use crate::status::ProgressReporter;

/// Errors that can occur while flashing
#[derive(Error, Debug)]
pub enum FlashError {
    #[error("No firmware selected")]
    NoFirmware,

    #[error("Invalid flash offset '{0}'")]
    InvalidOffset(String),

    #[error("download failed: {0}")]
    Download(FetchError),

    /// Engine write error, message passed through unchanged
    #[error("{0}")]
    Transfer(EngineError),

    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// Outcome of a successful flash
#[derive(Debug, Clone, PartialEq)]
pub struct FlashReport {
    /// Firmware that was written
    pub firmware: FirmwareDescriptor,
    /// Flash address the image was written at
    pub address: u32,
    /// Image size
    pub bytes_written: usize,
    /// Time from download start to write completion
    pub elapsed: Duration,
}

/// One flash of one firmware image
#[derive(Debug)]
pub struct FlashOperation {
    firmware: FirmwareDescriptor,
    payload: Vec<u8>,
    progress: f64,
}

impl FlashOperation {
    /// Prepare a flash of `firmware`
    pub fn new(firmware: FirmwareDescriptor) -> Self {
        Self {
            firmware,
            payload: Vec::new(),
            progress: 0.0,
        }
    }

    /// Firmware being flashed
    pub fn firmware(&self) -> &FirmwareDescriptor {
        &self.firmware
    }

    /// Last fraction reported by the engine; 1.0 once the write succeeded
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Download the image and write it through `session`.
    ///
    /// Progress is reset to 0 before any I/O and forced to exactly 100 on
    /// success. In between, each engine fraction is forwarded multiplied by
    /// 100, without clamping or reordering. After a failed write,
    /// [`FlashOperation::progress`] holds the last fraction reached.
    pub async fn run<S, E, F>(
        &mut self,
        session: &mut ConnectionSession<S, E>,
        fetcher: &F,
        progress: &dyn ProgressReporter,
    ) -> Result<FlashReport, FlashError>
    where
        S: SerialCapability,
        E: ChipEngine<S::Port>,
        F: FirmwareFetcher,
    {
        if !session.is_connected() {
            return Err(DeviceError::NotConnected.into());
        }
        let address = self
            .firmware
            .address()
            .ok_or_else(|| FlashError::InvalidOffset(self.firmware.flash_offset.clone()))?;

        self.progress = 0.0;
        progress.set_progress(0.0);
        let started = Instant::now();

        tracing::info!("Downloading {} from {}", self.firmware.name, self.firmware.url);
        self.payload = fetcher
            .fetch(&self.firmware.url)
            .await
            .map_err(FlashError::Download)?;

        tracing::info!(
            "Writing {} bytes of {} at {:#x}",
            self.payload.len(),
            self.firmware.name,
            address
        );
        let loader = session.loader_mut()?;
        let last = &mut self.progress;
        let mut report = |fraction: f64| {
            *last = fraction;
            progress.set_progress(fraction * 100.0);
        };
        loader
            .write_flash(
                FlashRequest {
                    payload: &self.payload,
                    address,
                },
                &mut report,
            )
            .await
            .map_err(FlashError::Transfer)?;

        self.progress = 1.0;
        progress.set_progress(100.0);

        let elapsed = started.elapsed();
        tracing::info!("Flashed {} in {:.1?}", self.firmware.name, elapsed);

        Ok(FlashReport {
            bytes_written: self.payload.len(),
            firmware: self.firmware.clone(),
            address,
            elapsed,
        })
    }
}
