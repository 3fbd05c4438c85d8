//! Firmware Selection
//!
//! Resolves which firmware image to flash, either from the firmware catalog or
//! from a custom URL, and downloads it.
//!
//! ## Catalog format
//!
//! The catalog is a JSON object mapping a device key to its builds:
//! ```text
//! {
//!   "ESP32-DevKitC": [
//!     { "name": "Stable", "url": "https://.../stable.bin", "flashOffset": "0x10000" },
//!     { "name": "Nightly", "url": "https://.../nightly.bin", "flashOffset": "0x10000" }
//!   ]
//! }
//! ```

mod catalog;
mod descriptor;
mod fetch;
mod selector;

pub use catalog::{CatalogError, FirmwareCatalog};
pub use descriptor::{parse_flash_offset, FirmwareDescriptor, BASE_FLASH_OFFSET, CUSTOM_FIRMWARE_NAME};
pub use fetch::{FetchError, FirmwareFetcher, HttpFetcher};
pub use selector::{resolve, FirmwareSelection};
