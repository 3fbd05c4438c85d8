//! Firmware catalog

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{FetchError, FirmwareDescriptor, FirmwareFetcher};
use crate::status::{messages, Severity, StatusSink};

/// Errors that can occur while loading the catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to fetch firmware catalog: {0}")]
    Fetch(#[from] FetchError),

    #[error("Malformed firmware catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Available builds per device.
///
/// Devices iterate in the order the catalog lists them; the first device is
/// the default selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FirmwareCatalog {
    devices: IndexMap<String, Vec<FirmwareDescriptor>>,
}

impl FirmwareCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a catalog from JSON text
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a catalog from raw JSON bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CatalogError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Fetch and parse the catalog at `source` (URL or path)
    pub async fn load<F: FirmwareFetcher>(fetcher: &F, source: &str) -> Result<Self, CatalogError> {
        let bytes = fetcher.fetch(source).await?;
        let catalog = Self::from_slice(&bytes)?;
        tracing::info!(
            "Loaded firmware catalog from {} ({} devices)",
            source,
            catalog.devices.len()
        );
        Ok(catalog)
    }

    /// Load the catalog, degrading to an empty one with a warning status
    pub async fn load_or_empty<F: FirmwareFetcher>(
        fetcher: &F,
        source: &str,
        status: &dyn StatusSink,
    ) -> Self {
        match Self::load(fetcher, source).await {
            Ok(catalog) => catalog,
            Err(e) => {
                tracing::warn!("Firmware catalog unavailable: {}", e);
                status.set_status(messages::NO_CATALOG, Severity::Warning);
                Self::default()
            }
        }
    }

    /// Add or replace the builds of a device
    pub fn insert(&mut self, device: impl Into<String>, builds: Vec<FirmwareDescriptor>) {
        self.devices.insert(device.into(), builds);
    }

    /// Whether no device is listed
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Device keys in display order
    pub fn devices(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    /// Device selected when nothing else is chosen
    pub fn default_device(&self) -> Option<&str> {
        self.devices().next()
    }

    /// Builds of a device; empty for unknown devices
    pub fn builds(&self, device: &str) -> &[FirmwareDescriptor] {
        self.devices.get(device).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Build names of a device, in index order
    pub fn build_names(&self, device: &str) -> Vec<&str> {
        self.builds(device).iter().map(|b| b.name.as_str()).collect()
    }
}

impl FromIterator<(String, Vec<FirmwareDescriptor>)> for FirmwareCatalog {
    fn from_iter<I: IntoIterator<Item = (String, Vec<FirmwareDescriptor>)>>(iter: I) -> Self {
        Self {
            devices: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const CATALOG: &str = r#"{
        "ESP8266": [
            { "name": "IR Blaster", "url": "https://example.com/8266.bin", "flashOffset": "0x0" }
        ],
        "ESP32": [
            { "name": "Stable", "url": "https://example.com/stable.bin", "flashOffset": "0x10000" },
            { "name": "Nightly", "url": "https://example.com/nightly.bin", "flashOffset": "0x10000" }
        ],
        "Empty": []
    }"#;

    #[test]
    fn test_parse_catalog() {
        let catalog = FirmwareCatalog::from_json(CATALOG).unwrap();
        assert_eq!(catalog.devices().collect::<Vec<_>>(), vec!["ESP8266", "ESP32", "Empty"]);
        assert_eq!(catalog.default_device(), Some("ESP8266"));
        assert_eq!(catalog.build_names("ESP32"), vec!["Stable", "Nightly"]);
        assert_eq!(catalog.builds("ESP32")[1].url, "https://example.com/nightly.bin");
        assert!(catalog.builds("Empty").is_empty());
        assert!(catalog.builds("Unknown").is_empty());
    }

    #[test]
    fn test_malformed_catalog() {
        assert!(matches!(
            FirmwareCatalog::from_json(r#"["not", "a", "map"]"#),
            Err(CatalogError::Parse(_))
        ));
        assert!(matches!(
            FirmwareCatalog::from_json(r#"{"ESP32": [{"name": "no url"}]}"#),
            Err(CatalogError::Parse(_))
        ));
    }

    #[test]
    fn test_devices_keep_file_order() {
        let catalog = FirmwareCatalog::from_json(
            r#"{"Zeta": [], "ESP8266": [], "ESP32": [], "Alpha": []}"#,
        )
        .unwrap();
        assert_eq!(
            catalog.devices().collect::<Vec<_>>(),
            vec!["Zeta", "ESP8266", "ESP32", "Alpha"]
        );
        assert_eq!(catalog.default_device(), Some("Zeta"));

        let json = serde_json::to_string(&catalog).unwrap();
        assert!(json.find("Zeta").unwrap() < json.find("Alpha").unwrap());
    }

    #[test]
    fn test_insert_appends_new_devices() {
        let mut catalog = FirmwareCatalog::from_json(r#"{"ESP8266": []}"#).unwrap();
        catalog.insert("ESP32", Vec::new());
        catalog.insert("ESP8266", Vec::new());
        assert_eq!(catalog.devices().collect::<Vec<_>>(), vec!["ESP8266", "ESP32"]);
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = FirmwareCatalog::new();
        assert!(catalog.is_empty());
        assert_eq!(catalog.default_device(), None);
    }
}
