//! Firmware selection

use serde::{Deserialize, Serialize};

use super::{FirmwareCatalog, FirmwareDescriptor};

/// What the operator picked in the firmware form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FirmwareSelection {
    /// Custom firmware URL; overrides the catalog when non-blank
    pub custom_url: String,
    /// Selected device key
    pub device: String,
    /// Selected build index, as entered
    pub build_index: String,
}

impl FirmwareSelection {
    /// Select a catalog build
    pub fn catalog(device: impl Into<String>, build_index: usize) -> Self {
        Self {
            custom_url: String::new(),
            device: device.into(),
            build_index: build_index.to_string(),
        }
    }

    /// Select a custom URL
    pub fn custom(url: impl Into<String>) -> Self {
        Self {
            custom_url: url.into(),
            ..Self::default()
        }
    }

    /// Resolve against `catalog`
    pub fn resolve(&self, catalog: &FirmwareCatalog) -> Option<FirmwareDescriptor> {
        resolve(&self.custom_url, &self.device, &self.build_index, catalog)
    }
}

/// Resolve the firmware to flash.
///
/// A non-blank custom URL wins and bypasses the catalog. Otherwise the build at
/// `build_index` of `device_key` is used; a non-numeric index means 0. Returns
/// `None` for unknown devices, empty build lists and out-of-range indices.
pub fn resolve(
    custom_url: &str,
    device_key: &str,
    build_index: &str,
    catalog: &FirmwareCatalog,
) -> Option<FirmwareDescriptor> {
    let custom_url = custom_url.trim();
    if !custom_url.is_empty() {
        return Some(FirmwareDescriptor::custom(custom_url));
    }

    let builds = catalog.builds(device_key);
    let index = parse_build_index(build_index)?;
    builds.get(index).cloned()
}

/// Leading-integer parse of a build index.
///
/// Text without leading digits counts as 0. Negative values and values that do
/// not fit yield `None` since no build can sit there.
fn parse_build_index(text: &str) -> Option<usize> {
    let text = text.trim_start();
    let (negative, rest) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let digits = rest[..end].trim_start_matches('0');

    if digits.is_empty() {
        return Some(0);
    }
    if negative {
        return None;
    }
    digits.parse().ok()
}
