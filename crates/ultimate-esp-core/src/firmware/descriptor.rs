//! Firmware descriptors

use serde::{Deserialize, Serialize};

/// Display name of a firmware given by custom URL
pub const CUSTOM_FIRMWARE_NAME: &str = "Custom";

/// Flash offset used for custom firmware
pub const BASE_FLASH_OFFSET: &str = "0x0";

/// One firmware image: where to get it and where it goes in flash
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirmwareDescriptor {
    /// Display name
    pub name: String,
    /// Download URL or local path
    pub url: String,
    /// Flash address as written in the catalog, e.g. `"0x10000"`
    pub flash_offset: String,
}

impl FirmwareDescriptor {
    /// Descriptor for a custom URL, written at the base address
    pub fn custom(url: impl Into<String>) -> Self {
        Self {
            name: CUSTOM_FIRMWARE_NAME.to_string(),
            url: url.into(),
            flash_offset: BASE_FLASH_OFFSET.to_string(),
        }
    }

    /// Parsed flash address, if the offset is well-formed
    pub fn address(&self) -> Option<u32> {
        parse_flash_offset(&self.flash_offset)
    }
}

/// Parse a flash offset: `0x`/`0X` prefix for hexadecimal, decimal otherwise
pub fn parse_flash_offset(text: &str) -> Option<u32> {
    let text = text.trim();
    match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => text.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_flash_offset() {
        assert_eq!(parse_flash_offset("0x0"), Some(0));
        assert_eq!(parse_flash_offset("0x1000"), Some(0x1000));
        assert_eq!(parse_flash_offset("0X10000"), Some(0x10000));
        assert_eq!(parse_flash_offset(" 65536 "), Some(65536));
        assert_eq!(parse_flash_offset("0x"), None);
        assert_eq!(parse_flash_offset("0xZZ"), None);
        assert_eq!(parse_flash_offset("-1"), None);
        assert_eq!(parse_flash_offset(""), None);
    }

    #[test]
    fn test_custom_descriptor() {
        let fw = FirmwareDescriptor::custom("https://example.com/fw.bin");
        assert_eq!(fw.name, "Custom");
        assert_eq!(fw.flash_offset, "0x0");
        assert_eq!(fw.address(), Some(0));
    }

    #[test]
    fn test_descriptor_json_field_names() {
        let fw: FirmwareDescriptor = serde_json::from_str(
            r#"{"name":"v1","url":"u1","flashOffset":"0x1000"}"#,
        )
        .unwrap();
        assert_eq!(fw.flash_offset, "0x1000");

        let json = serde_json::to_value(&fw).unwrap();
        assert_eq!(json["flashOffset"], "0x1000");
    }
}
