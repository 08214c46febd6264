//! Utility functions for nusterm-core.

use btleplug::platform::PeripheralId;

/// Format a peripheral ID as a string.
///
/// On macOS, peripheral IDs are UUIDs. On other platforms, they may be
/// MAC addresses or other formats. This function extracts the useful
/// identifier string.
pub fn format_peripheral_id(id: &PeripheralId) -> String {
    format!("{:?}", id)
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

/// Create an identifier string from an address and peripheral ID.
///
/// On macOS where addresses are 00:00:00:00:00:00, uses the peripheral ID.
/// On other platforms, uses the Bluetooth address.
pub fn create_identifier(address: &str, peripheral_id: &PeripheralId) -> String {
    choose_identifier(address, || format_peripheral_id(peripheral_id))
}

fn choose_identifier(address: &str, fallback: impl FnOnce() -> String) -> String {
    if address == "00:00:00:00:00:00" {
        fallback()
    } else {
        address.to_string()
    }
}

/// Whether a user-supplied identifier selects a device.
///
/// Matches case-insensitively on a name substring, on the full address with
/// or without colons, or on a peripheral ID substring.
pub fn matches_identifier(needle: &str, name: Option<&str>, identifier: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return false;
    }

    let identifier = identifier.to_lowercase();
    if identifier.contains(&needle) || identifier.replace(':', "") == needle.replace(':', "") {
        return true;
    }

    name.is_some_and(|n| n.to_lowercase().contains(&needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_choose_identifier_prefers_real_address() {
        let id = choose_identifier("AA:BB:CC:DD:EE:FF", || "fallback".to_string());
        assert_eq!(id, "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn test_choose_identifier_falls_back_on_zero_address() {
        let id = choose_identifier("00:00:00:00:00:00", || "fallback".to_string());
        assert_eq!(id, "fallback");
    }

    #[test]
    fn test_matches_by_name_substring() {
        assert!(matches_identifier("shell", Some("Zephyr Shell"), "AA:BB:CC:DD:EE:FF"));
        assert!(!matches_identifier("shell", Some("Thingy"), "AA:BB:CC:DD:EE:FF"));
    }

    #[test]
    fn test_matches_by_address_without_colons() {
        assert!(matches_identifier("aabbccddeeff", None, "AA:BB:CC:DD:EE:FF"));
        assert!(matches_identifier("aa:bb:cc:dd:ee:ff", None, "AA:BB:CC:DD:EE:FF"));
    }

    #[test]
    fn test_blank_needle_matches_nothing() {
        assert!(!matches_identifier("  ", Some("Zephyr Shell"), "AA:BB"));
    }
}
