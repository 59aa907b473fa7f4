//! Peripheral identifier helpers.

use btleplug::platform::PeripheralId;

/// Address macOS reports for every peripheral.
const NULL_ADDRESS: &str = "00:00:00:00:00:00";

/// Format a peripheral ID as a string.
///
/// On macOS, peripheral IDs are UUIDs. On other platforms they are MAC
/// addresses.
pub fn format_peripheral_id(id: &PeripheralId) -> String {
    format!("{:?}", id)
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

/// Create an identifier string from an address and peripheral ID.
///
/// Uses the peripheral ID where the address is unusable (macOS).
pub fn create_identifier(address: &str, peripheral_id: &PeripheralId) -> String {
    if address == NULL_ADDRESS {
        format_peripheral_id(peripheral_id)
    } else {
        address.to_string()
    }
}

/// Whether a peripheral matches a user-supplied identifier.
///
/// `identifier_lower` must already be lowercase. Matches, in order:
/// - a substring of the peripheral ID
/// - the address, with or without colons
/// - a substring of the advertised name
pub fn matches_identifier(
    identifier_lower: &str,
    address: &str,
    peripheral_id: &str,
    name: Option<&str>,
) -> bool {
    if identifier_lower.is_empty() {
        return false;
    }

    if peripheral_id.to_lowercase().contains(identifier_lower) {
        return true;
    }

    let address = address.to_lowercase();
    if address != NULL_ADDRESS
        && (address == identifier_lower
            || address.replace(':', "") == identifier_lower.replace(':', ""))
    {
        return true;
    }

    name.is_some_and(|n| n.to_lowercase().contains(identifier_lower))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_address_with_and_without_colons() {
        let address = "C4:BE:84:12:34:56";
        assert!(matches_identifier("c4:be:84:12:34:56", address, "", None));
        assert!(matches_identifier("c4be84123456", address, "", None));
        assert!(!matches_identifier("c4:be:84:12:34:57", address, "", None));
    }

    #[test]
    fn test_null_address_never_matches_by_address() {
        assert!(!matches_identifier("000000000000", NULL_ADDRESS, "", None));
    }

    #[test]
    fn test_matches_peripheral_id_substring() {
        let id = "6A3B1C2D-0000-1111-2222-333344445555";
        assert!(matches_identifier("6a3b1c2d", NULL_ADDRESS, id, None));
    }

    #[test]
    fn test_matches_name_substring() {
        assert!(matches_identifier(
            "hallway",
            NULL_ADDRESS,
            "",
            Some("Switchmate Hallway")
        ));
        assert!(!matches_identifier("", NULL_ADDRESS, "", Some("Switchmate")));
    }
}
