use std::collections::HashSet;

use crate::error::ValidationError;
use crate::logging::LogContext;

/// Recipient used for contract-creation transactions
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Normalize an address to `0x` followed by 40 lowercase hex digits
pub fn normalize_address(address: &str) -> Result<String, ValidationError> {
    let trimmed = address.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if body.len() != 40 {
        return Err(ValidationError::InvalidAddress(format!(
            "{} (expected 40 hex characters, got {})",
            address,
            body.len()
        )));
    }

    if !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::InvalidAddress(format!(
            "{} (contains non-hex characters)",
            address
        )));
    }

    Ok(format!("0x{}", body.to_lowercase()))
}

/// Set of watched addresses in canonical form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchSet {
    addresses: HashSet<String>,
}

impl WatchSet {
    /// Build a set, dropping blank and malformed entries
    pub fn from_addresses<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = HashSet::new();
        for raw in addresses {
            let raw = raw.as_ref();
            if raw.trim().is_empty() {
                continue;
            }
            match normalize_address(raw) {
                Ok(address) => {
                    set.insert(address);
                }
                Err(e) => {
                    LogContext::new("watch_set", "from_addresses")
                        .with_metadata("entry", serde_json::json!(raw))
                        .warn(&format!("Dropping watch-list entry: {}", e));
                }
            }
        }
        Self { addresses: set }
    }

    /// Membership test; the argument may be in any case, with or without `0x`
    pub fn contains(&self, address: &str) -> bool {
        match normalize_address(address) {
            Ok(normalized) => self.addresses.contains(&normalized),
            Err(_) => false,
        }
    }

    /// Membership test for an address already in canonical form
    pub fn contains_canonical(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.addresses.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_address() {
        assert_eq!(
            normalize_address("0xABCDEF1234567890abcdef1234567890ABCDEF12").unwrap(),
            "0xabcdef1234567890abcdef1234567890abcdef12"
        );
        assert_eq!(
            normalize_address("  abcdef1234567890abcdef1234567890abcdef12 ").unwrap(),
            "0xabcdef1234567890abcdef1234567890abcdef12"
        );
        assert!(normalize_address("0x1234").is_err());
        assert!(normalize_address("0xGGGGGG1234567890abcdef1234567890abcdef12").is_err());
        assert!(normalize_address("").is_err());
    }

    #[test]
    fn test_from_addresses_drops_blank_and_invalid() {
        let set = WatchSet::from_addresses(vec![
            "",
            "   ",
            "not-an-address",
            "0xAA00000000000000000000000000000000000001",
            "0xaa00000000000000000000000000000000000001",
        ]);

        assert_eq!(set.len(), 1);
        assert!(set.contains("0xaa00000000000000000000000000000000000001"));
    }

    #[test]
    fn test_empty_list_yields_empty_set() {
        let set = WatchSet::from_addresses(Vec::<String>::new());
        assert!(set.is_empty());
        assert!(!set.contains(""));
    }

    #[test]
    fn test_contains_is_case_insensitive() {
        let set = WatchSet::from_addresses(["0xabcdef1234567890abcdef1234567890abcdef12"]);
        assert!(set.contains("0xABCDEF1234567890ABCDEF1234567890ABCDEF12"));
        assert!(set.contains("abcdef1234567890abcdef1234567890abcdef12"));
        assert!(!set.contains("0x0000000000000000000000000000000000000000"));
        assert!(set.contains_canonical("0xabcdef1234567890abcdef1234567890abcdef12"));
    }
}
