//! Address normalization.
//!
//! Every collection in the index is keyed by the lowercased `0x`-prefixed
//! hex form of an address, so lookups are case-insensitive.

use crate::error::{IndexerError, Result};
use alloy::primitives::Address;
use std::str::FromStr;

/// Map key for a decoded chain address
pub fn address_key(address: &Address) -> String {
    address.to_string().to_lowercase()
}

/// Normalize a caller-supplied address string to map-key form.
///
/// Does not validate; unknown or malformed input simply matches nothing.
pub fn normalize_address(address: &str) -> String {
    let lowered = address.trim().to_lowercase();
    if lowered.starts_with("0x") {
        lowered
    } else {
        format!("0x{}", lowered)
    }
}

/// Strictly parse an address (20 bytes of hex, optional `0x` prefix)
pub fn parse_address(address: &str) -> Result<Address> {
    let trimmed = address.trim();
    let hex = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(IndexerError::InvalidAddress(address.to_string()));
    }
    Address::from_str(hex).map_err(|_| IndexerError::InvalidAddress(address.to_string()))
}
