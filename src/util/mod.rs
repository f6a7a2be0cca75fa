//! Shared utility functions.

pub mod address;
pub mod decimal;

pub use address::{address_key, normalize_address, parse_address};
pub use decimal::parse_u256;
