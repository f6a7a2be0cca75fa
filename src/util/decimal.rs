//! Big-integer serde helpers.
//!
//! Chain amounts are `U256` and cross every JSON boundary as decimal
//! strings. Deserialization is lenient: decimal strings, `0x` hex strings
//! and plain JSON integers are all accepted.

use alloy::primitives::U256;
use serde::{Deserialize, Deserializer, Serializer};

/// A JSON value that is either an integer or a numeric string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum NumberOrString {
    Number(u64),
    String(String),
}

impl NumberOrString {
    pub fn to_u256(&self) -> Result<U256, String> {
        match self {
            NumberOrString::Number(n) => Ok(U256::from(*n)),
            NumberOrString::String(s) => parse_u256(s),
        }
    }

    pub fn to_u64(&self) -> Result<u64, String> {
        let value = self.to_u256()?;
        u64::try_from(value).map_err(|_| format!("{} does not fit in u64", value))
    }
}

/// Parse a decimal (or `0x` hex) string into a `U256`
pub fn parse_u256(raw: &str) -> Result<U256, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("empty numeric string".to_string());
    }
    let parsed = match trimmed.strip_prefix("0x") {
        Some(hex) => U256::from_str_radix(hex, 16),
        None => U256::from_str_radix(trimmed, 10),
    };
    parsed.map_err(|e| format!("invalid integer {:?}: {}", raw, e))
}

pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
    NumberOrString::deserialize(deserializer)?
        .to_u256()
        .map_err(serde::de::Error::custom)
}

/// `Option<U256>` as an optional decimal string
pub mod option {
    use super::NumberOrString;
    use alloy::primitives::U256;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<U256>, D::Error> {
        Option::<NumberOrString>::deserialize(deserializer)?
            .map(|raw| raw.to_u256())
            .transpose()
            .map_err(serde::de::Error::custom)
    }
}
