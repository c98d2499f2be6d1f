//! Content hash types.

use alloy_primitives::{B256, keccak256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A 32-byte keccak-256 content identifier.
///
/// Always rendered as `0x` followed by 64 lowercase hex characters. Parsing
/// accepts input with or without the prefix and normalizes it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RootHash(B256);

impl RootHash {
    /// Create a RootHash from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(B256::from(bytes))
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0.0
    }

    /// Get the underlying fixed-bytes value.
    pub fn as_b256(&self) -> B256 {
        self.0
    }

    /// Compute keccak-256 of data.
    pub fn compute(data: &[u8]) -> Self {
        Self(keccak256(data))
    }

    /// Hash two child nodes into their parent.
    pub fn combine(left: &RootHash, right: &RootHash) -> Self {
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(left.as_bytes());
        buf[32..].copy_from_slice(right.as_bytes());
        Self(keccak256(buf))
    }

    /// Parse from hex, with or without the `0x` prefix.
    pub fn from_hex(s: &str) -> crate::Result<Self> {
        let normalized = normalize_hex(s)?;
        let bytes = alloy_primitives::hex::decode(&normalized[2..])
            .map_err(|e| crate::Error::InvalidRootHash(e.to_string()))?;
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self::from_bytes(arr))
    }

    /// Encode as `0x`-prefixed lowercase hex.
    pub fn to_hex(&self) -> String {
        format!("0x{}", alloy_primitives::hex::encode(self.0))
    }

    /// Object key used by key/value backed networks.
    pub fn to_object_key(&self) -> String {
        let hex = alloy_primitives::hex::encode(self.0);
        format!("files/{}/{}/{}", &hex[..2], &hex[2..4], hex)
    }
}

/// Normalize a root hash string to canonical `0x`-prefixed lowercase form.
///
/// Rejects anything that is not exactly 64 hex digits after the optional prefix.
pub fn normalize_hex(s: &str) -> crate::Result<String> {
    let trimmed = s.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if digits.len() != 64 {
        return Err(crate::Error::InvalidRootHash(format!(
            "expected 64 hex chars, got {}",
            digits.len()
        )));
    }
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(crate::Error::InvalidRootHash(
            "contains non-hex characters".to_string(),
        ));
    }

    Ok(format!("0x{}", digits.to_ascii_lowercase()))
}

impl From<B256> for RootHash {
    fn from(value: B256) -> Self {
        Self(value)
    }
}

impl FromStr for RootHash {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::from_hex(s)
    }
}

impl fmt::Debug for RootHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RootHash({})", &self.to_hex()[..18])
    }
}

impl fmt::Display for RootHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for RootHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for RootHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_hash_hex_is_prefixed() {
        let hash = RootHash::compute(b"hello world");
        let hex = hash.to_hex();
        assert!(hex.starts_with("0x"));
        assert_eq!(hex.len(), 66);
        assert_eq!(RootHash::from_hex(&hex).unwrap(), hash);
    }

    #[test]
    fn test_root_hash_accepts_unprefixed_and_uppercase() {
        let hash = RootHash::compute(b"data");
        let bare = hash.to_hex()[2..].to_ascii_uppercase();
        assert_eq!(RootHash::from_hex(&bare).unwrap(), hash);
        assert_eq!(normalize_hex(&bare).unwrap(), hash.to_hex());
    }

    #[test]
    fn test_root_hash_rejects_malformed() {
        assert!(RootHash::from_hex("0x1234").is_err());
        assert!(RootHash::from_hex(&"z".repeat(64)).is_err());
        assert!(RootHash::from_hex("").is_err());
    }

    #[test]
    fn test_root_hash_serde_uses_hex() {
        let hash = RootHash::compute(b"serde");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash.to_hex()));
        let parsed: RootHash = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, hash);
    }

    #[test]
    fn test_object_key_layout() {
        let key = RootHash::compute(b"test").to_object_key();
        let parts: Vec<_> = key.split('/').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "files");
        assert_eq!(parts[3].len(), 64);
    }
}
