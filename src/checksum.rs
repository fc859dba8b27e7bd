//! Document fingerprints
//!
//! A SHA-256 over the compact serialized document. Two syntheses of the
//! same declarations must produce the same fingerprint.

use sha2::{Digest, Sha256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SHA256 checksum of emitted content
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Checksum of a JSON value in its compact, insertion-ordered form
    pub fn from_json(value: &serde_json::Value) -> Self {
        let canonical = serde_json::to_string(value).unwrap_or_default();
        Self::from_bytes(canonical.as_bytes())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn verify(&self, content: &[u8]) -> bool {
        Self::from_bytes(content) == *self
    }

    /// `sha256sum`-style line for a sidecar file
    pub fn sidecar_line(&self, file_name: &str) -> String {
        format!("{}  {}\n", self.0, file_name)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Checksum {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_checksum_consistency() {
        let doc = json!({"resource": {"aws_vpc": {"main": {"cidr_block": "10.0.0.0/16"}}}});
        assert_eq!(Checksum::from_json(&doc), Checksum::from_json(&doc.clone()));
    }

    #[test]
    fn test_checksum_is_order_sensitive() {
        let a = json!({"a": 1, "b": 2});
        let b = json!({"b": 2, "a": 1});
        assert_ne!(Checksum::from_json(&a), Checksum::from_json(&b));
    }

    #[test]
    fn test_checksum_verification() {
        let checksum = Checksum::from_bytes(b"{}");
        assert!(checksum.verify(b"{}"));
        assert!(!checksum.verify(b"[]"));
        assert_eq!(checksum.as_str().len(), 64);
        assert!(checksum.sidecar_line("main.tf.json").ends_with("  main.tf.json\n"));
    }
}
