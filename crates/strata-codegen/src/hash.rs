//! Content hashing for change detection.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// SHA-256 of file content, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn of(content: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Hash of optional content; `None` stands for a missing file.
    pub fn of_existing(content: Option<&str>) -> Option<Self> {
        content.map(Self::of)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex digits, for log lines.
    pub fn short(&self) -> &str {
        &self.0[..12]
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
