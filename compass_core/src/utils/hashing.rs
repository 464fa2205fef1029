//! Utility functions for getting content hashes
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Hex encoded sha256 over the JSON serialization of each part, in order
///
/// Parts are length prefixed so that moving bytes between neighbours changes the hash.
pub(crate) fn sha256_hex(parts: &[&dyn ErasedJson]) -> Result<String, serde_json::Error> {
    let mut hasher = Sha256::new();
    for part in parts {
        let json = part.to_json()?;
        hasher.update((json.len() as u64).to_le_bytes());
        hasher.update(json.as_bytes());
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Object safe wrapper over [`Serialize`] so differently typed parts can be hashed together
pub(crate) trait ErasedJson {
    fn to_json(&self) -> Result<String, serde_json::Error>;
}

impl<T: Serialize> ErasedJson for T {
    fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
