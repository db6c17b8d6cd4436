//! Content hashing for backup deduplication.
//!
//! Values are hashed as compact JSON with object keys in sorted order, so two
//! states that differ only in field order hash identically.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Serialize `value` with sorted object keys.
pub fn canonical_json<T: Serialize>(value: &T) -> crate::Result<String> {
  // `Value` objects are `BTreeMap`s, so re-serializing sorts every level.
  let value = serde_json::to_value(value)?;
  Ok(serde_json::to_string(&value)?)
}

/// Hex-encoded SHA-256 of [`canonical_json`].
pub fn content_hash<T: Serialize>(value: &T) -> crate::Result<String> {
  let json = canonical_json(value)?;
  Ok(hex::encode(Sha256::digest(json.as_bytes())))
}
