//! Package digests.
//!
//! A digest identifies archive bytes in logs and lets callers confirm an
//! override resubmits exactly what was first built.

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}
