//! Hashing - SHA-256 fingerprints recorded in the run manifest

use sha2::{Digest, Sha256};

use crate::palette::IndirectionTable;

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Fingerprint of the slot assignment. The table holds only ordered maps and
/// vectors, so its compact JSON form is already deterministic.
pub fn compute_table_hash(table: &IndirectionTable) -> Result<String, serde_json::Error> {
    Ok(sha256_hex(&serde_json::to_vec(table)?))
}
