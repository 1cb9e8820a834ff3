//! Deterministic content hashing for canonical records.
//!
//! The digest covers every canonical field as a `field=value` pair, sorted by
//! field name so the result is independent of declaration order. Missing
//! values hash as an empty string, which keeps "no value" distinct from any
//! legitimate value without inventing a sentinel that could collide with real
//! data. The same digest serves two purposes: a deduplication key within a
//! run and a change-detection marker against previously persisted rows.

use sha2::{Digest, Sha256};

/// Hex SHA-256 over sorted `field=value` pairs joined with `|`.
pub fn digest(fields: &[(&str, Option<String>)]) -> String {
    let mut pairs: Vec<(&str, &str)> = fields
        .iter()
        .map(|(name, value)| (*name, value.as_deref().unwrap_or("")))
        .collect();
    pairs.sort_by_key(|(name, _)| *name);

    let joined = pairs
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("|");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    let hash = hasher.finalize();
    hash.iter().map(|byte| format!("{byte:02x}")).collect()
}
