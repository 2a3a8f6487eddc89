use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of the exact query bytes.
///
/// The text is hashed as-is: no trimming, no whitespace folding. Two queries that differ
/// only in formatting are two different persisted queries.
pub fn hash(query: &str) -> String {
  hex::encode(Sha256::digest(query.as_bytes()))
}

/// Case-sensitive comparison against the lowercase digest.
pub fn verify(query: &str, claimed_hash: &str) -> bool {
  hash(query) == claimed_hash
}
