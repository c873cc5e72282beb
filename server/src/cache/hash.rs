//! Hashing utilities for blob addressing

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash (blob store key) of data
pub fn sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256() {
        let data = b"test data";
        let hash = sha256(data);
        assert_eq!(hash.len(), 64); // SHA-256 produces 64 hex chars
    }

    #[test]
    fn test_sha256_deterministic() {
        let data = b"test data";
        let h1 = sha256(data);
        let h2 = sha256(data);
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_sha256_differs_per_input() {
        assert_ne!(sha256(b"a"), sha256(b"b"));
    }
}
