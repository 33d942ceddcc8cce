//! Hashing utilities for the ledger
//!
//! Every content hash in the system (transactions, inputs, outputs and
//! blocks) is a lowercase hex SHA-256 digest of a string concatenation.

use sha2::{Digest, Sha256};

/// Length of a hex encoded SHA-256 digest
pub const HASH_HEX_LEN: usize = 64;

/// Computes SHA-256 hash of the input data
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Computes SHA-256 hash and returns it as a hex string
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Checks if a hex hash meets the difficulty target
/// The hash must start with `difficulty` `'0'` characters
pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let required = difficulty as usize;
    if required > hash.len() {
        return false;
    }
    hash.bytes().take(required).all(|c| c == b'0')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256() {
        let data = b"hello world";
        let hash = sha256(data);
        assert_eq!(hash.len(), 32);
        assert_eq!(
            sha256_hex(data),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
        assert_eq!(sha256_hex(data).len(), HASH_HEX_LEN);
    }

    #[test]
    fn test_meets_difficulty() {
        let hash = "000fab";
        assert!(meets_difficulty(hash, 0));
        assert!(meets_difficulty(hash, 3));
        assert!(!meets_difficulty(hash, 4));
        // Longer than the hash itself can never match
        assert!(!meets_difficulty(hash, 10));
    }
}
