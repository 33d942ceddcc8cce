//! Cryptographic utilities for the ledger
//!
//! This module provides:
//! - SHA-256 hashing
//! - ECDSA key management (secp256k1)

pub mod hash;
pub mod keys;

pub use hash::{meets_difficulty, sha256, sha256_hex, HASH_HEX_LEN};
pub use keys::{sign_hex, verify_hex, KeyError, KeyPair};
