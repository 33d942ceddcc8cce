//! ECDSA key management for the ledger
//!
//! Provides key pair generation, signing, and verification using
//! the secp256k1 elliptic curve (same as Bitcoin). Keys, digests and
//! signatures cross the API boundary as hex strings.

use rand::rngs::OsRng;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid message digest")]
    InvalidDigest,
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Ok(Self {
            secret_key,
            public_key,
        })
    }

    /// Get the private key as a hex string
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Get the public key as a hex string (compressed format)
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }
}

fn digest_message(message_hash_hex: &str) -> Result<Message, KeyError> {
    let digest = hex::decode(message_hash_hex).map_err(|_| KeyError::InvalidDigest)?;
    Ok(Message::from_digest_slice(&digest)?)
}

/// Sign a hex SHA-256 digest with a hex private key, returning a hex
/// compact signature
pub fn sign_hex(private_key_hex: &str, message_hash_hex: &str) -> Result<String, KeyError> {
    let key_pair = KeyPair::from_private_key_hex(private_key_hex)?;
    let message = digest_message(message_hash_hex)?;
    let secp = Secp256k1::new();
    let signature = secp.sign_ecdsa(&message, &key_pair.secret_key);
    Ok(hex::encode(signature.serialize_compact()))
}

/// Verify a hex compact signature over a hex digest against a hex public key.
///
/// Malformed keys or signatures are caller data and simply fail to verify.
pub fn verify_hex(public_key_hex: &str, message_hash_hex: &str, signature_hex: &str) -> bool {
    let Ok(key_bytes) = hex::decode(public_key_hex) else {
        return false;
    };
    let Ok(public_key) = PublicKey::from_slice(&key_bytes) else {
        return false;
    };
    let Ok(sig_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(signature) = Signature::from_compact(&sig_bytes) else {
        return false;
    };
    let Ok(message) = digest_message(message_hash_hex) else {
        return false;
    };

    let secp = Secp256k1::verification_only();
    secp.verify_ecdsa(&message, &signature, &public_key).is_ok()
}
