//! Wallet implementation for the ledger
//!
//! Holds a key pair and signs transfers. The ledger never sees private
//! keys; it only verifies signatures against the public key, which doubles
//! as the wallet address.

use crate::core::{Transaction, TransactionInput, TransactionOutput, TransactionType};
use crate::crypto::{KeyError, KeyPair};
use serde::Serialize;
use thiserror::Error;

/// Wallet-related errors
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Amount must be greater than zero")]
    InvalidAmount,
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
}

/// Printable wallet material
#[derive(Debug, Clone, Serialize)]
pub struct WalletInfo {
    pub public_key: String,
    pub private_key: String,
}

/// A ledger wallet for managing keys and creating transactions
pub struct Wallet {
    /// The key pair for signing transactions
    key_pair: KeyPair,
}

impl Wallet {
    /// Create a new wallet with a fresh key pair
    pub fn new() -> Self {
        Self {
            key_pair: KeyPair::generate(),
        }
    }

    /// Import a wallet from a private key
    pub fn from_private_key(private_key_hex: &str) -> Result<Self, WalletError> {
        let key_pair = KeyPair::from_private_key_hex(private_key_hex)?;
        Ok(Self { key_pair })
    }

    /// Get the wallet's address (hex public key)
    pub fn public_key(&self) -> String {
        self.key_pair.public_key_hex()
    }

    /// Get the wallet's private key (hex)
    /// WARNING: Keep this secret!
    pub fn private_key(&self) -> String {
        self.key_pair.private_key_hex()
    }

    pub fn info(&self) -> WalletInfo {
        WalletInfo {
            public_key: self.public_key(),
            private_key: self.private_key(),
        }
    }

    /// Create a signed transfer of `amount` to `recipient`, funded by the
    /// transaction `previous_tx`
    pub fn transfer(
        &self,
        recipient: &str,
        amount: u64,
        previous_tx: &str,
    ) -> Result<Transaction, WalletError> {
        if amount == 0 {
            return Err(WalletError::InvalidAmount);
        }

        let mut input = TransactionInput::new(&self.public_key(), amount, previous_tx);
        input.sign(&self.private_key())?;

        Ok(Transaction::new(
            TransactionType::Regular,
            vec![input],
            vec![TransactionOutput::new(recipient, amount)],
        ))
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}
