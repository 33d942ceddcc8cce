//! Transaction handling for the ledger
//!
//! A transaction moves value from signed inputs to outputs. Inputs name the
//! transaction that funded them by hash; the ledger does not keep an
//! unspent-output set, so validity rests on signatures and amount balance.
//! FEE transactions have no inputs and credit the miner of their block.

use crate::crypto::{sha256_hex, sign_hex, verify_hex, KeyError};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use thiserror::Error;

/// Current wall-clock time in epoch milliseconds
pub fn current_timestamp() -> i64 {
    Utc::now().timestamp_millis()
}

static LAST_FEE_TIMESTAMP: AtomicI64 = AtomicI64::new(0);

fn next_fee_timestamp() -> i64 {
    let now = current_timestamp();
    let previous = LAST_FEE_TIMESTAMP.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
        Some(now.max(last + 1))
    });
    match previous {
        Ok(last) | Err(last) => now.max(last + 1),
    }
}

fn sum_amounts(amounts: impl Iterator<Item = u64>) -> u64 {
    amounts.fold(0, u64::saturating_add)
}

// =============================================================================
// Error Types
// =============================================================================

/// Transaction output validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OutputError {
    #[error("Output amount must be greater than zero")]
    NonPositiveAmount,
    #[error("Output destination is required")]
    MissingDestination,
}

/// Transaction input validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Signature and previous tx are required")]
    MissingReference,
    #[error("Input amount must be greater than zero")]
    NonPositiveAmount,
    #[error("Invalid tx input signature")]
    BadSignature,
}

/// Transaction validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("Invalid hash")]
    InvalidHash,
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(i64),
    #[error("Invalid outputs: {0}")]
    InvalidOutputs(String),
    #[error("Invalid inputs: {0}")]
    InvalidInput(String),
    #[error("Regular transactions need at least one input")]
    MissingInputs,
    #[error("Input amounts ({input}) must be equal or greater than output amounts ({output})")]
    InsufficientInput { input: u64, output: u64 },
    #[error("Invalid output reference hash")]
    OutputReferenceMismatch,
}

// =============================================================================
// Transaction Type
// =============================================================================

/// Kind of transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    /// Value transfer between wallets
    #[default]
    Regular,
    /// Block-local reward crediting the miner
    Fee,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Regular => write!(f, "REGULAR"),
            TransactionType::Fee => write!(f, "FEE"),
        }
    }
}

// =============================================================================
// Transaction Input
// =============================================================================

/// Transaction input (signed claim on a previous transaction)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionInput {
    /// Public key (hex) of the spender
    pub from_address: String,
    /// Amount being spent
    pub amount: u64,
    /// Hash of the transaction that funded this input
    pub previous_tx: String,
    /// Hex compact ECDSA signature over `compute_hash()`
    #[serde(default)]
    pub signature: String,
}

impl TransactionInput {
    /// Create an unsigned input
    pub fn new(from_address: &str, amount: u64, previous_tx: &str) -> Self {
        Self {
            from_address: from_address.to_string(),
            amount,
            previous_tx: previous_tx.to_string(),
            signature: String::new(),
        }
    }

    /// Hash covered by the signature
    pub fn compute_hash(&self) -> String {
        sha256_hex(format!("{}{}{}", self.previous_tx, self.from_address, self.amount).as_bytes())
    }

    /// Sign this input with the spender's private key (hex)
    pub fn sign(&mut self, private_key_hex: &str) -> Result<(), KeyError> {
        self.signature = sign_hex(private_key_hex, &self.compute_hash())?;
        Ok(())
    }

    /// Check reference, amount and signature
    pub fn is_valid(&self) -> Result<(), InputError> {
        if self.previous_tx.is_empty() || self.signature.is_empty() {
            return Err(InputError::MissingReference);
        }

        if self.amount < 1 {
            return Err(InputError::NonPositiveAmount);
        }

        if !verify_hex(&self.from_address, &self.compute_hash(), &self.signature) {
            return Err(InputError::BadSignature);
        }

        Ok(())
    }
}

// =============================================================================
// Transaction Output
// =============================================================================

/// Transaction output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionOutput {
    /// Recipient's public key (hex)
    pub to_address: String,
    /// Amount of coins
    pub amount: u64,
    /// Hash of the owning transaction, stamped on construction
    #[serde(default)]
    pub tx_hash: String,
}

impl TransactionOutput {
    pub fn new(to_address: &str, amount: u64) -> Self {
        Self {
            to_address: to_address.to_string(),
            amount,
            tx_hash: String::new(),
        }
    }

    pub fn compute_hash(&self) -> String {
        sha256_hex(format!("{}{}", self.to_address, self.amount).as_bytes())
    }

    pub fn is_valid(&self) -> Result<(), OutputError> {
        if self.amount == 0 {
            return Err(OutputError::NonPositiveAmount);
        }

        if self.to_address.is_empty() {
            return Err(OutputError::MissingDestination);
        }

        Ok(())
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// Wire shape of a transaction; the hash is optional and computed when absent
#[derive(Debug, Deserialize)]
struct TransactionRecord {
    #[serde(default)]
    tx_type: TransactionType,
    timestamp: i64,
    #[serde(default)]
    hash: Option<String>,
    #[serde(default)]
    inputs: Vec<TransactionInput>,
    #[serde(default)]
    outputs: Vec<TransactionOutput>,
}

impl From<TransactionRecord> for Transaction {
    fn from(record: TransactionRecord) -> Self {
        Transaction::from_parts(
            record.tx_type,
            record.timestamp,
            record.hash,
            record.inputs,
            record.outputs,
        )
    }
}

/// A ledger transaction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "TransactionRecord")]
pub struct Transaction {
    pub tx_type: TransactionType,
    /// Creation time in epoch milliseconds
    pub timestamp: i64,
    pub hash: String,
    /// Signed inputs; empty for FEE transactions
    pub inputs: Vec<TransactionInput>,
    pub outputs: Vec<TransactionOutput>,
}

impl Transaction {
    /// Create a transaction stamped with the current time
    pub fn new(
        tx_type: TransactionType,
        inputs: Vec<TransactionInput>,
        outputs: Vec<TransactionOutput>,
    ) -> Self {
        Self::from_parts(tx_type, current_timestamp(), None, inputs, outputs)
    }

    /// Assemble a transaction from its parts.
    ///
    /// The hash is computed when `hash` is `None`, and every output is
    /// stamped with the final hash.
    pub fn from_parts(
        tx_type: TransactionType,
        timestamp: i64,
        hash: Option<String>,
        inputs: Vec<TransactionInput>,
        outputs: Vec<TransactionOutput>,
    ) -> Self {
        let mut tx = Self {
            tx_type,
            timestamp,
            hash: String::new(),
            inputs,
            outputs,
        };
        tx.hash = hash.unwrap_or_else(|| tx.compute_hash());
        tx.stamp_outputs();
        tx
    }

    /// Create a FEE transaction crediting `to_address`.
    ///
    /// A fee has no signatures, so its hash depends on the timestamp alone;
    /// each fee built in this process gets a strictly later timestamp.
    pub fn fee(to_address: &str, amount: u64) -> Self {
        Self::from_parts(
            TransactionType::Fee,
            next_fee_timestamp(),
            None,
            Vec::new(),
            vec![TransactionOutput::new(to_address, amount)],
        )
    }

    /// Recompute the hash and restamp the outputs after editing fields
    pub fn refresh_hash(&mut self) {
        self.hash = self.compute_hash();
        self.stamp_outputs();
    }

    fn stamp_outputs(&mut self) {
        for output in &mut self.outputs {
            output.tx_hash = self.hash.clone();
        }
    }

    /// Calculate the transaction hash
    pub fn compute_hash(&self) -> String {
        let signatures = self
            .inputs
            .iter()
            .map(|input| input.signature.as_str())
            .collect::<Vec<_>>()
            .join(",");

        sha256_hex(format!("{}{}{}", self.tx_type, signatures, self.timestamp).as_bytes())
    }

    pub fn is_fee(&self) -> bool {
        self.tx_type == TransactionType::Fee
    }

    /// Get total input amount
    pub fn total_input(&self) -> u64 {
        sum_amounts(self.inputs.iter().map(|i| i.amount))
    }

    /// Get total output amount
    pub fn total_output(&self) -> u64 {
        sum_amounts(self.outputs.iter().map(|o| o.amount))
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Check hash, outputs, inputs, balance and output back-references
    pub fn is_valid(&self) -> Result<(), TransactionError> {
        if self.hash != self.compute_hash() {
            return Err(TransactionError::InvalidHash);
        }

        if self.timestamp < 1 {
            return Err(TransactionError::InvalidTimestamp(self.timestamp));
        }

        if self.outputs.is_empty() {
            return Err(TransactionError::InvalidOutputs(
                "transaction has no outputs".to_string(),
            ));
        }

        let output_errors: Vec<String> = self
            .outputs
            .iter()
            .filter_map(|o| o.is_valid().err())
            .map(|e| e.to_string())
            .collect();
        if !output_errors.is_empty() {
            return Err(TransactionError::InvalidOutputs(output_errors.join(" ")));
        }

        if self.inputs.is_empty() && !self.is_fee() {
            return Err(TransactionError::MissingInputs);
        }

        if !self.inputs.is_empty() {
            let input_errors: Vec<String> = self
                .inputs
                .iter()
                .filter_map(|i| i.is_valid().err())
                .map(|e| e.to_string())
                .collect();
            if !input_errors.is_empty() {
                return Err(TransactionError::InvalidInput(input_errors.join(" ")));
            }

            let input = self.total_input();
            let output = self.total_output();
            if input < output {
                return Err(TransactionError::InsufficientInput { input, output });
            }
        }

        if self.outputs.iter().any(|o| o.tx_hash != self.hash) {
            return Err(TransactionError::OutputReferenceMismatch);
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
