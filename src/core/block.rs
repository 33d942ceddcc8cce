//! Block implementation for the ledger
//!
//! A block bundles transactions, links to its predecessor by hash and is
//! sealed by a proof-of-work search over its nonce.

use crate::core::transaction::{current_timestamp, Transaction};
use crate::crypto::{meets_difficulty, sha256_hex};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Highest difficulty a miner may be asked for. A hex SHA-256 digest has
/// 64 characters, so anything near that can never be satisfied.
pub const MAX_DIFFICULTY: u32 = 62;

// =============================================================================
// Block Errors
// =============================================================================

/// Block validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("No fee transaction")]
    NoFeeTransaction,
    #[error("Too many fee transactions: {0}")]
    MultipleFeeTransactions(usize),
    #[error("Invalid fee transaction: does not credit the miner")]
    FeeMismatch,
    #[error("Invalid transaction in block: {0}")]
    InvalidTransaction(String),
    #[error("Missing transaction list")]
    MissingTransactions,
    #[error("Invalid index: expected {expected}, got {got}")]
    IndexMismatch { expected: u64, got: u64 },
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(i64),
    #[error("Invalid previous hash")]
    PreviousHashMismatch,
    #[error("Block not mined")]
    NotMined,
    #[error("Invalid block hash")]
    InvalidHash,
    #[error("Difficulty {0} exceeds maximum {1}")]
    DifficultyTooHigh(u32, u32),
}

// =============================================================================
// Block Info
// =============================================================================

/// Everything a miner needs to build and mine the next block
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockInfo {
    pub index: u64,
    pub previous_hash: String,
    pub difficulty: u32,
    pub max_difficulty: u32,
    pub fee_per_tx: u64,
    pub transactions: Vec<Transaction>,
}

// =============================================================================
// Block
// =============================================================================

/// A block in the ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Block {
    /// Block index/height
    pub index: u64,
    /// Creation time in epoch milliseconds
    pub timestamp: i64,
    /// Hash of the previous block ("" for genesis)
    pub previous_hash: String,
    /// `None` when the list is absent altogether
    #[serde(default)]
    pub transactions: Option<Vec<Transaction>>,
    #[serde(default)]
    pub nonce: u64,
    /// Address credited by the fee transaction
    #[serde(default)]
    pub miner: String,
    pub hash: String,
}

impl Block {
    /// Create a new block (unmined)
    pub fn new(index: u64, previous_hash: String, transactions: Vec<Transaction>) -> Self {
        let mut block = Self {
            index,
            timestamp: current_timestamp(),
            previous_hash,
            transactions: Some(transactions),
            nonce: 0,
            miner: String::new(),
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// Create the genesis block, already mined, crediting `miner`
    pub fn genesis(miner: &str, reward: u64, difficulty: u32) -> Self {
        let mut block = Self::new(0, String::new(), vec![Transaction::fee(miner, reward)]);
        block.miner = miner.to_string();
        block.search(difficulty.min(MAX_DIFFICULTY), || false);
        block
    }

    /// Build an unmined skeleton from the ledger's next-block parameters
    pub fn from_block_info(info: &BlockInfo) -> Self {
        Self::new(
            info.index,
            info.previous_hash.clone(),
            info.transactions.clone(),
        )
    }

    /// Transactions in this block, empty when the list is absent
    pub fn transactions(&self) -> &[Transaction] {
        self.transactions.as_deref().unwrap_or_default()
    }

    /// Calculate the hash of the block
    pub fn compute_hash(&self) -> String {
        let tx_hashes: String = self
            .transactions()
            .iter()
            .map(|tx| tx.hash.as_str())
            .collect();

        sha256_hex(
            format!(
                "{}{}{}{}{}{}",
                self.index, tx_hashes, self.timestamp, self.previous_hash, self.nonce, self.miner
            )
            .as_bytes(),
        )
    }

    // =========================================================================
    // Mining
    // =========================================================================

    fn check_difficulty(difficulty: u32) -> Result<(), BlockError> {
        if difficulty > MAX_DIFFICULTY {
            return Err(BlockError::DifficultyTooHigh(difficulty, MAX_DIFFICULTY));
        }
        Ok(())
    }

    /// Increment the nonce until the hash meets `difficulty`.
    /// Returns the number of attempts, or `None` once `should_stop` fires.
    fn search(&mut self, difficulty: u32, mut should_stop: impl FnMut() -> bool) -> Option<u64> {
        let mut attempts = 0u64;

        loop {
            if should_stop() {
                return None;
            }

            self.nonce += 1;
            self.hash = self.compute_hash();
            attempts += 1;

            if meets_difficulty(&self.hash, difficulty) {
                return Some(attempts);
            }
        }
    }

    /// Mine the block for `miner` (find a valid nonce)
    pub fn mine(&mut self, difficulty: u32, miner: &str) -> Result<u64, BlockError> {
        Self::check_difficulty(difficulty)?;
        self.miner = miner.to_string();
        // never stops early, so the search always yields a count
        Ok(self.search(difficulty, || false).unwrap_or_default())
    }

    /// Mine the block, giving up when `cancel` fires. `Ok(None)` means the
    /// search was abandoned and the block is left unsealed.
    pub fn mine_with_cancel(
        &mut self,
        difficulty: u32,
        miner: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<u64>, BlockError> {
        Self::check_difficulty(difficulty)?;
        self.miner = miner.to_string();
        Ok(self.search(difficulty, || cancel.is_cancelled()))
    }

    // =========================================================================
    // Validation
    // =========================================================================

    fn check_transactions(&self, transactions: &[Transaction]) -> Result<(), BlockError> {
        let fees: Vec<&Transaction> = transactions.iter().filter(|tx| tx.is_fee()).collect();
        let fee = match fees.as_slice() {
            [] => return Err(BlockError::NoFeeTransaction),
            [fee] => fee,
            _ => return Err(BlockError::MultipleFeeTransactions(fees.len())),
        };

        // Any output crediting the miner is enough
        if !fee.outputs.iter().any(|o| o.to_address == self.miner) {
            return Err(BlockError::FeeMismatch);
        }

        let errors: Vec<String> = transactions
            .iter()
            .filter_map(|tx| tx.is_valid().err())
            .map(|e| e.to_string())
            .collect();
        if !errors.is_empty() {
            return Err(BlockError::InvalidTransaction(errors.join("; ")));
        }

        Ok(())
    }

    /// Validate the block against its predecessor and the difficulty it was
    /// mined under. Checks run in order and the first failure wins.
    pub fn is_valid(
        &self,
        previous_hash: &str,
        previous_index: u64,
        difficulty: u32,
    ) -> Result<(), BlockError> {
        let Some(transactions) = &self.transactions else {
            return Err(BlockError::MissingTransactions);
        };
        if !transactions.is_empty() {
            self.check_transactions(transactions)?;
        }

        let expected = previous_index.saturating_add(1);
        if self.index != expected {
            return Err(BlockError::IndexMismatch {
                expected,
                got: self.index,
            });
        }

        if self.timestamp < 1 {
            return Err(BlockError::InvalidTimestamp(self.timestamp));
        }

        if self.previous_hash != previous_hash {
            return Err(BlockError::PreviousHashMismatch);
        }

        if self.nonce < 1 || self.miner.is_empty() {
            return Err(BlockError::NotMined);
        }

        if self.hash != self.compute_hash() || !meets_difficulty(&self.hash, difficulty) {
            return Err(BlockError::InvalidHash);
        }

        Ok(())
    }

    /// Get number of transactions in this block
    pub fn tx_count(&self) -> usize {
        self.transactions().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transaction::{TransactionInput, TransactionOutput, TransactionType};
    use crate::crypto::KeyPair;

    const DIFFICULTY: u32 = 2;
    const MINER: &str = "miner";
    const PREVIOUS: &str = "previous-hash";

    fn regular_tx() -> Transaction {
        let kp = KeyPair::generate();
        let mut input = TransactionInput::new(&kp.public_key_hex(), 10, "funding-tx");
        input.sign(&kp.private_key_hex()).unwrap();
        Transaction::new(
            TransactionType::Regular,
            vec![input],
            vec![TransactionOutput::new("recipient", 10)],
        )
    }

    fn mined_block() -> Block {
        let mut block = Block::new(
            1,
            PREVIOUS.to_string(),
            vec![regular_tx(), Transaction::fee(MINER, 1)],
        );
        block.mine(DIFFICULTY, MINER).unwrap();
        block
    }

    #[test]
    fn test_block_mining() {
        let block = mined_block();
        assert!(block.hash.starts_with("00"));
        assert_eq!(block.hash, block.compute_hash());
        assert!(block.nonce >= 1);
        assert_eq!(block.miner, MINER);
        assert!(block.is_valid(PREVIOUS, 0, DIFFICULTY).is_ok());
    }

    #[test]
    fn test_genesis_block() {
        let genesis = Block::genesis(MINER, 10, 1);
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.previous_hash, "");
        assert_eq!(genesis.tx_count(), 1);
        assert!(genesis.transactions()[0].is_fee());
        assert!(genesis.hash.starts_with('0'));
    }

    #[test]
    fn test_hash_changes_with_fields() {
        let mut block = mined_block();
        let hash = block.compute_hash();
        assert_eq!(hash, block.compute_hash());

        block.nonce += 1;
        assert_ne!(hash, block.compute_hash());
    }

    #[test]
    fn test_tampered_hash() {
        let mut block = mined_block();
        block.hash = "abc".to_string();
        assert_eq!(
            block.is_valid(PREVIOUS, 0, DIFFICULTY),
            Err(BlockError::InvalidHash)
        );

        block.hash.clear();
        assert_eq!(
            block.is_valid(PREVIOUS, 0, DIFFICULTY),
            Err(BlockError::InvalidHash)
        );
    }

    #[test]
    fn test_insufficient_difficulty() {
        let mut block = Block::new(1, PREVIOUS.to_string(), vec![Transaction::fee(MINER, 1)]);
        block.mine(1, MINER).unwrap();
        // Keep mining at difficulty 1 until the hash is not accidentally harder
        while block.hash.starts_with("00") {
            block.mine(1, MINER).unwrap();
        }
        assert_eq!(block.is_valid(PREVIOUS, 0, 2), Err(BlockError::InvalidHash));
    }

    #[test]
    fn test_no_fee_transaction() {
        let mut block = Block::new(1, PREVIOUS.to_string(), vec![regular_tx()]);
        block.mine(DIFFICULTY, MINER).unwrap();
        assert_eq!(
            block.is_valid(PREVIOUS, 0, DIFFICULTY),
            Err(BlockError::NoFeeTransaction)
        );
    }

    #[test]
    fn test_multiple_fee_transactions() {
        let mut block = Block::new(
            1,
            PREVIOUS.to_string(),
            vec![Transaction::fee(MINER, 1), Transaction::fee(MINER, 1)],
        );
        block.mine(DIFFICULTY, MINER).unwrap();
        assert_eq!(
            block.is_valid(PREVIOUS, 0, DIFFICULTY),
            Err(BlockError::MultipleFeeTransactions(2))
        );
    }

    #[test]
    fn test_fee_to_other_address() {
        let mut block = Block::new(
            1,
            PREVIOUS.to_string(),
            vec![Transaction::fee("someone-else", 1)],
        );
        block.mine(DIFFICULTY, MINER).unwrap();
        assert_eq!(
            block.is_valid(PREVIOUS, 0, DIFFICULTY),
            Err(BlockError::FeeMismatch)
        );
    }

    #[test]
    fn test_fee_with_extra_output_is_accepted() {
        // Only one fee output has to credit the miner; the other may go anywhere
        let fee = Transaction::new(
            TransactionType::Fee,
            vec![],
            vec![
                TransactionOutput::new(MINER, 1),
                TransactionOutput::new("someone-else", 1),
            ],
        );
        let mut block = Block::new(1, PREVIOUS.to_string(), vec![fee]);
        block.mine(DIFFICULTY, MINER).unwrap();
        assert!(block.is_valid(PREVIOUS, 0, DIFFICULTY).is_ok());
    }

    #[test]
    fn test_invalid_transaction() {
        let mut block = mined_block();
        if let Some(txs) = block.transactions.as_mut() {
            txs[0].outputs[0].amount = 0;
        }
        assert!(matches!(
            block.is_valid(PREVIOUS, 0, DIFFICULTY),
            Err(BlockError::InvalidTransaction(_))
        ));
    }

    #[test]
    fn test_missing_transactions() {
        let mut block = mined_block();
        block.transactions = None;
        assert_eq!(
            block.is_valid(PREVIOUS, 0, DIFFICULTY),
            Err(BlockError::MissingTransactions)
        );
    }

    #[test]
    fn test_empty_transactions_allowed() {
        let mut block = Block::new(1, PREVIOUS.to_string(), vec![]);
        block.mine(DIFFICULTY, MINER).unwrap();
        assert!(block.is_valid(PREVIOUS, 0, DIFFICULTY).is_ok());
    }

    #[test]
    fn test_index_mismatch() {
        let block = mined_block();
        assert_eq!(
            block.is_valid(PREVIOUS, 5, DIFFICULTY),
            Err(BlockError::IndexMismatch {
                expected: 6,
                got: 1
            })
        );
    }

    #[test]
    fn test_invalid_timestamp() {
        let mut block = mined_block();
        block.timestamp = -1;
        block.hash = block.compute_hash();
        assert_eq!(
            block.is_valid(PREVIOUS, 0, DIFFICULTY),
            Err(BlockError::InvalidTimestamp(-1))
        );
    }

    #[test]
    fn test_previous_hash_mismatch() {
        let block = mined_block();
        assert_eq!(
            block.is_valid("other", 0, DIFFICULTY),
            Err(BlockError::PreviousHashMismatch)
        );
    }

    #[test]
    fn test_not_mined() {
        let block = Block::new(1, PREVIOUS.to_string(), vec![Transaction::fee(MINER, 1)]);
        // The fee check runs first and needs the miner field
        assert_eq!(
            block.is_valid(PREVIOUS, 0, DIFFICULTY),
            Err(BlockError::FeeMismatch)
        );

        let empty = Block::new(1, PREVIOUS.to_string(), vec![]);
        assert_eq!(
            empty.is_valid(PREVIOUS, 0, DIFFICULTY),
            Err(BlockError::NotMined)
        );
    }

    #[test]
    fn test_difficulty_too_high() {
        let mut block = Block::new(1, PREVIOUS.to_string(), vec![]);
        assert_eq!(
            block.mine(MAX_DIFFICULTY + 1, MINER),
            Err(BlockError::DifficultyTooHigh(MAX_DIFFICULTY + 1, MAX_DIFFICULTY))
        );
    }

    #[test]
    fn test_mine_cancelled() {
        let mut block = Block::new(1, PREVIOUS.to_string(), vec![]);
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(block.mine_with_cancel(DIFFICULTY, MINER, &cancel), Ok(None));
        assert_eq!(block.nonce, 0);
    }

    #[test]
    fn test_mine_with_live_token() {
        let mut block = Block::new(1, PREVIOUS.to_string(), vec![Transaction::fee(MINER, 1)]);
        let cancel = CancellationToken::new();
        let attempts = block
            .mine_with_cancel(DIFFICULTY, MINER, &cancel)
            .unwrap()
            .unwrap();
        assert!(attempts >= 1);
        assert!(block.is_valid(PREVIOUS, 0, DIFFICULTY).is_ok());
    }

    #[test]
    fn test_from_block_info() {
        let info = BlockInfo {
            index: 1,
            previous_hash: PREVIOUS.to_string(),
            difficulty: DIFFICULTY,
            max_difficulty: MAX_DIFFICULTY,
            fee_per_tx: 1,
            transactions: vec![regular_tx()],
        };

        let mut block = Block::from_block_info(&info);
        assert_eq!(block.index, 1);
        assert_eq!(block.previous_hash, PREVIOUS);
        assert_eq!(block.nonce, 0);

        if let Some(txs) = block.transactions.as_mut() {
            txs.push(Transaction::fee(MINER, info.fee_per_tx));
        }
        block.mine(info.difficulty, MINER).unwrap();
        assert!(block.is_valid(PREVIOUS, 0, DIFFICULTY).is_ok());
    }
}
