//! Ledger implementation
//!
//! The `Blockchain` owns the ordered blocks and the mempool of pending
//! transactions. It is the only place where blocks and transactions are
//! admitted, and it never trusts a miner's difficulty claim: every block is
//! re-validated against parameters the ledger computes itself.

use crate::core::block::{Block, BlockError, BlockInfo, MAX_DIFFICULTY};
use crate::core::transaction::{Transaction, TransactionError, TransactionOutput};
use log::{debug, info, warn};
use serde::{Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Blocks per difficulty step
pub const DIFFICULTY_FACTOR: u32 = 5;

/// Maximum pending transactions offered per block
pub const TX_PER_BLOCK: usize = 2;

/// Fixed fee paid to the miner per included transaction
pub const FEE_PER_TX: u64 = 1;

/// Amount credited to the ledger's miner by the genesis block
pub const GENESIS_REWARD: u64 = 10;

/// Ledger errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BlockchainError {
    #[error("This wallet has a pending transaction: {0}")]
    PendingConflict(String),
    #[error("Invalid tx: {0}")]
    InvalidTransaction(#[from] TransactionError),
    #[error("Duplicated tx in blockchain: {0}")]
    DuplicateInLedger(String),
    #[error("Duplicated tx in mempool: {0}")]
    DuplicateInMempool(String),
    #[error("There is no next block info")]
    NoPendingWork,
    #[error("Invalid block: {0}")]
    InvalidBlock(#[from] BlockError),
    #[error("Invalid tx in block: {included} included, only {pending} pending in the mempool")]
    MempoolMismatch { included: usize, pending: usize },
    #[error("Fee transactions cannot be submitted: {0}")]
    FeeNotAllowed(String),
    #[error("Invalid block {index}: {source}")]
    InvalidChain { index: u64, source: BlockError },
}

/// Lookup key for blocks: a height or a hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKey {
    Index(u64),
    Hash(String),
}

impl BlockKey {
    /// All-digit strings are heights, anything else is a hash
    pub fn parse(s: &str) -> Self {
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = s.parse() {
                return BlockKey::Index(index);
            }
        }
        BlockKey::Hash(s.to_string())
    }
}

impl FromStr for BlockKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockKey::Index(index) => write!(f, "{}", index),
            BlockKey::Hash(hash) => write!(f, "{}", hash),
        }
    }
}

fn index_or_minus_one<S: Serializer>(
    index: &Option<usize>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match index {
        Some(i) => serializer.serialize_i64(*i as i64),
        None => serializer.serialize_i64(-1),
    }
}

/// Where a transaction was found. At most one index is set; both serialise
/// as `-1` when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransactionSearch {
    #[serde(serialize_with = "index_or_minus_one")]
    pub mempool_index: Option<usize>,
    #[serde(serialize_with = "index_or_minus_one")]
    pub block_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<Transaction>,
}

/// Difficulty in force when the chain holds `block_count` blocks
pub fn difficulty_for(block_count: usize) -> u32 {
    let steps = (block_count as u64).div_ceil(DIFFICULTY_FACTOR as u64);
    (steps + 1).min(MAX_DIFFICULTY as u64) as u32
}

/// The ledger: blocks plus pending transactions
#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
    mempool: Vec<Transaction>,
}

impl Blockchain {
    /// Create a new ledger whose genesis block credits `miner`
    pub fn new(miner: &str) -> Self {
        let genesis = Block::genesis(miner, GENESIS_REWARD, difficulty_for(0));
        info!("Genesis block {} created for {}", genesis.hash, miner);

        Self {
            blocks: vec![genesis],
            mempool: Vec::new(),
        }
    }

    /// Committed blocks, genesis first
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Pending transactions, oldest first
    pub fn mempool(&self) -> &[Transaction] {
        &self.mempool
    }

    /// Get the latest block
    pub fn latest_block(&self) -> &Block {
        // genesis is pushed on construction and blocks are never removed
        &self.blocks[self.blocks.len() - 1]
    }

    /// Current mining difficulty
    pub fn get_difficulty(&self) -> u32 {
        difficulty_for(self.blocks.len())
    }

    pub fn fee_per_tx(&self) -> u64 {
        FEE_PER_TX
    }

    fn is_committed(&self, hash: &str) -> bool {
        self.blocks
            .iter()
            .any(|b| b.transactions().iter().any(|tx| tx.hash == hash))
    }

    /// Admit a transaction to the mempool, returning its hash
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<String, BlockchainError> {
        if self.mempool.iter().any(|p| p.hash == tx.hash) {
            return Err(BlockchainError::DuplicateInMempool(tx.hash));
        }

        if !tx.inputs.is_empty() {
            let pending: HashSet<&str> = self
                .mempool
                .iter()
                .flat_map(|p| p.inputs.iter())
                .map(|input| input.from_address.as_str())
                .collect();

            if let Some(input) = tx
                .inputs
                .iter()
                .find(|input| pending.contains(input.from_address.as_str()))
            {
                return Err(BlockchainError::PendingConflict(input.from_address.clone()));
            }
        }

        tx.is_valid()?;

        if self.is_committed(&tx.hash) {
            return Err(BlockchainError::DuplicateInLedger(tx.hash));
        }

        if tx.is_fee() {
            return Err(BlockchainError::FeeNotAllowed(tx.hash));
        }

        debug!("Transaction {} added to mempool", tx.hash);
        let hash = tx.hash.clone();
        self.mempool.push(tx);
        Ok(hash)
    }

    /// Validate and append a mined block, draining its transactions from the
    /// mempool. Returns the block hash.
    pub fn add_block(&mut self, block: Block) -> Result<String, BlockchainError> {
        let next = self.get_next_block().ok_or(BlockchainError::NoPendingWork)?;

        block.is_valid(
            &next.previous_hash,
            next.index.saturating_sub(1),
            next.difficulty,
        )?;

        if let Some(tx) = block
            .transactions()
            .iter()
            .find(|tx| self.is_committed(&tx.hash))
        {
            warn!(
                "Rejected block {}: tx {} already committed",
                block.index, tx.hash
            );
            return Err(BlockchainError::DuplicateInLedger(tx.hash.clone()));
        }

        let included: Vec<&str> = block
            .transactions()
            .iter()
            .filter(|tx| !tx.is_fee())
            .map(|tx| tx.hash.as_str())
            .collect();

        let before = self.mempool.len();
        let removed = self
            .mempool
            .iter()
            .filter(|p| included.contains(&p.hash.as_str()))
            .count();
        if removed != included.len() {
            warn!(
                "Rejected block {}: {} transactions included, {} pending",
                block.index,
                included.len(),
                removed
            );
            return Err(BlockchainError::MempoolMismatch {
                included: included.len(),
                pending: removed,
            });
        }

        self.mempool.retain(|p| !included.contains(&p.hash.as_str()));
        debug!("Mempool drained from {} to {}", before, self.mempool.len());

        info!(
            "Block {} accepted ({} transactions, difficulty {})",
            block.index,
            block.tx_count(),
            next.difficulty
        );

        let hash = block.hash.clone();
        self.blocks.push(block);
        Ok(hash)
    }

    /// Find a transaction, mempool first
    pub fn get_transaction(&self, hash: &str) -> TransactionSearch {
        if let Some(i) = self.mempool.iter().position(|tx| tx.hash == hash) {
            return TransactionSearch {
                mempool_index: Some(i),
                block_index: None,
                transaction: Some(self.mempool[i].clone()),
            };
        }

        for (i, block) in self.blocks.iter().enumerate() {
            if let Some(tx) = block.transactions().iter().find(|tx| tx.hash == hash) {
                return TransactionSearch {
                    mempool_index: None,
                    block_index: Some(i),
                    transaction: Some(tx.clone()),
                };
            }
        }

        TransactionSearch::default()
    }

    /// Get a block by height or hash
    pub fn get_block(&self, key: &BlockKey) -> Option<&Block> {
        match key {
            BlockKey::Index(index) => usize::try_from(*index)
                .ok()
                .and_then(|i| self.blocks.get(i)),
            BlockKey::Hash(hash) => self.blocks.iter().find(|b| &b.hash == hash),
        }
    }

    /// Parameters for the next block, or `None` when nothing is pending
    pub fn get_next_block(&self) -> Option<BlockInfo> {
        if self.mempool.is_empty() {
            return None;
        }

        Some(BlockInfo {
            index: self.blocks.len() as u64,
            previous_hash: self.latest_block().hash.clone(),
            difficulty: self.get_difficulty(),
            max_difficulty: MAX_DIFFICULTY,
            fee_per_tx: self.fee_per_tx(),
            transactions: self.mempool.iter().take(TX_PER_BLOCK).cloned().collect(),
        })
    }

    /// Validate the entire chain, tip to genesis. Each block is checked
    /// with the difficulty that applied when it was appended.
    pub fn is_valid(&self) -> Result<(), BlockchainError> {
        for i in (1..self.blocks.len()).rev() {
            let current = &self.blocks[i];
            let previous = &self.blocks[i - 1];

            current
                .is_valid(&previous.hash, previous.index, difficulty_for(i))
                .map_err(|source| BlockchainError::InvalidChain {
                    index: current.index,
                    source,
                })?;
        }

        Ok(())
    }

    // =========================================================================
    // Wallet views
    // =========================================================================

    /// Outputs credited to `address` in committed blocks whose transaction
    /// has not been referenced by a committed input from `address`
    pub fn get_utxos(&self, address: &str) -> Vec<TransactionOutput> {
        let spent: HashSet<&str> = self
            .blocks
            .iter()
            .flat_map(|b| b.transactions().iter())
            .flat_map(|tx| tx.inputs.iter())
            .filter(|input| input.from_address == address)
            .map(|input| input.previous_tx.as_str())
            .collect();

        self.blocks
            .iter()
            .flat_map(|b| b.transactions().iter())
            .flat_map(|tx| tx.outputs.iter())
            .filter(|o| o.to_address == address && !spent.contains(o.tx_hash.as_str()))
            .cloned()
            .collect()
    }

    /// Get balance for an address
    pub fn get_balance(&self, address: &str) -> u64 {
        self.get_utxos(address)
            .iter()
            .map(|o| o.amount)
            .fold(0, u64::saturating_add)
    }
}
