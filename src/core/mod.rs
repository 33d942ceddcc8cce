//! Core ledger components
//!
//! This module contains the consensus-rule engine:
//! - Transactions (signed inputs, outputs, fee transactions)
//! - Blocks (proof of work and block-level rules)
//! - Blockchain (mempool, admission, difficulty, lookups)
//! - Validation (serialisable outcome of any check)

pub mod block;
pub mod blockchain;
pub mod transaction;
pub mod validation;

pub use block::{Block, BlockError, BlockInfo, MAX_DIFFICULTY};
pub use blockchain::{
    difficulty_for, BlockKey, Blockchain, BlockchainError, TransactionSearch, DIFFICULTY_FACTOR,
    FEE_PER_TX, GENESIS_REWARD, TX_PER_BLOCK,
};
pub use transaction::{
    current_timestamp, InputError, OutputError, Transaction, TransactionError, TransactionInput,
    TransactionOutput, TransactionType,
};
pub use validation::Validation;
