//! Mini-Ledger: An educational proof-of-work ledger in Rust
//!
//! This crate provides a single-node ledger featuring:
//! - Proof of Work with difficulty stepping every few blocks
//! - ECDSA digital signatures (secp256k1) over transaction inputs
//! - Previous-transaction references with a per-transaction miner fee
//! - An in-memory mempool drained by mined blocks
//! - An HTTP front end and a background miner sharing one ledger
//!
//! # Example
//!
//! ```rust
//! use mini_ledger::core::Blockchain;
//! use mini_ledger::mining::Miner;
//! use mini_ledger::wallet::Wallet;
//! use tokio_util::sync::CancellationToken;
//!
//! // Create a ledger whose genesis reward goes to this wallet
//! let wallet = Wallet::new();
//! let mut blockchain = Blockchain::new(&wallet.public_key());
//! let funding = blockchain.blocks()[0].transactions()[0].hash.clone();
//!
//! // Queue a transfer
//! let tx = wallet.transfer("bob", 5, &funding).unwrap();
//! blockchain.add_transaction(tx).unwrap();
//!
//! // Mine it
//! let info = blockchain.get_next_block().unwrap();
//! let miner = Miner::new("miner");
//! let (block, stats) = miner.mine(&info, &CancellationToken::new()).unwrap().unwrap();
//! println!("Mined block {} in {}ms", block.index, stats.time_ms);
//! blockchain.add_block(block).unwrap();
//!
//! assert_eq!(blockchain.get_balance("bob"), 5);
//! ```

pub mod api;
pub mod cli;
pub mod core;
pub mod crypto;
pub mod mining;
pub mod wallet;

// Re-export commonly used types
pub use api::{create_router, ApiState};
pub use core::{Block, BlockInfo, Blockchain, Transaction, Validation};
pub use crypto::KeyPair;
pub use mining::Miner;
pub use wallet::Wallet;
