//! Mining module for block creation

pub mod miner;

pub use miner::{run_miner, Miner, MiningStats};
