//! Mining engine for the ledger
//!
//! The miner never touches ledger internals: it asks for `BlockInfo`,
//! builds a candidate with its own fee transaction, runs the search on a
//! blocking thread and hands the result back to `Blockchain::add_block`.

use crate::core::{Block, BlockError, BlockInfo, Blockchain, Transaction};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Mining statistics
#[derive(Debug, Clone)]
pub struct MiningStats {
    /// Number of hash attempts
    pub hash_attempts: u64,
    /// Time taken in milliseconds
    pub time_ms: u128,
    /// Hash rate (hashes per second)
    pub hash_rate: f64,
}

/// Miner for creating new blocks
#[derive(Debug, Clone)]
pub struct Miner {
    /// Miner's address for receiving fees
    pub address: String,
}

impl Miner {
    /// Create a new miner
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
        }
    }

    /// Build an unmined block from `info` with a fee transaction crediting
    /// this miner for every included transaction
    pub fn build_candidate(&self, info: &BlockInfo) -> Block {
        let mut block = Block::from_block_info(info);
        let reward = info.fee_per_tx * info.transactions.len() as u64;
        block
            .transactions
            .get_or_insert_with(Vec::new)
            .push(Transaction::fee(&self.address, reward));
        block.hash = block.compute_hash();
        block
    }

    /// Build and mine the next block. `Ok(None)` when cancelled.
    pub fn mine(
        &self,
        info: &BlockInfo,
        cancel: &CancellationToken,
    ) -> Result<Option<(Block, MiningStats)>, BlockError> {
        let start = Instant::now();
        let mut block = self.build_candidate(info);

        info!(
            "Mining block {} with difficulty {}...",
            block.index, info.difficulty
        );

        let Some(attempts) = block.mine_with_cancel(info.difficulty, &self.address, cancel)? else {
            debug!("Mining of block {} cancelled", block.index);
            return Ok(None);
        };

        let elapsed = start.elapsed().as_millis();
        let hash_rate = if elapsed > 0 {
            (attempts as f64) / (elapsed as f64 / 1000.0)
        } else {
            attempts as f64
        };

        info!(
            "Block {} mined in {}ms ({} attempts, {:.2} H/s)",
            block.index, elapsed, attempts, hash_rate
        );

        Ok(Some((
            block,
            MiningStats {
                hash_attempts: attempts,
                time_ms: elapsed,
                hash_rate,
            },
        )))
    }
}

/// Mine continuously against a shared ledger until `cancel` fires.
///
/// Work is polled every `idle` when the mempool is empty. The search runs
/// without holding the ledger lock; the write lock is only taken to submit.
pub async fn run_miner(
    ledger: Arc<RwLock<Blockchain>>,
    miner: Miner,
    cancel: CancellationToken,
    idle: Duration,
) {
    info!("Miner started for {}", miner.address);

    while !cancel.is_cancelled() {
        let next = ledger.read().await.get_next_block();
        let Some(info) = next else {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(idle) => {}
            }
            continue;
        };

        let worker = miner.clone();
        let token = cancel.clone();
        let outcome = tokio::task::spawn_blocking(move || worker.mine(&info, &token)).await;

        match outcome {
            Ok(Ok(Some((block, _stats)))) => {
                let index = block.index;
                match ledger.write().await.add_block(block) {
                    Ok(hash) => info!("Mined block {} accepted: {}", index, hash),
                    Err(e) => warn!("Mined block {} rejected: {}", index, e),
                }
            }
            Ok(Ok(None)) => break,
            Ok(Err(e)) => {
                error!("Mining failed: {}", e);
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(idle) => {}
                }
            }
            Err(e) => {
                error!("Mining task panicked: {}", e);
                break;
            }
        }
    }

    info!("Miner stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TransactionInput, TransactionOutput, TransactionType};
    use crate::crypto::KeyPair;

    fn pending_transfer() -> Transaction {
        let kp = KeyPair::generate();
        let mut input = TransactionInput::new(&kp.public_key_hex(), 3, "funding");
        input.sign(&kp.private_key_hex()).unwrap();
        Transaction::new(
            TransactionType::Regular,
            vec![input],
            vec![TransactionOutput::new("bob", 3)],
        )
    }

    #[test]
    fn test_build_candidate() {
        let mut blockchain = Blockchain::new("genesis-miner");
        blockchain.add_transaction(pending_transfer()).unwrap();
        blockchain.add_transaction(pending_transfer()).unwrap();
        let info = blockchain.get_next_block().unwrap();

        let miner = Miner::new("miner_address");
        let block = miner.build_candidate(&info);

        let fees: Vec<&Transaction> = block.transactions().iter().filter(|t| t.is_fee()).collect();
        assert_eq!(fees.len(), 1);
        assert_eq!(fees[0].outputs[0].to_address, "miner_address");
        assert_eq!(fees[0].outputs[0].amount, 2 * info.fee_per_tx);
        assert_eq!(block.tx_count(), 3);
    }

    #[test]
    fn test_miner() {
        let mut blockchain = Blockchain::new("genesis-miner");
        blockchain.add_transaction(pending_transfer()).unwrap();
        let info = blockchain.get_next_block().unwrap();

        let miner = Miner::new("miner_address");
        let (block, stats) = miner
            .mine(&info, &CancellationToken::new())
            .unwrap()
            .unwrap();

        assert_eq!(block.index, 1);
        assert!(stats.hash_attempts > 0);
        blockchain.add_block(block).unwrap();
        assert!(blockchain.mempool().is_empty());
        assert_eq!(blockchain.get_balance("miner_address"), info.fee_per_tx);
    }

    #[test]
    fn test_miner_cancelled() {
        let mut blockchain = Blockchain::new("genesis-miner");
        blockchain.add_transaction(pending_transfer()).unwrap();
        let info = blockchain.get_next_block().unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = Miner::new("miner_address").mine(&info, &cancel).unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_run_miner_drains_mempool() {
        let ledger = Arc::new(RwLock::new(Blockchain::new("genesis-miner")));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(run_miner(
            ledger.clone(),
            Miner::new("miner_address"),
            cancel.clone(),
            Duration::from_millis(10),
        ));

        ledger
            .write()
            .await
            .add_transaction(pending_transfer())
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(30);
        while ledger.read().await.blocks().len() < 2 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        cancel.cancel();
        handle.await.unwrap();

        let chain = ledger.read().await;
        assert_eq!(chain.blocks().len(), 2);
        assert!(chain.mempool().is_empty());
        assert!(chain.is_valid().is_ok());
    }
}
