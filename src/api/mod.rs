//! REST API module
//!
//! HTTP front end over a shared `Blockchain`.
//!
//! # Endpoints
//!
//! ## Ledger
//! - `GET /status` - Mempool size, block count, chain validity, last block
//!
//! ## Blocks
//! - `GET /blocks/next` - Next block parameters, `null` when nothing is pending
//! - `GET /blocks/{index_or_hash}` - Get block by height or hash
//! - `POST /blocks` - Submit a mined block
//!
//! ## Transactions
//! - `GET /transactions` - Next pending transactions and mempool total
//! - `GET /transactions/{hash}` - Locate a transaction
//! - `POST /transactions` - Submit a signed transaction
//!
//! ## Wallets
//! - `GET /wallets/{address}` - Balance, fee per transaction and UTXOs

pub mod handlers;
pub mod routes;

pub use handlers::ApiState;
pub use routes::create_router;
