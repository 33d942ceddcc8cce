//! REST API handlers for ledger operations
//!
//! Handlers are thin: they parse, take the ledger lock and map the core's
//! typed results onto HTTP statuses. Rule violations are 400 with a
//! `Validation` body; missing or malformed payloads are 422.

use crate::core::{
    Block, BlockInfo, BlockKey, Blockchain, Transaction, TransactionOutput, TransactionSearch,
    Validation, TX_PER_BLOCK,
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub blockchain: Arc<RwLock<Blockchain>>,
}

impl ApiState {
    pub fn new(blockchain: Blockchain) -> Self {
        Self {
            blockchain: Arc::new(RwLock::new(blockchain)),
        }
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct StatusResponse {
    pub mempool: usize,
    pub blocks: usize,
    pub is_valid: Validation,
    pub last_block: Block,
}

#[derive(Serialize)]
pub struct MempoolResponse {
    pub next: Vec<Transaction>,
    pub total: usize,
}

#[derive(Serialize)]
pub struct WalletResponse {
    pub balance: u64,
    pub fee: u64,
    pub utxo: Vec<TransactionOutput>,
}

#[derive(Serialize)]
pub struct ApiError {
    pub error: String,
}

/// Failure of a submission endpoint
#[derive(Debug)]
pub enum ApiFailure {
    /// Payload missing, malformed or lacking a hash
    Unprocessable(String),
    /// Well-formed payload that the ledger refused
    Rejected(Validation),
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        match self {
            ApiFailure::Unprocessable(error) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ApiError { error }),
            )
                .into_response(),
            ApiFailure::Rejected(validation) => {
                (StatusCode::BAD_REQUEST, Json(validation)).into_response()
            }
        }
    }
}

/// Decode a submitted entity, insisting on a `hash` field
fn parse_payload<T: DeserializeOwned>(
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<T, ApiFailure> {
    let Json(value) = payload.map_err(|e| ApiFailure::Unprocessable(e.body_text()))?;

    if value.get("hash").is_none() {
        return Err(ApiFailure::Unprocessable("hash is required".to_string()));
    }

    serde_json::from_value(value).map_err(|e| ApiFailure::Unprocessable(e.to_string()))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /status - Ledger overview
pub async fn get_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let chain = state.blockchain.read().await;

    Json(StatusResponse {
        mempool: chain.mempool().len(),
        blocks: chain.blocks().len(),
        is_valid: Validation::from_result(&chain.is_valid()),
        last_block: chain.latest_block().clone(),
    })
}

/// GET /blocks/next - Parameters for the next block, `null` when idle
pub async fn get_next_block(State(state): State<ApiState>) -> Json<Option<BlockInfo>> {
    let chain = state.blockchain.read().await;
    Json(chain.get_next_block())
}

/// GET /blocks/{index_or_hash} - Get block by height or hash
pub async fn get_block(
    State(state): State<ApiState>,
    Path(key): Path<String>,
) -> Result<Json<Block>, (StatusCode, Json<ApiError>)> {
    let key = BlockKey::parse(&key);
    let chain = state.blockchain.read().await;

    match chain.get_block(&key) {
        Some(block) => Ok(Json(block.clone())),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(ApiError {
                error: format!("Block {} not found", key),
            }),
        )),
    }
}

/// POST /blocks - Submit a mined block
pub async fn add_block(
    State(state): State<ApiState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Block>), ApiFailure> {
    let block: Block = parse_payload(payload)?;
    let mut chain = state.blockchain.write().await;

    match chain.add_block(block.clone()) {
        Ok(hash) => {
            info!("Block {} submitted over HTTP: {}", block.index, hash);
            Ok((StatusCode::CREATED, Json(block)))
        }
        Err(e) => {
            debug!("Block {} refused: {}", block.index, e);
            Err(ApiFailure::Rejected(Validation::fail(e)))
        }
    }
}

/// GET /transactions - Next pending transactions and mempool size
pub async fn get_mempool(State(state): State<ApiState>) -> Json<MempoolResponse> {
    let chain = state.blockchain.read().await;

    Json(MempoolResponse {
        next: chain.mempool().iter().take(TX_PER_BLOCK).cloned().collect(),
        total: chain.mempool().len(),
    })
}

/// GET /transactions/{hash} - Locate a transaction
pub async fn get_transaction(
    State(state): State<ApiState>,
    Path(hash): Path<String>,
) -> Json<TransactionSearch> {
    let chain = state.blockchain.read().await;
    Json(chain.get_transaction(&hash))
}

/// POST /transactions - Submit a signed transaction
pub async fn add_transaction(
    State(state): State<ApiState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<Transaction>), ApiFailure> {
    let tx: Transaction = parse_payload(payload)?;
    let mut chain = state.blockchain.write().await;

    match chain.add_transaction(tx.clone()) {
        Ok(hash) => {
            info!("Transaction {} queued", hash);
            Ok((StatusCode::CREATED, Json(tx)))
        }
        Err(e) => {
            debug!("Transaction {} refused: {}", tx.hash, e);
            Err(ApiFailure::Rejected(Validation::fail(e)))
        }
    }
}

/// GET /wallets/{address} - Balance and spendable outputs
pub async fn get_wallet(
    State(state): State<ApiState>,
    Path(address): Path<String>,
) -> Json<WalletResponse> {
    let chain = state.blockchain.read().await;

    Json(WalletResponse {
        balance: chain.get_balance(&address),
        fee: chain.fee_per_tx(),
        utxo: chain.get_utxos(&address),
    })
}
