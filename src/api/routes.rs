//! REST API routes configuration

use crate::api::handlers::{self, ApiState};
use axum::{
    http::{StatusCode, Uri},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};

/// Unknown routes get a JSON 404
async fn fallback_handler(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(handlers::ApiError {
            error: format!("No route for {}", uri.path()),
        }),
    )
}

/// Create the API router with all routes
pub fn create_router(state: ApiState) -> Router {
    // Configure CORS for browser access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/status", get(handlers::get_status))
        // Blocks
        .route("/blocks", post(handlers::add_block))
        .route("/blocks/next", get(handlers::get_next_block))
        .route("/blocks/{index_or_hash}", get(handlers::get_block))
        // Transactions
        .route(
            "/transactions",
            get(handlers::get_mempool).post(handlers::add_transaction),
        )
        .route("/transactions/{hash}", get(handlers::get_transaction))
        // Wallets
        .route("/wallets/{address}", get(handlers::get_wallet))
        .fallback(fallback_handler)
        .with_state(state)
        .layer(cors)
}
