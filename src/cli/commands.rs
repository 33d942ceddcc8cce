//! CLI commands for the ledger
//!
//! Implements the command handlers behind the `ledger` binary.

use crate::api::{create_router, ApiState};
use crate::core::Blockchain;
use crate::mining::{run_miner, Miner};
use crate::wallet::Wallet;
use log::{error, info, warn};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Settings for `ledger serve`
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub port: u16,
    /// Address credited by genesis and by the built-in miner
    pub wallet: Option<String>,
    pub mine: bool,
    pub idle: Duration,
}

/// Run the HTTP server, optionally with a miner on the same ledger
pub async fn cmd_serve(config: ServeConfig) -> CliResult<()> {
    let address = match config.wallet {
        Some(address) => address,
        None => {
            let wallet = Wallet::new();
            warn!("No wallet configured, generated {}", wallet.public_key());
            warn!("Private key (keep it): {}", wallet.private_key());
            wallet.public_key()
        }
    };

    let blockchain = Blockchain::new(&address);
    info!(
        "Genesis block {} credited to {}",
        blockchain.latest_block().hash,
        address
    );

    let state = ApiState::new(blockchain);
    let cancel = CancellationToken::new();

    let miner_task = if config.mine {
        Some(tokio::spawn(run_miner(
            state.blockchain.clone(),
            Miner::new(&address),
            cancel.clone(),
            config.idle,
        )))
    } else {
        None
    };

    let app = create_router(state);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Ledger server listening on http://localhost:{}", config.port);

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Shutting down...");
        shutdown.cancel();
    });

    let serve_token = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { serve_token.cancelled().await })
        .await?;

    if let Some(task) = miner_task {
        cancel.cancel();
        task.await?;
    }

    Ok(())
}

/// Generate a wallet and print its keys as JSON
pub fn cmd_wallet_new() -> CliResult<()> {
    let wallet = Wallet::new();
    println!("{}", serde_json::to_string_pretty(&wallet.info())?);
    Ok(())
}

/// Recover a wallet from its private key and print its keys as JSON
pub fn cmd_wallet_recover(private_key: &str) -> CliResult<()> {
    let wallet = Wallet::from_private_key(private_key)?;
    println!("{}", serde_json::to_string_pretty(&wallet.info())?);
    Ok(())
}

/// Build a signed transfer and print it ready for `POST /transactions`
pub fn cmd_wallet_transfer(
    private_key: &str,
    to: &str,
    amount: u64,
    previous_tx: &str,
) -> CliResult<()> {
    let wallet = Wallet::from_private_key(private_key)?;
    let tx = wallet.transfer(to, amount, previous_tx)?;
    println!("{}", serde_json::to_string_pretty(&tx)?);
    Ok(())
}
