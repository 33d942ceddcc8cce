//! Mini-Ledger CLI Application
//!
//! Serves the ledger over HTTP and handles offline wallet chores.

use clap::{Parser, Subcommand};
use mini_ledger::cli::{self, ServeConfig};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "ledger")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "An educational proof-of-work ledger in Rust", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, env = "BLOCKCHAIN_PORT", default_value = "3000")]
        port: u16,

        /// Wallet address credited by genesis and mining
        #[arg(short, long, env = "BLOCKCHAIN_WALLET")]
        wallet: Option<String>,

        /// Mine pending transactions in the background
        #[arg(long)]
        mine: bool,

        /// Poll interval for the miner when the mempool is empty
        #[arg(long, default_value = "1000")]
        idle_ms: u64,
    },

    /// Wallet operations
    Wallet {
        #[command(subcommand)]
        action: WalletCommands,
    },
}

#[derive(Subcommand)]
enum WalletCommands {
    /// Create a new wallet
    New,

    /// Recover a wallet from its private key
    Recover {
        /// Private key (hex)
        private_key: String,
    },

    /// Print a signed transfer as JSON
    Transfer {
        /// Sender's private key (hex)
        #[arg(short, long)]
        key: String,

        /// Recipient's address
        #[arg(short, long)]
        to: String,

        /// Amount to send
        #[arg(short, long)]
        amount: u64,

        /// Hash of the transaction funding this transfer
        #[arg(short, long)]
        previous_tx: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            wallet,
            mine,
            idle_ms,
        } => {
            let config = ServeConfig {
                port,
                wallet,
                mine,
                idle: Duration::from_millis(idle_ms),
            };

            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(cli::cmd_serve(config))?;
        }

        Commands::Wallet { action } => match action {
            WalletCommands::New => {
                cli::cmd_wallet_new()?;
            }
            WalletCommands::Recover { private_key } => {
                cli::cmd_wallet_recover(&private_key)?;
            }
            WalletCommands::Transfer {
                key,
                to,
                amount,
                previous_tx,
            } => {
                cli::cmd_wallet_transfer(&key, &to, amount, &previous_tx)?;
            }
        },
    }

    Ok(())
}
