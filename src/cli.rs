use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "humanity-bot",
    about = "Daily reward claim bot for the Humanity Protocol testnet",
    version
)]
pub struct Cli {
    /// Configuration directory
    #[arg(long, default_value = "config")]
    pub config_dir: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the portal claim flow across all wallets
    Run {
        /// Parallel wallet workers (capped at 50)
        #[arg(short, long)]
        concurrency: Option<usize>,
        /// Private keys file override
        #[arg(long)]
        keys_file: Option<String>,
    },
    /// Claim directly against the Rewards contract on a fixed cycle
    Onchain {
        /// Parallel wallet workers (capped at 50)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Wait for transaction receipts
        #[arg(long)]
        wait_receipt: Option<bool>,
        /// Receipt wait timeout in seconds (minimum 5)
        #[arg(long)]
        receipt_timeout: Option<u64>,
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
        /// Private keys file override
        #[arg(long)]
        keys_file: Option<String>,
    },
    /// Import private keys into the account store
    Import {
        /// Keys file (defaults to the configured one)
        #[arg(long)]
        file: Option<String>,
    },
    /// Show stored account state
    Status {
        /// Single address to inspect
        address: Option<String>,
    },
}
