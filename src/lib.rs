pub mod adapters;
pub mod auth;
pub mod chain;
pub mod claim;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod runner;
pub mod signing;

pub use adapters::{AccountStore, CaptchaSolver, PortalClient};
pub use auth::{SessionEstablisher, SessionTokens};
pub use claim::{ClaimExecutor, ClaimOutcome, RetryPolicy};
pub use config::AppConfig;
pub use error::{BotError, Result};
pub use runner::{BatchRunner, OutcomeLog};
pub use signing::Wallet;

/// Hard ceiling on wallet worker concurrency
pub const MAX_CONCURRENCY: usize = 50;

/// Minimum receipt wait when confirmation is requested
pub const MIN_RECEIPT_TIMEOUT_SECS: u64 = 5;
