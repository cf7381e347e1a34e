use clap::Parser;
use humanity_bot::adapters::{AccountStore, CaptchaSolver};
use humanity_bot::auth::jwt::is_fresh;
use humanity_bot::chain::OnchainClaimer;
use humanity_bot::cli::{Cli, Commands};
use humanity_bot::config::AppConfig;
use humanity_bot::error::Result;
use humanity_bot::runner::{load_keys, BatchRunner, OutcomeLog};
use humanity_bot::signing::Wallet;
use humanity_bot::{MAX_CONCURRENCY, MIN_RECEIPT_TIMEOUT_SECS};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::load_from(&cli.config_dir)?;
    apply_overrides(&mut config, &cli.command);
    init_logging(&config);

    if let Err(errors) = config.validate() {
        for message in errors {
            error!("config: {}", message);
        }
        std::process::exit(1);
    }

    std::fs::create_dir_all(&config.runner.data_dir)?;

    match cli.command {
        Commands::Run { keys_file, .. } => {
            let keys_file = keys_file.unwrap_or_else(|| config.runner.keys_file.clone());
            run_portal_mode(config, &keys_file).await?;
        }
        Commands::Onchain { once, keys_file, .. } => {
            let keys_file = keys_file.unwrap_or_else(|| config.runner.keys_file.clone());
            run_onchain_mode(config, &keys_file, once).await?;
        }
        Commands::Import { file } => {
            let keys_file = file.unwrap_or_else(|| config.runner.keys_file.clone());
            run_import(config, &keys_file).await?;
        }
        Commands::Status { address } => {
            run_status(config, address.as_deref()).await?;
        }
    }

    Ok(())
}

/// Fold CLI arguments into the loaded config, enforcing the documented caps
fn apply_overrides(config: &mut AppConfig, command: &Commands) {
    match command {
        Commands::Run { concurrency, .. } => {
            if let Some(requested) = concurrency {
                config.runner.concurrency = clamp_workers(*requested);
            }
        }
        Commands::Onchain {
            workers,
            wait_receipt,
            receipt_timeout,
            ..
        } => {
            if let Some(requested) = workers {
                config.onchain.workers = clamp_workers(*requested);
            }
            if let Some(wait) = wait_receipt {
                config.onchain.wait_for_receipt = *wait;
            }
            if let Some(timeout) = receipt_timeout {
                if *timeout < MIN_RECEIPT_TIMEOUT_SECS {
                    eprintln!(
                        "receipt timeout raised to the minimum of {}s",
                        MIN_RECEIPT_TIMEOUT_SECS
                    );
                    config.onchain.receipt_timeout_secs = MIN_RECEIPT_TIMEOUT_SECS;
                } else {
                    config.onchain.receipt_timeout_secs = *timeout;
                }
            }
        }
        _ => {}
    }
}

fn clamp_workers(requested: usize) -> usize {
    if requested == 0 {
        eprintln!("worker count must be at least 1, using 1");
        1
    } else if requested > MAX_CONCURRENCY {
        eprintln!(
            "worker count above {} risks being rate limited, capping",
            MAX_CONCURRENCY
        );
        MAX_CONCURRENCY
    } else {
        requested
    }
}

async fn run_portal_mode(config: AppConfig, keys_file: &str) -> Result<()> {
    if config.captcha.api_key.is_empty() {
        error!("captcha.api_key is required for the portal flow (HUMANITY_CAPTCHA__API_KEY)");
        std::process::exit(1);
    }

    let store = AccountStore::new(&config.database.url, config.database.max_connections).await?;
    let captcha = CaptchaSolver::new(config.captcha.clone())?;
    let outcomes = Arc::new(OutcomeLog::open(&config.runner.data_dir)?);
    let keys = load_keys(keys_file)?;

    let runner = BatchRunner::new(Arc::new(config), store, captcha, outcomes);

    tokio::select! {
        result = runner.run(keys) => {
            result?;
        }
        _ = shutdown_signal() => {
            info!("interrupt received, stopping run");
        }
    }

    Ok(())
}

async fn run_onchain_mode(config: AppConfig, keys_file: &str, once: bool) -> Result<()> {
    let outcomes = Arc::new(OutcomeLog::open(&config.runner.data_dir)?);
    let claimer = OnchainClaimer::new(config.onchain.clone(), outcomes);

    if once {
        let keys = load_keys(keys_file)?;
        tokio::select! {
            result = claimer.run_cycle(keys) => result?,
            _ = shutdown_signal() => info!("interrupt received, stopping cycle"),
        }
        return Ok(());
    }

    tokio::select! {
        result = claimer.run(keys_file) => result?,
        _ = shutdown_signal() => info!("interrupt received, stopping claim loop"),
    }

    Ok(())
}

async fn run_import(config: AppConfig, keys_file: &str) -> Result<()> {
    let store = AccountStore::new(&config.database.url, config.database.max_connections).await?;
    let keys = load_keys(keys_file)?;

    let mut imported = 0usize;
    let mut existing = 0usize;
    for key in &keys {
        match Wallet::from_private_key(key) {
            Ok(wallet) => {
                if store.add_account(&wallet.address_string(), key).await? {
                    imported += 1;
                } else {
                    existing += 1;
                }
            }
            Err(e) => warn!(error = %e, "skipping unusable private key"),
        }
    }

    info!(imported, existing, total = keys.len(), "import finished");
    Ok(())
}

async fn run_status(config: AppConfig, address: Option<&str>) -> Result<()> {
    let store = AccountStore::new(&config.database.url, config.database.max_connections).await?;

    let records = match address {
        Some(address) => store
            .get_account(address)
            .await?
            .map(|r| vec![r])
            .unwrap_or_default(),
        None => store.list_accounts().await?,
    };

    if records.is_empty() {
        println!("no accounts on record");
        return Ok(());
    }

    for record in records {
        let session = match record.app_token.as_deref() {
            Some(token) if is_fresh(token) => "fresh",
            Some(_) => "expired",
            None => "none",
        };
        let last_claim = record
            .last_claim_time
            .map(|t| t.to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{}  session: {:7}  last claim: {}",
            record.address, session, last_claim
        );
    }

    Ok(())
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "info,humanity_bot={},sqlx=warn",
            config.logging.level
        ))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
