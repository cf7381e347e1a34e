//! Batch coordinator: fans the claim pipeline out over many wallets with a
//! bounded worker pool. One wallet's failure never touches its siblings.

pub mod outcome;

pub use outcome::OutcomeLog;

use dashmap::DashMap;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::adapters::capsolver::CaptchaSolver;
use crate::adapters::portal::PortalClient;
use crate::adapters::store::AccountStore;
use crate::auth::jwt::is_fresh;
use crate::auth::session::SessionEstablisher;
use crate::claim::eligibility::can_claim;
use crate::claim::executor::{ClaimExecutor, ClaimOutcome};
use crate::config::AppConfig;
use crate::domain::now_reference;
use crate::error::{BotError, Result};
use crate::signing::Wallet;

/// Per-wallet result of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletOutcome {
    /// Reward claimed this run
    Claimed,
    /// Nothing left to claim today
    AlreadyClaimed,
    /// Outside the claim window, or reward reported available-but-unclaimed
    Skipped,
    /// Pipeline error; recorded in the failed file
    Failed,
}

/// Counts across one full run
#[derive(Debug, Default, Clone, Copy)]
pub struct RunSummary {
    pub processed: usize,
    pub claimed: usize,
    pub already_claimed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl RunSummary {
    fn tally(&mut self, outcome: WalletOutcome) {
        self.processed += 1;
        match outcome {
            WalletOutcome::Claimed => self.claimed += 1,
            WalletOutcome::AlreadyClaimed => self.already_claimed += 1,
            WalletOutcome::Skipped => self.skipped += 1,
            WalletOutcome::Failed => self.failed += 1,
        }
    }
}

/// Load private keys from a file, one per line, de-duplicated, order kept
pub fn load_keys<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path.as_ref())?;

    let mut seen = HashSet::new();
    let keys: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(line.to_string()))
        .map(str::to_string)
        .collect();

    Ok(keys)
}

/// Shared worker context, cheap to clone into spawned tasks
#[derive(Clone)]
struct WorkerContext {
    config: Arc<AppConfig>,
    store: AccountStore,
    captcha: CaptchaSolver,
    outcomes: Arc<OutcomeLog>,
    /// Per-address pipeline locks: at most one concurrent attempt per wallet
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

/// Fans the per-wallet claim pipeline across a bounded pool
pub struct BatchRunner {
    ctx: WorkerContext,
    concurrency: usize,
}

impl BatchRunner {
    pub fn new(
        config: Arc<AppConfig>,
        store: AccountStore,
        captcha: CaptchaSolver,
        outcomes: Arc<OutcomeLog>,
    ) -> Self {
        let concurrency = config.runner.concurrency;
        Self {
            ctx: WorkerContext {
                config,
                store,
                captcha,
                outcomes,
                locks: Arc::new(DashMap::new()),
            },
            concurrency,
        }
    }

    /// Process every wallet exactly once, at most `concurrency` in flight
    pub async fn run(&self, keys: Vec<String>) -> Result<RunSummary> {
        info!(
            wallets = keys.len(),
            concurrency = self.concurrency,
            "starting claim run"
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for key in keys {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| BotError::Cancelled)?;
            let ctx = self.ctx.clone();

            tasks.spawn(async move {
                let _permit = permit;
                process_wallet(ctx, key).await
            });
        }

        let mut summary = RunSummary::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => summary.tally(outcome),
                Err(e) => {
                    error!(error = %e, "wallet task aborted");
                    summary.tally(WalletOutcome::Failed);
                }
            }
        }

        info!(
            processed = summary.processed,
            claimed = summary.claimed,
            already_claimed = summary.already_claimed,
            skipped = summary.skipped,
            failed = summary.failed,
            "claim run finished"
        );
        Ok(summary)
    }
}

/// Error-isolating wrapper: whatever happens inside the pipeline is turned
/// into a recorded outcome, never a propagated error.
async fn process_wallet(ctx: WorkerContext, private_key: String) -> WalletOutcome {
    let wallet = match Wallet::from_private_key(&private_key) {
        Ok(wallet) => wallet,
        Err(e) => {
            // No address to key an outcome record on
            error!(error = %e, "unusable private key, skipping");
            return WalletOutcome::Failed;
        }
    };
    let address = wallet.address_string();

    match wallet_pipeline(&ctx, &wallet, &private_key).await {
        Ok(outcome) => {
            let recorded = match outcome {
                WalletOutcome::Claimed | WalletOutcome::AlreadyClaimed => {
                    ctx.outcomes.record_claimed(&address, &private_key)
                }
                _ => Ok(()),
            };
            if let Err(e) = recorded {
                error!(%address, error = %e, "failed to write outcome record");
            }
            outcome
        }
        Err(e) => {
            error!(%address, error = %e, "wallet processing failed");
            if let Err(log_err) = ctx.outcomes.record_failed(&address, &private_key) {
                error!(%address, error = %log_err, "failed to write failure record");
            }
            WalletOutcome::Failed
        }
    }
}

/// The per-wallet pipeline: eligibility, freshness, login if needed, claim
async fn wallet_pipeline(
    ctx: &WorkerContext,
    wallet: &Wallet,
    private_key: &str,
) -> Result<WalletOutcome> {
    let address = wallet.address_string();

    let lock = ctx
        .locks
        .entry(address.clone())
        .or_insert_with(|| Arc::new(Mutex::new(())))
        .clone();
    let _guard = lock.lock().await;

    ctx.store.add_account(&address, private_key).await?;
    let record = ctx
        .store
        .get_account(&address)
        .await?
        .ok_or_else(|| BotError::Internal(format!("account {} vanished after insert", address)))?;

    let mut portal = PortalClient::new(ctx.config.portal.clone())?;

    let now = now_reference();
    if !can_claim(record.last_claim_time, now) {
        info!(
            %address,
            last_claim = ?record.last_claim_time,
            "claim window not open for this wallet"
        );
        // Report availability when a usable session is already on file
        if let Some(token) = record.app_token.as_deref().filter(|t| is_fresh(t)) {
            portal.set_app_token(token);
            match portal.daily_check().await {
                Ok(check) => debug!(%address, available = ?check.available, "availability probe"),
                Err(e) => debug!(%address, error = %e, "availability probe failed"),
            }
        }
        return Ok(WalletOutcome::Skipped);
    }

    let needs_login = !record
        .app_token
        .as_deref()
        .map(is_fresh)
        .unwrap_or(false);

    if needs_login {
        let establisher = SessionEstablisher::new(&ctx.captcha, &ctx.config.portal);
        let tokens = establisher.establish(&portal, wallet).await?;
        ctx.store
            .update_tokens(&address, &tokens.session_token, &tokens.app_token)
            .await?;
        portal.set_app_token(&tokens.app_token);
    } else if let Some(token) = record.app_token.as_deref() {
        debug!(%address, "reusing fresh application token");
        portal.set_app_token(token);
    }

    let executor = ClaimExecutor::default();
    match executor.claim(&portal, &ctx.store, &address).await? {
        ClaimOutcome::Claimed => Ok(WalletOutcome::Claimed),
        ClaimOutcome::NothingToClaim => Ok(WalletOutcome::AlreadyClaimed),
        ClaimOutcome::AvailableNotClaimed => {
            warn!(%address, "claim deferred, will retry next run");
            Ok(WalletOutcome::Skipped)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn keys_are_deduplicated_in_order() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "0xaaa").unwrap();
        writeln!(file, "  ").unwrap();
        writeln!(file, "0xbbb").unwrap();
        writeln!(file, "0xaaa").unwrap();

        let keys = load_keys(file.path()).unwrap();
        assert_eq!(keys, vec!["0xaaa".to_string(), "0xbbb".to_string()]);
    }

    #[test]
    fn summary_tallies_outcomes() {
        let mut summary = RunSummary::default();
        summary.tally(WalletOutcome::Claimed);
        summary.tally(WalletOutcome::Failed);
        summary.tally(WalletOutcome::Skipped);
        summary.tally(WalletOutcome::AlreadyClaimed);

        assert_eq!(summary.processed, 4);
        assert_eq!(summary.claimed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.already_claimed, 1);
    }
}
