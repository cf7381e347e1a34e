//! On-chain claimer for the Rewards contract.
//!
//! Bypasses the portal entirely: reads per-epoch claim status straight from
//! the contract and submits `claimReward` transactions, batching wallets
//! through a bounded worker pool on a 6-hour cycle.

use alloy::network::EthereumWallet;
use alloy::primitives::Address;
use alloy::providers::ProviderBuilder;
use alloy::sol;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::OnchainConfig;
use crate::error::{BotError, Result};
use crate::runner::{load_keys, OutcomeLog};
use crate::signing::Wallet;

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface IRewards {
        struct UserClaim {
            uint256 buffer;
            bool claimStatus;
        }

        function claimReward() external;
        function currentEpoch() external view returns (uint256);
        function userClaimStatus(address user, uint256 epochID) external view returns (UserClaim memory);
        function userGenesisClaimStatus(address user) external view returns (bool);
    }
}

/// Result of one wallet's on-chain pass
#[derive(Debug, Clone)]
pub enum ChainOutcome {
    /// Transaction confirmed within the receipt timeout
    Claimed { tx_hash: String },
    /// Contract already shows this epoch as claimed
    AlreadyClaimed { epoch: String },
    /// Broadcast went out but no receipt was observed. Recorded as a
    /// failure so the next cycle re-checks the contract state.
    Unconfirmed { tx_hash: String },
}

/// Whether the contract state calls for a claim attempt
pub fn should_claim(genesis_claimed: bool, epoch_claimed: bool) -> bool {
    (genesis_claimed && !epoch_claimed) || !genesis_claimed
}

/// Drives `claimReward` for a batch of wallets on a fixed cycle
pub struct OnchainClaimer {
    config: OnchainConfig,
    outcomes: Arc<OutcomeLog>,
}

impl OnchainClaimer {
    pub fn new(config: OnchainConfig, outcomes: Arc<OutcomeLog>) -> Self {
        Self { config, outcomes }
    }

    /// Cycle forever: claim for every wallet, sleep, repeat.
    ///
    /// Keys are reloaded each cycle so the file can be edited while running.
    /// A failed cycle waits a minute and tries again.
    pub async fn run(&self, keys_file: &str) -> Result<()> {
        loop {
            match load_keys(keys_file) {
                Ok(keys) => {
                    if let Err(e) = self.run_cycle(keys).await {
                        error!(error = %e, "cycle failed");
                        sleep(Duration::from_secs(60)).await;
                        continue;
                    }
                    let (claimed, failed) = self.outcomes.counts();
                    info!(
                        claimed,
                        failed,
                        interval_secs = self.config.cycle_interval_secs,
                        "cycle complete, sleeping"
                    );
                    sleep(Duration::from_secs(self.config.cycle_interval_secs)).await;
                }
                Err(e) => {
                    error!(error = %e, "could not load wallet keys");
                    sleep(Duration::from_secs(60)).await;
                }
            }
        }
    }

    /// One pass over the wallet set through the bounded pool
    pub async fn run_cycle(&self, keys: Vec<String>) -> Result<()> {
        info!(
            wallets = keys.len(),
            workers = self.config.workers,
            wait_for_receipt = self.config.wait_for_receipt,
            "starting on-chain cycle"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let mut tasks = JoinSet::new();

        for key in keys {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| BotError::Cancelled)?;
            let config = self.config.clone();
            let outcomes = self.outcomes.clone();

            tasks.spawn(async move {
                let _permit = permit;
                process_wallet(&config, &outcomes, &key).await;
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "on-chain worker aborted");
            }
        }

        Ok(())
    }

    /// Check contract state for one wallet and claim when due
    async fn claim_wallet(config: &OnchainConfig, wallet: &Wallet) -> Result<ChainOutcome> {
        let address = wallet.address();

        let rpc_url = config
            .rpc_url
            .parse()
            .map_err(|e| BotError::AddressParsing(format!("invalid RPC URL: {}", e)))?;
        let contract_address: Address = config
            .contract_address
            .parse()
            .map_err(|e| BotError::AddressParsing(format!("invalid contract address: {}", e)))?;

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(wallet.signer().clone()))
            .connect_http(rpc_url);
        let contract = IRewards::new(contract_address, provider);

        let genesis_claimed = contract
            .userGenesisClaimStatus(address)
            .call()
            .await
            .map_err(|e| BotError::Chain(format!("genesis status read failed: {}", e)))?;
        let epoch = contract
            .currentEpoch()
            .call()
            .await
            .map_err(|e| BotError::Chain(format!("epoch read failed: {}", e)))?;
        let status = contract
            .userClaimStatus(address, epoch)
            .call()
            .await
            .map_err(|e| BotError::Chain(format!("claim status read failed: {}", e)))?;

        if !should_claim(genesis_claimed, status.claimStatus) {
            info!(%address, epoch = %epoch, "epoch reward already claimed");
            return Ok(ChainOutcome::AlreadyClaimed {
                epoch: epoch.to_string(),
            });
        }

        info!(%address, epoch = %epoch, genesis_claimed, "submitting claim transaction");
        let pending = contract
            .claimReward()
            .send()
            .await
            .map_err(|e| BotError::Chain(format!("claim tx failed: {}", e)))?;
        let tx_hash = format!("{:?}", pending.tx_hash());

        if !config.wait_for_receipt {
            info!(%address, %tx_hash, "claim broadcast, not waiting for receipt");
            return Ok(ChainOutcome::Unconfirmed { tx_hash });
        }

        match pending
            .with_timeout(Some(Duration::from_secs(config.receipt_timeout_secs)))
            .get_receipt()
            .await
        {
            Ok(receipt) => {
                let tx_hash = format!("{:?}", receipt.transaction_hash);
                info!(%address, %tx_hash, "claim confirmed");
                Ok(ChainOutcome::Claimed { tx_hash })
            }
            Err(e) => {
                warn!(%address, %tx_hash, error = %e, "claim submitted but unconfirmed");
                Ok(ChainOutcome::Unconfirmed { tx_hash })
            }
        }
    }
}

/// Error-isolating wrapper recording every wallet's outcome
async fn process_wallet(config: &OnchainConfig, outcomes: &OutcomeLog, private_key: &str) {
    let wallet = match Wallet::from_private_key(private_key) {
        Ok(wallet) => wallet,
        Err(e) => {
            error!(error = %e, "unusable private key, skipping");
            return;
        }
    };
    let address = wallet.address_string();

    let recorded = match OnchainClaimer::claim_wallet(config, &wallet).await {
        Ok(ChainOutcome::Claimed { .. }) | Ok(ChainOutcome::AlreadyClaimed { .. }) => {
            outcomes.record_claimed(&address, private_key)
        }
        Ok(ChainOutcome::Unconfirmed { .. }) => outcomes.record_failed(&address, private_key),
        Err(e) => {
            error!(%address, error = %e, "on-chain claim failed");
            outcomes.record_failed(&address, private_key)
        }
    };

    if let Err(e) = recorded {
        error!(%address, error = %e, "failed to write outcome record");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claim_is_due_until_epoch_is_marked() {
        // Genesis claimed, epoch still open
        assert!(should_claim(true, false));
        // Genesis never claimed: always attempt
        assert!(should_claim(false, false));
        assert!(should_claim(false, true));
        // Both done: nothing to do
        assert!(!should_claim(true, true));
    }

    #[test]
    fn default_contract_address_parses() {
        let parsed = "0xa18f6FCB2Fd4884436d10610E69DB7BFa1bFe8C7".parse::<Address>();
        assert!(parsed.is_ok());
    }
}
