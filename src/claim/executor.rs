//! Daily claim execution with durable outcome recording.

use tracing::{info, warn};

use crate::adapters::portal::PortalClient;
use crate::adapters::store::AccountStore;
use crate::domain::now_reference;
use crate::error::Result;

use super::retry::RetryPolicy;

/// What a claim attempt amounted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This call claimed the reward; `last_claim_time` was advanced
    Claimed,
    /// The portal reports the reward as still claimable but this call did
    /// not take it; nothing was persisted
    AvailableNotClaimed,
    /// Nothing left to claim this cycle; nothing was persisted
    NothingToClaim,
}

/// Executes claims against the portal and records successes in the store
pub struct ClaimExecutor {
    policy: RetryPolicy,
}

impl ClaimExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Attempt the daily claim for an authenticated wallet session.
    ///
    /// Preconditions: the wallet is eligible per the claim window policy and
    /// `portal` carries a fresh application token. The only durable mutation
    /// is `last_claim_time`, written exactly once on a confirmed claim.
    pub async fn claim(
        &self,
        portal: &PortalClient,
        store: &AccountStore,
        address: &str,
    ) -> Result<ClaimOutcome> {
        let response = self.policy.run(|| portal.daily_claim()).await?;

        let claimed = response.daily_claimed.unwrap_or(false);
        let available = response.available.unwrap_or(false);
        let message = response.message.as_deref().unwrap_or("");

        if claimed {
            let now = now_reference().naive_local();
            store.update_claim_time(address, now).await?;
            info!(%address, %message, amount = ?response.amount, "daily reward claimed");
            return Ok(ClaimOutcome::Claimed);
        }

        if available {
            warn!(%address, %message, "reward reported available but not claimed");
            return Ok(ClaimOutcome::AvailableNotClaimed);
        }

        info!(%address, %message, "nothing to claim this cycle");
        Ok(ClaimOutcome::NothingToClaim)
    }
}

impl Default for ClaimExecutor {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}
