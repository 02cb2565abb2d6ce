//! Currency rewards for levels reached.

use crate::store::bounded;
use async_trait::async_trait;
use levelup_core::{GuildId, Result, UserId};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// External currency ledger. Only ever credited by the engine.
#[async_trait]
pub trait CurrencyLedger: Send + Sync {
    async fn credit(&self, user: &UserId, guild: &GuildId, amount: u64) -> Result<()>;
}

/// Pays `level * coins_per_level` for each level reached.
///
/// Credits carry no idempotency key: a retried dispatch pays twice. The grant
/// service never retries.
pub struct RewardDispatcher {
    ledger: Arc<dyn CurrencyLedger>,
    coins_per_level: u64,
    timeout: Duration,
}

impl RewardDispatcher {
    pub fn new(ledger: Arc<dyn CurrencyLedger>, coins_per_level: u64, timeout: Duration) -> Self {
        Self { ledger, coins_per_level, timeout }
    }

    pub fn reward_for(&self, level: u32) -> u64 {
        u64::from(level).saturating_mul(self.coins_per_level)
    }

    /// Credit the reward for reaching `level`. Returns the amount paid.
    pub async fn dispatch(&self, user: &UserId, guild: &GuildId, level: u32) -> Result<u64> {
        let amount = self.reward_for(level);
        if amount == 0 {
            return Ok(0);
        }
        bounded("credit", self.timeout, self.ledger.credit(user, guild, amount)).await?;
        info!("Credited {} to {} in {} for level {}", amount, user, guild, level);
        Ok(amount)
    }
}
