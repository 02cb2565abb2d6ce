//! Guild XP boosts
//!
//! One multiplier per guild, replaced wholesale by every `set_boost`. Expiry
//! is decided when the boost is read; the periodic sweep only tidies storage.

use crate::clock::Clock;
use crate::store::{bounded, BoostStore};
use chrono::Duration as ChronoDuration;
use levelup_core::{BoostRecord, Error, GuildId, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const NO_BOOST: u32 = 1;

pub struct BoostRegistry {
    store: Arc<dyn BoostStore>,
    clock: Arc<dyn Clock>,
    max_multiplier: u32,
    timeout: Duration,
}

impl BoostRegistry {
    pub fn new(
        store: Arc<dyn BoostStore>,
        clock: Arc<dyn Clock>,
        max_multiplier: u32,
        timeout: Duration,
    ) -> Self {
        Self { store, clock, max_multiplier, timeout }
    }

    /// Multiplier in force for `guild` right now; 1 when none is active.
    pub async fn active_multiplier(&self, guild: &GuildId) -> Result<u32> {
        Ok(self.status(guild).await?.map_or(NO_BOOST, |b| b.multiplier))
    }

    /// The unexpired boost for `guild`, if any.
    pub async fn status(&self, guild: &GuildId) -> Result<Option<BoostRecord>> {
        let record = bounded("boost.get", self.timeout, self.store.get(guild)).await?;
        let now = self.clock.now();
        Ok(record.filter(|b| b.is_active(now)))
    }

    pub async fn set_boost(
        &self,
        guild: &GuildId,
        multiplier: u32,
        duration_hours: u64,
    ) -> Result<BoostRecord> {
        if guild.is_blank() {
            return Err(Error::validation("boost requires a guild id"));
        }
        if !(1..=self.max_multiplier).contains(&multiplier) {
            return Err(Error::validation(format!(
                "multiplier {} outside 1..={}",
                multiplier, self.max_multiplier
            )));
        }
        if duration_hours == 0 {
            return Err(Error::validation("boost duration must be at least one hour"));
        }
        let hours = i64::try_from(duration_hours)
            .ok()
            .and_then(ChronoDuration::try_hours)
            .ok_or_else(|| Error::validation("boost duration too long"))?;
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(hours)
            .ok_or_else(|| Error::validation("boost duration too long"))?;

        let record = BoostRecord { guild: guild.clone(), multiplier, expires_at };
        bounded("boost.put", self.timeout, self.store.put(record.clone())).await?;
        info!("Boost x{} set for {} until {}", multiplier, guild, expires_at);
        Ok(record)
    }

    pub async fn clear(&self, guild: &GuildId) -> Result<bool> {
        let removed = bounded("boost.remove", self.timeout, self.store.remove(guild)).await?;
        if removed {
            info!("Boost cleared for {}", guild);
        }
        Ok(removed)
    }

    /// Delete expired records. Advisory: reads never rely on it.
    pub async fn sweep_expired(&self) -> Result<usize> {
        let now = self.clock.now();
        let removed =
            bounded("boost.delete_expired", self.timeout, self.store.delete_expired(now)).await?;
        if removed > 0 {
            debug!("Swept {} expired boosts", removed);
        }
        Ok(removed)
    }
}
