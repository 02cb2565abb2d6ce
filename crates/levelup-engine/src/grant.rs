//! XP grant service
//!
//! The single writer of progress records. A grant loads the member's record,
//! applies the guild boost, walks the level curve, persists once, and only
//! then pays rewards, syncs roles and announces. Grants for the same member
//! and guild are serialised behind a per-key lock held across the
//! read-modify-write and its level-up effects; the store's conditional save catches anything that
//! bypasses this service.

use crate::boost::BoostRegistry;
use crate::notify::Notifier;
use crate::rewards::RewardDispatcher;
use crate::roles::RoleReconciler;
use crate::store::{bounded, ProgressStore};
use dashmap::DashMap;
use levelup_core::{
    required, Error, GrantOutcome, GuildId, LevelProgress, LevelUpNotice, ProgressKey, RankCard,
    Result, UserId, MAX_LEVEL_STEPS,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub struct XpGrantService {
    store: Arc<dyn ProgressStore>,
    boosts: Arc<BoostRegistry>,
    rewards: RewardDispatcher,
    roles: RoleReconciler,
    notifier: Arc<dyn Notifier>,
    announce_channel: Option<String>,
    timeout: Duration,
    locks: DashMap<ProgressKey, Arc<Mutex<()>>>,
}

impl XpGrantService {
    pub fn new(
        store: Arc<dyn ProgressStore>,
        boosts: Arc<BoostRegistry>,
        rewards: RewardDispatcher,
        roles: RoleReconciler,
        notifier: Arc<dyn Notifier>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            boosts,
            rewards,
            roles,
            notifier,
            announce_channel: None,
            timeout,
            locks: DashMap::new(),
        }
    }

    pub fn with_announce_channel(mut self, channel: Option<String>) -> Self {
        self.announce_channel = channel;
        self
    }

    pub fn boosts(&self) -> &Arc<BoostRegistry> {
        &self.boosts
    }

    /// Grant `base_xp` (before boost) to `user` in `guild`.
    ///
    /// An `Err` means nothing was written and no reward, role or notice was
    /// attempted. Reward and role failures after the write are logged and do
    /// not turn the grant into an error.
    pub async fn grant(&self, user: &UserId, guild: &GuildId, base_xp: u64) -> Result<GrantOutcome> {
        if user.is_blank() || guild.is_blank() {
            return Err(Error::validation("grant requires user and guild ids"));
        }

        let key = ProgressKey::new(user, guild);
        let lock = self.locks.entry(key.clone()).or_default().clone();
        let result = {
            // Effects run under the guard too, so role syncs land in save order.
            let _guard = lock.lock().await;
            let result = self.apply(user, guild, base_xp).await;
            if let Ok(outcome) = &result {
                if outcome.level_up {
                    self.level_up_effects(outcome).await;
                }
            }
            result
        };
        drop(lock);
        self.locks.remove_if(&key, |_, l| Arc::strong_count(l) == 1);
        result
    }

    async fn apply(&self, user: &UserId, guild: &GuildId, base_xp: u64) -> Result<GrantOutcome> {
        let stored = bounded("progress.load", self.timeout, self.store.load(user, guild)).await?;
        let expected_revision = stored.as_ref().map(|p| p.revision);
        let mut progress =
            stored.unwrap_or_else(|| LevelProgress::new(user.clone(), guild.clone()));
        progress.level = progress.level.max(1);

        let multiplier = self.boosts.active_multiplier(guild).await?;
        let xp_added = base_xp.saturating_mul(u64::from(multiplier));
        let old_level = progress.level;

        if xp_added == 0 {
            return Ok(GrantOutcome {
                user: user.clone(),
                guild: guild.clone(),
                xp_added: 0,
                total_xp: progress.xp,
                old_level,
                new_level: old_level,
                level_up: false,
            });
        }

        progress.xp = progress.xp.saturating_add(xp_added);
        let reached =
            |level: u32, xp: u64| level.checked_add(1).filter(|next| xp >= required(*next));
        let mut steps = 0;
        while steps < MAX_LEVEL_STEPS {
            match reached(progress.level, progress.xp) {
                Some(next) => progress.level = next,
                None => break,
            }
            steps += 1;
        }
        if steps == MAX_LEVEL_STEPS && reached(progress.level, progress.xp).is_some() {
            warn!(
                "Level walk for {} in {} stopped at {} after {} steps (xp {})",
                user, guild, progress.level, MAX_LEVEL_STEPS, progress.xp
            );
        }

        let saved = bounded(
            "progress.save",
            self.timeout,
            self.store.save(progress, expected_revision),
        )
        .await?;

        debug!(
            "Granted {} xp (x{}) to {} in {}: total {}, level {} -> {}",
            xp_added, multiplier, user, guild, saved.xp, old_level, saved.level
        );

        Ok(GrantOutcome {
            user: user.clone(),
            guild: guild.clone(),
            xp_added,
            total_xp: saved.xp,
            old_level,
            new_level: saved.level,
            level_up: saved.level > old_level,
        })
    }

    async fn level_up_effects(&self, outcome: &GrantOutcome) {
        let (user, guild) = (&outcome.user, &outcome.guild);
        info!(
            "{} levelled up in {}: {} -> {}",
            user, guild, outcome.old_level, outcome.new_level
        );

        // Every level crossed pays out, not just the last one.
        let mut reward = 0u64;
        for level in outcome.levels_crossed() {
            match self.rewards.dispatch(user, guild, level).await {
                Ok(amount) => reward += amount,
                Err(e) => warn!("Reward for {} level {} in {} failed: {}", user, level, guild, e),
            }
        }

        match self.roles.reconcile(guild, user, outcome.new_level).await {
            Ok(report) if !report.is_noop() => debug!(
                "Roles for {} in {}: +{} -{} ({} failed)",
                user,
                guild,
                report.added.len(),
                report.removed.len(),
                report.failed.len()
            ),
            Ok(_) => {}
            Err(e) => warn!("Role sync for {} in {} failed: {}", user, guild, e),
        }

        let notice = LevelUpNotice {
            user: user.clone(),
            guild: guild.clone(),
            old_level: outcome.old_level,
            new_level: outcome.new_level,
            reward,
            channel: self.announce_channel.clone(),
        };
        let announce = async {
            self.notifier.level_up(&notice).await;
            Ok(())
        };
        if let Err(e) = bounded("notify.level_up", self.timeout, announce).await {
            warn!("Level-up notice for {} in {} dropped: {}", user, guild, e);
        }
    }

    /// Current standing of a member. Members never granted XP rank at level 1.
    pub async fn rank(&self, user: &UserId, guild: &GuildId) -> Result<RankCard> {
        let progress = bounded("progress.load", self.timeout, self.store.load(user, guild))
            .await?
            .unwrap_or_else(|| LevelProgress::new(user.clone(), guild.clone()));
        let level = progress.level.max(1);
        let level_floor = required(level);
        let next_threshold = required(level.saturating_add(1));
        Ok(RankCard {
            user: user.clone(),
            guild: guild.clone(),
            level,
            xp: progress.xp,
            level_floor,
            next_threshold,
            xp_into_level: progress.xp.saturating_sub(level_floor),
            xp_needed: next_threshold.saturating_sub(progress.xp),
        })
    }

    pub async fn leaderboard(&self, guild: &GuildId, limit: usize) -> Result<Vec<LevelProgress>> {
        bounded("progress.top", self.timeout, self.store.top(guild, limit)).await
    }
}
