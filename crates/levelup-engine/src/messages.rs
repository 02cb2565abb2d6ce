//! Message activity gate
//!
//! One XP per character, at most once per cooldown window per member and
//! guild. Messages inside the window still count toward the character
//! total kept by the activity ledger.

use crate::activity::ActivityLedger;
use crate::clock::Clock;
use crate::grant::XpGrantService;
use crate::store::bounded;
use chrono::Duration as ChronoDuration;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use levelup_core::{Error, GrantOutcome, GuildId, ProgressKey, Result, UserId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct MessageGate {
    last_grant: DashMap<ProgressKey, chrono::DateTime<chrono::Utc>>,
    grants: Arc<XpGrantService>,
    activity: Arc<dyn ActivityLedger>,
    clock: Arc<dyn Clock>,
    cooldown: ChronoDuration,
    timeout: Duration,
}

impl MessageGate {
    pub fn new(
        grants: Arc<XpGrantService>,
        activity: Arc<dyn ActivityLedger>,
        clock: Arc<dyn Clock>,
        cooldown: ChronoDuration,
        timeout: Duration,
    ) -> Self {
        Self {
            last_grant: DashMap::new(),
            grants,
            activity,
            clock,
            cooldown,
            timeout,
        }
    }

    /// Handle a qualifying message.
    ///
    /// `Ok(None)` means the cooldown swallowed it (or it was empty). The
    /// cooldown window starts when a grant is attempted, so a failed grant
    /// still waits out the window.
    pub async fn on_message(
        &self,
        user: &UserId,
        guild: &GuildId,
        text: &str,
    ) -> Result<Option<GrantOutcome>> {
        if user.is_blank() || guild.is_blank() {
            return Err(Error::validation("message requires user and guild ids"));
        }
        let chars = text.chars().count() as u64;
        if chars == 0 {
            return Ok(None);
        }

        let counted = self.activity.add_message_chars(user, guild, chars);
        if let Err(e) = bounded("activity.chars", self.timeout, counted).await {
            warn!("Character count for {} in {} not recorded: {}", user, guild, e);
        }

        if !self.claim(ProgressKey::new(user, guild)) {
            debug!("Message from {} in {} inside cooldown", user, guild);
            return Ok(None);
        }

        self.grants.grant(user, guild, chars).await.map(Some)
    }

    /// Start a new window for `key` if the previous one has run out.
    fn claim(&self, key: ProgressKey) -> bool {
        let now = self.clock.now();
        match self.last_grant.entry(key) {
            Entry::Occupied(mut last) => {
                if now - *last.get() >= self.cooldown {
                    last.insert(now);
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
                true
            }
        }
    }

    /// Whether a message from `user` in `guild` would be granted right now.
    pub fn is_ready(&self, user: &UserId, guild: &GuildId) -> bool {
        let now = self.clock.now();
        self.last_grant
            .get(&ProgressKey::new(user, guild))
            .map_or(true, |last| now - *last >= self.cooldown)
    }

    /// Forget windows that have run out. Returns how many were dropped.
    pub fn prune(&self) -> usize {
        let now = self.clock.now();
        let before = self.last_grant.len();
        self.last_grant.retain(|_, last| now - *last < self.cooldown);
        before.saturating_sub(self.last_grant.len())
    }

    pub fn tracked(&self) -> usize {
        self.last_grant.len()
    }
}
