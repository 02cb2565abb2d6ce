//! In-memory collaborators
//!
//! Backing for the daemon's standalone mode and for tests. Each keeps a
//! count of the calls it served so callers can assert on side effects.

use crate::activity::ActivityLedger;
use crate::clock::Clock;
use crate::engine::Collaborators;
use crate::notify::Notifier;
use crate::rewards::CurrencyLedger;
use crate::roles::RoleGateway;
use crate::store::{BoostStore, ProgressStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use levelup_core::{
    BoostRecord, Error, GuildId, LevelProgress, LevelUpNotice, ProgressKey, Result, RoleId, UserId,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    progress: DashMap<ProgressKey, LevelProgress>,
    boosts: DashMap<GuildId, BoostRecord>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }

    pub fn progress_of(&self, user: &UserId, guild: &GuildId) -> Option<LevelProgress> {
        self.progress.get(&ProgressKey::new(user, guild)).map(|p| p.clone())
    }

    /// Seed or overwrite a record without revision checks.
    pub fn insert_progress(&self, progress: LevelProgress) {
        self.progress.insert(progress.key(), progress);
    }

    pub fn boost_rows(&self) -> usize {
        self.boosts.len()
    }
}

#[async_trait]
impl ProgressStore for MemoryStore {
    async fn load(&self, user: &UserId, guild: &GuildId) -> Result<Option<LevelProgress>> {
        Ok(self.progress_of(user, guild))
    }

    async fn save(
        &self,
        mut progress: LevelProgress,
        expected_revision: Option<u64>,
    ) -> Result<LevelProgress> {
        let stored = match self.progress.entry(progress.key()) {
            Entry::Occupied(mut current) => match expected_revision {
                Some(rev) if current.get().revision == rev => {
                    progress.revision = rev + 1;
                    current.insert(progress.clone());
                    progress.clone()
                }
                _ => return Err(conflict(&progress)),
            },
            Entry::Vacant(slot) => {
                if expected_revision.is_some() {
                    return Err(conflict(&progress));
                }
                progress.revision = 1;
                slot.insert(progress.clone());
                progress.clone()
            }
        };
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(stored)
    }

    async fn top(&self, guild: &GuildId, limit: usize) -> Result<Vec<LevelProgress>> {
        let mut rows: Vec<LevelProgress> = self
            .progress
            .iter()
            .filter(|e| &e.key().guild == guild)
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by(|a, b| b.xp.cmp(&a.xp).then_with(|| a.user.cmp(&b.user)));
        rows.truncate(limit);
        Ok(rows)
    }
}

fn conflict(progress: &LevelProgress) -> Error {
    Error::Conflict {
        user: progress.user.to_string(),
        guild: progress.guild.to_string(),
    }
}

#[async_trait]
impl BoostStore for MemoryStore {
    async fn get(&self, guild: &GuildId) -> Result<Option<BoostRecord>> {
        Ok(self.boosts.get(guild).map(|b| b.clone()))
    }

    async fn put(&self, record: BoostRecord) -> Result<()> {
        self.boosts.insert(record.guild.clone(), record);
        Ok(())
    }

    async fn remove(&self, guild: &GuildId) -> Result<bool> {
        Ok(self.boosts.remove(guild).is_some())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let before = self.boosts.len();
        self.boosts.retain(|_, b| b.is_active(now));
        Ok(before.saturating_sub(self.boosts.len()))
    }
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryRoles {
    held: DashMap<(GuildId, UserId), HashSet<RoleId>>,
    /// Roles whose add/remove always fails.
    broken: DashMap<RoleId, ()>,
    lookups: AtomicUsize,
    adds: AtomicUsize,
    removes: AtomicUsize,
}

impl MemoryRoles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant_directly(&self, guild: &GuildId, user: &UserId, role: impl Into<RoleId>) {
        self.held
            .entry((guild.clone(), user.clone()))
            .or_default()
            .insert(role.into());
    }

    pub fn break_role(&self, role: impl Into<RoleId>) {
        self.broken.insert(role.into(), ());
    }

    pub fn roles_of(&self, guild: &GuildId, user: &UserId) -> HashSet<RoleId> {
        self.held
            .get(&(guild.clone(), user.clone()))
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Number of `member_roles` reads, i.e. reconcile passes that reached the gateway.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    /// Total add + remove calls served, failed ones included.
    pub fn operations(&self) -> usize {
        self.adds.load(Ordering::Relaxed) + self.removes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RoleGateway for MemoryRoles {
    async fn member_roles(&self, guild: &GuildId, user: &UserId) -> Result<HashSet<RoleId>> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        Ok(self.roles_of(guild, user))
    }

    async fn add_role(&self, guild: &GuildId, user: &UserId, role: &RoleId) -> Result<()> {
        self.adds.fetch_add(1, Ordering::Relaxed);
        if self.broken.contains_key(role) {
            return Err(Error::role(role.as_str(), "missing permissions"));
        }
        self.grant_directly(guild, user, role.clone());
        Ok(())
    }

    async fn remove_role(&self, guild: &GuildId, user: &UserId, role: &RoleId) -> Result<()> {
        self.removes.fetch_add(1, Ordering::Relaxed);
        if self.broken.contains_key(role) {
            return Err(Error::role(role.as_str(), "missing permissions"));
        }
        if let Some(mut roles) = self.held.get_mut(&(guild.clone(), user.clone())) {
            roles.remove(role);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Currency
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryLedger {
    balances: DashMap<ProgressKey, u64>,
    credits: Mutex<Vec<(UserId, GuildId, u64)>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, user: &UserId, guild: &GuildId) -> u64 {
        self.balances
            .get(&ProgressKey::new(user, guild))
            .map(|b| *b)
            .unwrap_or(0)
    }

    /// Every credit in the order it was made.
    pub fn credits(&self) -> Vec<(UserId, GuildId, u64)> {
        self.credits.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CurrencyLedger for MemoryLedger {
    async fn credit(&self, user: &UserId, guild: &GuildId, amount: u64) -> Result<()> {
        *self.balances.entry(ProgressKey::new(user, guild)).or_insert(0) += amount;
        if let Ok(mut credits) = self.credits.lock() {
            credits.push((user.clone(), guild.clone(), amount));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Activity
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryActivity {
    voice_seconds: DashMap<ProgressKey, u64>,
    message_chars: DashMap<ProgressKey, u64>,
}

impl MemoryActivity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn voice_seconds(&self, user: &UserId, guild: &GuildId) -> u64 {
        self.voice_seconds
            .get(&ProgressKey::new(user, guild))
            .map(|s| *s)
            .unwrap_or(0)
    }

    pub fn message_chars(&self, user: &UserId, guild: &GuildId) -> u64 {
        self.message_chars
            .get(&ProgressKey::new(user, guild))
            .map(|c| *c)
            .unwrap_or(0)
    }
}

#[async_trait]
impl ActivityLedger for MemoryActivity {
    async fn add_voice_seconds(&self, user: &UserId, guild: &GuildId, seconds: u64) -> Result<()> {
        *self.voice_seconds.entry(ProgressKey::new(user, guild)).or_insert(0) += seconds;
        Ok(())
    }

    async fn add_message_chars(&self, user: &UserId, guild: &GuildId, chars: u64) -> Result<()> {
        *self.message_chars.entry(ProgressKey::new(user, guild)).or_insert(0) += chars;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// Keeps every notice it receives.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<LevelUpNotice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<LevelUpNotice> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn level_up(&self, notice: &LevelUpNotice) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// One of each in-memory collaborator, kept addressable after wiring.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    pub store: Arc<MemoryStore>,
    pub roles: Arc<MemoryRoles>,
    pub ledger: Arc<MemoryLedger>,
    pub activity: Arc<MemoryActivity>,
    pub notices: Arc<RecordingNotifier>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collaborators backed by this bundle, announcing through `notifier`.
    pub fn collaborators_with(
        &self,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Collaborators {
        Collaborators {
            progress: self.store.clone(),
            boosts: self.store.clone(),
            roles: self.roles.clone(),
            ledger: self.ledger.clone(),
            activity: self.activity.clone(),
            notifier,
            clock,
        }
    }

    /// Collaborators that record notices into `self.notices`.
    pub fn collaborators(&self, clock: Arc<dyn Clock>) -> Collaborators {
        self.collaborators_with(clock, self.notices.clone())
    }
}
