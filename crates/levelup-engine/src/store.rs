//! Persistence seams for progress and boost records
//!
//! The engine only talks to storage through these traits. Every call it makes
//! is wrapped in [`bounded`] so a stalled backend surfaces as
//! [`Error::Timeout`] instead of hanging a sweeper.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use levelup_core::{BoostRecord, Error, GuildId, LevelProgress, Result, UserId};
use std::future::Future;
use std::time::Duration;

#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn load(&self, user: &UserId, guild: &GuildId) -> Result<Option<LevelProgress>>;

    /// Conditional write.
    ///
    /// `expected_revision == None` creates the record and fails with
    /// [`Error::Conflict`] if one already exists. `Some(r)` replaces the
    /// record only while its stored revision is still `r`. Returns the stored
    /// record with its new revision.
    async fn save(
        &self,
        progress: LevelProgress,
        expected_revision: Option<u64>,
    ) -> Result<LevelProgress>;

    /// Highest-XP records of a guild, ties broken by user id.
    async fn top(&self, guild: &GuildId, limit: usize) -> Result<Vec<LevelProgress>>;
}

#[async_trait]
pub trait BoostStore: Send + Sync {
    async fn get(&self, guild: &GuildId) -> Result<Option<BoostRecord>>;

    /// Upsert; replaces any previous record for the guild.
    async fn put(&self, record: BoostRecord) -> Result<()>;

    async fn remove(&self, guild: &GuildId) -> Result<bool>;

    /// Drop records with `expires_at <= now`. Returns how many were removed.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

/// Run a store call with an upper bound on its duration.
pub async fn bounded<T, F>(op: &'static str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            op,
            after_ms: limit.as_millis() as u64,
        }),
    }
}
