//! Cumulative activity counters kept outside the leveling core.

use async_trait::async_trait;
use levelup_core::{GuildId, Result, UserId};

/// External accumulators for voice time and message characters.
///
/// Neither counter feeds back into XP; they are statistics the host keeps.
#[async_trait]
pub trait ActivityLedger: Send + Sync {
    async fn add_voice_seconds(&self, user: &UserId, guild: &GuildId, seconds: u64) -> Result<()>;

    /// Counted for every message, whether or not the cooldown allowed a grant.
    async fn add_message_chars(&self, user: &UserId, guild: &GuildId, chars: u64) -> Result<()>;
}
