//! Activity events accepted on the daemon's input, and its replies.

use levelup_core::{BoostRecord, GrantOutcome, GuildId, LevelProgress, RankCard, UserId};
use serde::{Deserialize, Serialize};

fn default_limit() -> usize {
    10
}

/// One line of input. Gateways translate their own events into these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityEvent {
    VoiceJoin {
        user: UserId,
        guild: GuildId,
    },
    VoiceLeave {
        user: UserId,
    },
    /// A message that already passed the host's filters (not a bot, not a command).
    Message {
        user: UserId,
        guild: GuildId,
        text: String,
    },
    SetBoost {
        guild: GuildId,
        multiplier: u32,
        hours: u64,
    },
    ClearBoost {
        guild: GuildId,
    },
    Rank {
        user: UserId,
        guild: GuildId,
    },
    Leaderboard {
        guild: GuildId,
        #[serde(default = "default_limit")]
        limit: usize,
    },
}

/// One line of output per handled event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DriverReply {
    Joined {
        user: UserId,
        replaced_stale: bool,
    },
    Left {
        user: UserId,
        seconds: Option<u64>,
    },
    Granted(GrantOutcome),
    Cooldown {
        user: UserId,
        guild: GuildId,
    },
    Boost(BoostRecord),
    BoostCleared {
        guild: GuildId,
        removed: bool,
    },
    Rank(RankCard),
    Leaderboard {
        guild: GuildId,
        entries: Vec<LevelProgress>,
    },
    Error {
        message: String,
    },
}

/// Parse one input line. Blank lines and `#` comments yield `None`.
pub fn parse_line(line: &str) -> serde_json::Result<Option<ActivityEvent>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(line).map(Some)
}
