//! Leveling engine configuration
//!
//! All tunable parameters in one place. Loaded from TOML at startup,
//! falls back to defaults if no config file exists.

use crate::error::{Error, Result};
use crate::types::{GuildId, LevelRoleMap, RoleId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Top-level leveling configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelingConfig {
    /// Message cooldown gate.
    pub message: MessageConfig,
    /// Voice presence sweepers.
    pub voice: VoiceConfig,
    /// Guild boost limits and expiry sweep.
    pub boost: BoostConfig,
    /// Currency paid per level crossed.
    pub rewards: RewardConfig,
    /// Persistence call limits.
    pub storage: StorageConfig,
    /// Level-up announcements.
    pub notify: NotifyConfig,
    /// Level threshold → role entries, grouped per guild at lookup time.
    pub level_roles: Vec<LevelRoleEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageConfig {
    /// Minimum seconds between two message grants for the same member.
    pub cooldown_secs: u64,
    /// How often stale cooldown entries are dropped.
    pub cooldown_prune_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    /// XP tick sweeper period.
    pub sweep_secs: u64,
    /// Minimum seconds of presence between two voice grants.
    pub xp_interval_secs: u64,
    /// Base XP per voice grant.
    pub xp_per_tick: u64,
    /// Duration flush sweeper period.
    pub flush_secs: u64,
    /// Sessions older than this are treated as orphaned and evicted.
    pub max_session_hours: u64,
    /// Sessions handled before the sweeper yields to the runtime.
    pub sweep_chunk: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoostConfig {
    /// Expired-boost cleanup period.
    pub sweep_secs: u64,
    /// Upper bound accepted by `set_boost`.
    pub max_multiplier: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    pub coins_per_level: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Upper bound on a single store call.
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Channel level-up announcements are rendered into, if any.
    pub announce_channel: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LevelRoleEntry {
    pub guild: String,
    pub level: u32,
    pub role: String,
}

/// Longest accepted sweep period or time window, in seconds (one year).
pub const MAX_PERIOD_SECS: u64 = 366 * 24 * 3600;
/// Longest accepted voice session before eviction, in hours (one year).
pub const MAX_SESSION_HOURS: u64 = 366 * 24;

fn secs_delta(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}

// ============================================================
// Defaults
// ============================================================

impl Default for MessageConfig {
    fn default() -> Self {
        Self { cooldown_secs: 60, cooldown_prune_secs: 600 }
    }
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            sweep_secs: 30,
            xp_interval_secs: 180,
            xp_per_tick: 10,
            flush_secs: 300,
            max_session_hours: 24,
            sweep_chunk: 256,
        }
    }
}

impl VoiceConfig {
    pub fn xp_interval(&self) -> chrono::Duration {
        secs_delta(self.xp_interval_secs)
    }

    pub fn max_session(&self) -> chrono::Duration {
        secs_delta(self.max_session_hours.saturating_mul(3600))
    }
}

impl Default for BoostConfig {
    fn default() -> Self {
        Self { sweep_secs: 600, max_multiplier: 10 }
    }
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self { coins_per_level: 100 }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { timeout_ms: 5_000 }
    }
}

// ============================================================
// Loading
// ============================================================

impl LevelingConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match Self::from_toml_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to load {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    pub fn validate(&self) -> Result<()> {
        let periods = [
            ("message.cooldown_secs", self.message.cooldown_secs),
            ("message.cooldown_prune_secs", self.message.cooldown_prune_secs),
            ("voice.sweep_secs", self.voice.sweep_secs),
            ("voice.flush_secs", self.voice.flush_secs),
            ("voice.xp_interval_secs", self.voice.xp_interval_secs),
            ("boost.sweep_secs", self.boost.sweep_secs),
        ];
        for (name, secs) in periods {
            if !(1..=MAX_PERIOD_SECS).contains(&secs) {
                return Err(Error::Config(format!(
                    "{} must be within 1..={}",
                    name, MAX_PERIOD_SECS
                )));
            }
        }
        if !(1..=MAX_SESSION_HOURS).contains(&self.voice.max_session_hours) {
            return Err(Error::Config(format!(
                "voice.max_session_hours must be within 1..={}",
                MAX_SESSION_HOURS
            )));
        }
        if self.voice.sweep_chunk == 0 {
            return Err(Error::Config("voice.sweep_chunk must be > 0".into()));
        }
        if !(1..=10).contains(&self.boost.max_multiplier) {
            return Err(Error::Config("boost.max_multiplier must be within 1..=10".into()));
        }
        if !(1..=MAX_PERIOD_SECS * 1_000).contains(&self.storage.timeout_ms) {
            return Err(Error::Config("storage.timeout_ms must be > 0 and at most a year".into()));
        }
        if let Some(entry) = self.level_roles.iter().find(|e| e.level == 0) {
            return Err(Error::Config(format!("level role {} has level 0", entry.role)));
        }
        Ok(())
    }

    /// Role maps keyed by guild.
    pub fn level_role_maps(&self) -> HashMap<GuildId, LevelRoleMap> {
        let mut maps: HashMap<GuildId, LevelRoleMap> = HashMap::new();
        for entry in &self.level_roles {
            maps.entry(GuildId::new(entry.guild.as_str()))
                .or_default()
                .insert(entry.level, RoleId::new(entry.role.as_str()));
        }
        maps
    }

    pub fn storage_timeout(&self) -> Duration {
        Duration::from_millis(self.storage.timeout_ms)
    }

    pub fn message_cooldown(&self) -> chrono::Duration {
        secs_delta(self.message.cooldown_secs)
    }
}
