//! Core types for Levelup

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::Arc;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub struct $name(Arc<str>);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(Arc::from(s.into()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_blank(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::new(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0.to_string()
            }
        }
    };
}

id_type!(
    /// Member identifier - cheaply cloneable
    UserId
);
id_type!(
    /// Guild (server) identifier
    GuildId
);
id_type!(
    /// Role identifier in a guild's role catalog
    RoleId
);

/// Key of a progress record.
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct ProgressKey {
    pub user: UserId,
    pub guild: GuildId,
}

impl ProgressKey {
    pub fn new(user: &UserId, guild: &GuildId) -> Self {
        Self {
            user: user.clone(),
            guild: guild.clone(),
        }
    }
}

/// Per-member progression within a guild.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LevelProgress {
    pub user: UserId,
    pub guild: GuildId,
    pub xp: u64,
    pub level: u32,
    /// Bumped by the store on every successful save.
    #[serde(default)]
    pub revision: u64,
}

impl LevelProgress {
    pub fn new(user: UserId, guild: GuildId) -> Self {
        Self {
            user,
            guild,
            xp: 0,
            level: 1,
            revision: 0,
        }
    }

    pub fn key(&self) -> ProgressKey {
        ProgressKey::new(&self.user, &self.guild)
    }
}

/// Guild-wide XP multiplier. At most one per guild.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BoostRecord {
    pub guild: GuildId,
    pub multiplier: u32,
    pub expires_at: DateTime<Utc>,
}

impl BoostRecord {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Result of a single XP grant.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GrantOutcome {
    pub user: UserId,
    pub guild: GuildId,
    pub xp_added: u64,
    pub total_xp: u64,
    pub old_level: u32,
    pub new_level: u32,
    pub level_up: bool,
}

impl GrantOutcome {
    /// Every level newly reached by this grant, lowest first. Empty without a level-up.
    pub fn levels_crossed(&self) -> RangeInclusive<u32> {
        if self.level_up {
            (self.old_level + 1)..=self.new_level
        } else {
            // empty range
            1..=0
        }
    }
}

/// Ephemeral voice presence record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VoiceSession {
    pub user: UserId,
    pub guild: GuildId,
    pub joined_at: DateTime<Utc>,
    pub last_xp_at: DateTime<Utc>,
}

/// Level threshold → role for a single guild, ordered by threshold.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LevelRoleMap {
    tiers: BTreeMap<u32, RoleId>,
}

impl LevelRoleMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, level: u32, role: RoleId) {
        self.tiers.insert(level, role);
    }

    pub fn with(mut self, level: u32, role: impl Into<RoleId>) -> Self {
        self.insert(level, role.into());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &RoleId)> {
        self.tiers.iter().map(|(level, role)| (*level, role))
    }

    /// Roles a member at `level` is entitled to.
    pub fn earned(&self, level: u32) -> impl Iterator<Item = &RoleId> {
        self.tiers.range(..=level).map(|(_, role)| role)
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }
}

/// Read-only view of a member's position on the curve.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RankCard {
    pub user: UserId,
    pub guild: GuildId,
    pub level: u32,
    pub xp: u64,
    /// `required(level)`
    pub level_floor: u64,
    /// `required(level + 1)`
    pub next_threshold: u64,
    pub xp_into_level: u64,
    pub xp_needed: u64,
}

/// Descriptor handed to the notification collaborator after a level-up.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct LevelUpNotice {
    pub user: UserId,
    pub guild: GuildId,
    pub old_level: u32,
    pub new_level: u32,
    /// Total currency credited across all crossed levels.
    pub reward: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
}
