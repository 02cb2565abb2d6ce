//! Level role reconciliation
//!
//! Brings a member's level roles in line with their level. Every role whose
//! threshold is at or below the level is held, every mapped role above it is
//! not. Lower tiers stay alongside higher ones. Roles outside the guild's map
//! are never touched.

use crate::store::bounded;
use async_trait::async_trait;
use levelup_core::{GuildId, LevelRoleMap, Result, RoleId, UserId};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A guild's role catalog as seen from one member.
#[async_trait]
pub trait RoleGateway: Send + Sync {
    async fn member_roles(&self, guild: &GuildId, user: &UserId) -> Result<HashSet<RoleId>>;
    async fn add_role(&self, guild: &GuildId, user: &UserId, role: &RoleId) -> Result<()>;
    async fn remove_role(&self, guild: &GuildId, user: &UserId, role: &RoleId) -> Result<()>;
}

/// What a reconcile pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub added: Vec<RoleId>,
    pub removed: Vec<RoleId>,
    /// Roles whose add/remove call failed. The pass carried on past them.
    pub failed: Vec<RoleId>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.failed.is_empty()
    }
}

pub struct RoleReconciler {
    gateway: Arc<dyn RoleGateway>,
    maps: HashMap<GuildId, LevelRoleMap>,
    timeout: Duration,
}

impl RoleReconciler {
    pub fn new(
        gateway: Arc<dyn RoleGateway>,
        maps: HashMap<GuildId, LevelRoleMap>,
        timeout: Duration,
    ) -> Self {
        Self { gateway, maps, timeout }
    }

    pub fn role_map(&self, guild: &GuildId) -> Option<&LevelRoleMap> {
        self.maps.get(guild)
    }

    /// Sync `user`'s mapped roles in `guild` to `level`.
    ///
    /// Fails only when the member's current roles cannot be read in time;
    /// individual add/remove failures and timeouts are logged and listed in
    /// the report.
    pub async fn reconcile(
        &self,
        guild: &GuildId,
        user: &UserId,
        level: u32,
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();
        let Some(map) = self.maps.get(guild).filter(|m| !m.is_empty()) else {
            return Ok(report);
        };

        let held =
            bounded("roles.member_roles", self.timeout, self.gateway.member_roles(guild, user))
                .await?;
        let wanted: BTreeSet<&RoleId> = map.earned(level).collect();
        let managed: BTreeSet<&RoleId> = map.iter().map(|(_, role)| role).collect();

        for role in wanted.iter().filter(|r| !held.contains(**r)) {
            let call = self.gateway.add_role(guild, user, role);
            match bounded("roles.add", self.timeout, call).await {
                Ok(()) => {
                    debug!("Added role {} to {} in {}", role, user, guild);
                    report.added.push((*role).clone());
                }
                Err(e) => {
                    warn!("Failed to add role {} to {} in {}: {}", role, user, guild, e);
                    report.failed.push((*role).clone());
                }
            }
        }

        for role in managed.difference(&wanted).filter(|r| held.contains(**r)) {
            let call = self.gateway.remove_role(guild, user, role);
            match bounded("roles.remove", self.timeout, call).await {
                Ok(()) => {
                    debug!("Removed role {} from {} in {}", role, user, guild);
                    report.removed.push((*role).clone());
                }
                Err(e) => {
                    warn!("Failed to remove role {} from {} in {}: {}", role, user, guild, e);
                    report.failed.push((*role).clone());
                }
            }
        }

        Ok(report)
    }
}
