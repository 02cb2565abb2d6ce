//! Voice presence tracking
//!
//! Owns the table of open voice sessions (one per user) and the two sweeps
//! run over it: the duration flush, which credits elapsed time to the
//! activity ledger and restarts the segment, and the XP tick, which grants
//! voice XP to members present long enough since their last voice grant.
//!
//! Both sweeps work from a snapshot of the table and never hold a map guard
//! across an await.

use crate::activity::ActivityLedger;
use crate::clock::Clock;
use crate::grant::XpGrantService;
use crate::store::bounded;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use levelup_core::config::VoiceConfig;
use levelup_core::{GuildId, UserId, VoiceSession};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct VoiceSettings {
    /// Presence needed between two voice grants.
    pub xp_interval: ChronoDuration,
    pub xp_per_tick: u64,
    /// Sessions connected longer than this are treated as orphaned.
    pub max_session: ChronoDuration,
    /// Sessions handled before a sweep yields.
    pub chunk: usize,
}

impl VoiceSettings {
    pub fn from_config(config: &VoiceConfig) -> Self {
        Self {
            xp_interval: config.xp_interval(),
            xp_per_tick: config.xp_per_tick,
            max_session: config.max_session(),
            chunk: config.sweep_chunk.max(1),
        }
    }
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self::from_config(&VoiceConfig::default())
    }
}

#[derive(Debug, Clone)]
struct OpenSession {
    session: VoiceSession,
    /// Original join time. Unlike `joined_at` this is never reset by a flush.
    connected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    pub sessions: usize,
    pub seconds: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub granted: usize,
    pub failed: usize,
    pub evicted: usize,
    pub level_ups: usize,
}

pub struct VoiceTracker {
    sessions: DashMap<UserId, OpenSession>,
    grants: Arc<XpGrantService>,
    activity: Arc<dyn ActivityLedger>,
    clock: Arc<dyn Clock>,
    settings: VoiceSettings,
    timeout: Duration,
}

impl VoiceTracker {
    pub fn new(
        grants: Arc<XpGrantService>,
        activity: Arc<dyn ActivityLedger>,
        clock: Arc<dyn Clock>,
        settings: VoiceSettings,
        timeout: Duration,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            grants,
            activity,
            clock,
            settings,
            timeout,
        }
    }

    /// Open a session. Any leftover session for the user is replaced without
    /// crediting its time, and returned.
    pub fn on_join(&self, user: &UserId, guild: &GuildId) -> Option<VoiceSession> {
        let now = self.clock.now();
        let open = OpenSession {
            session: VoiceSession {
                user: user.clone(),
                guild: guild.clone(),
                joined_at: now,
                last_xp_at: now,
            },
            connected_at: now,
        };
        let stale = self.sessions.insert(user.clone(), open).map(|o| o.session);
        if let Some(ref old) = stale {
            warn!(
                "Replaced stale voice session for {} (guild {}, since {})",
                user, old.guild, old.joined_at
            );
        } else {
            debug!("Voice session opened for {} in {}", user, guild);
        }
        stale
    }

    /// Close the user's session and credit its unflushed time. Returns the
    /// seconds credited, or `None` if no session was open.
    pub async fn on_leave(&self, user: &UserId) -> Option<u64> {
        let (_, open) = self.sessions.remove(user)?;
        let seconds = elapsed_secs(open.session.joined_at, self.clock.now());
        self.credit(&open.session.user, &open.session.guild, seconds).await;
        debug!("Voice session closed for {} ({}s)", user, seconds);
        Some(seconds)
    }

    pub fn sessions(&self) -> Vec<VoiceSession> {
        self.sessions.iter().map(|e| e.value().session.clone()).collect()
    }

    pub fn session(&self, user: &UserId) -> Option<VoiceSession> {
        self.sessions.get(user).map(|e| e.value().session.clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn snapshot(&self) -> Vec<OpenSession> {
        self.sessions.iter().map(|e| e.value().clone()).collect()
    }

    /// Credit time accumulated since each session's last flush and restart
    /// its segment at now.
    pub async fn flush_durations(&self) -> FlushReport {
        let mut report = FlushReport::default();
        let snapshot = self.snapshot();
        for chunk in snapshot.chunks(self.settings.chunk) {
            for open in chunk {
                let now = self.clock.now();
                let seconds = elapsed_secs(open.session.joined_at, now);
                if seconds == 0 {
                    continue;
                }
                // Skip sessions that left or re-joined since the snapshot.
                let reset = match self.sessions.get_mut(&open.session.user) {
                    Some(mut live) if live.session.joined_at == open.session.joined_at => {
                        live.session.joined_at = now;
                        true
                    }
                    _ => false,
                };
                if reset {
                    self.credit(&open.session.user, &open.session.guild, seconds).await;
                    report.sessions += 1;
                    report.seconds += seconds;
                }
            }
            tokio::task::yield_now().await;
        }
        if report.sessions > 0 {
            debug!("Flushed {}s across {} voice sessions", report.seconds, report.sessions);
        }
        report
    }

    /// Grant voice XP to sessions due for it and evict orphaned ones.
    pub async fn xp_tick(&self) -> TickReport {
        let mut report = TickReport::default();
        let snapshot = self.snapshot();
        for chunk in snapshot.chunks(self.settings.chunk) {
            for open in chunk {
                let now = self.clock.now();
                let user = &open.session.user;

                if now - open.connected_at > self.settings.max_session {
                    let evicted = self
                        .sessions
                        .remove_if(user, |_, live| live.connected_at == open.connected_at)
                        .is_some();
                    if evicted {
                        warn!(
                            "Evicted voice session for {} in {} connected since {}",
                            user, open.session.guild, open.connected_at
                        );
                        report.evicted += 1;
                    }
                    continue;
                }

                if now - open.session.last_xp_at < self.settings.xp_interval {
                    continue;
                }

                // Claim the tick before granting so a slow grant cannot fire twice.
                let claimed = match self.sessions.get_mut(user) {
                    Some(mut live) if live.connected_at == open.connected_at => {
                        live.session.last_xp_at = now;
                        true
                    }
                    _ => false,
                };
                if !claimed {
                    continue;
                }

                match self
                    .grants
                    .grant(user, &open.session.guild, self.settings.xp_per_tick)
                    .await
                {
                    Ok(outcome) => {
                        report.granted += 1;
                        if outcome.level_up {
                            report.level_ups += 1;
                        }
                    }
                    Err(e) => {
                        report.failed += 1;
                        warn!("Voice grant for {} in {} failed: {}", user, open.session.guild, e);
                    }
                }
            }
            tokio::task::yield_now().await;
        }
        report
    }

    /// Close every open session, crediting its time. Used on shutdown.
    pub async fn shutdown_flush(&self) -> FlushReport {
        let mut report = FlushReport::default();
        let users: Vec<UserId> = self.sessions.iter().map(|e| e.key().clone()).collect();
        for user in users {
            if let Some(seconds) = self.on_leave(&user).await {
                report.sessions += 1;
                report.seconds += seconds;
            }
        }
        if report.sessions > 0 {
            info!("Closed {} voice sessions on shutdown ({}s)", report.sessions, report.seconds);
        }
        report
    }

    async fn credit(&self, user: &UserId, guild: &GuildId, seconds: u64) {
        if seconds == 0 {
            return;
        }
        let call = self.activity.add_voice_seconds(user, guild, seconds);
        if let Err(e) = bounded("activity.voice", self.timeout, call).await {
            warn!("Voice time for {} in {} not recorded ({}s): {}", user, guild, seconds, e);
        }
    }
}

fn elapsed_secs(from: DateTime<Utc>, to: DateTime<Utc>) -> u64 {
    (to - from).num_seconds().max(0) as u64
}
