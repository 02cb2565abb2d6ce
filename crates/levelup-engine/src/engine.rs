//! Engine wiring
//!
//! Builds the boost registry, grant service, voice tracker and message gate
//! from a config and a set of collaborators, and starts their sweepers.

use crate::activity::ActivityLedger;
use crate::boost::BoostRegistry;
use crate::clock::Clock;
use crate::grant::XpGrantService;
use crate::messages::MessageGate;
use crate::notify::Notifier;
use crate::rewards::{CurrencyLedger, RewardDispatcher};
use crate::roles::{RoleGateway, RoleReconciler};
use crate::scheduler::{Scheduler, SchedulerHandle, SweepIntervals};
use crate::store::{BoostStore, ProgressStore};
use crate::voice::{VoiceSettings, VoiceTracker};
use levelup_core::LevelingConfig;
use std::sync::Arc;

/// Everything the engine needs from the outside world.
#[derive(Clone)]
pub struct Collaborators {
    pub progress: Arc<dyn ProgressStore>,
    pub boosts: Arc<dyn BoostStore>,
    pub roles: Arc<dyn RoleGateway>,
    pub ledger: Arc<dyn CurrencyLedger>,
    pub activity: Arc<dyn ActivityLedger>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

pub struct LevelingEngine {
    pub boosts: Arc<BoostRegistry>,
    pub grants: Arc<XpGrantService>,
    pub voice: Arc<VoiceTracker>,
    pub messages: Arc<MessageGate>,
    intervals: SweepIntervals,
}

impl LevelingEngine {
    pub fn new(config: &LevelingConfig, collaborators: Collaborators) -> Self {
        let timeout = config.storage_timeout();
        let clock = collaborators.clock;

        let boosts = Arc::new(BoostRegistry::new(
            collaborators.boosts,
            clock.clone(),
            config.boost.max_multiplier,
            timeout,
        ));
        let rewards =
            RewardDispatcher::new(collaborators.ledger, config.rewards.coins_per_level, timeout);
        let roles = RoleReconciler::new(collaborators.roles, config.level_role_maps(), timeout);
        let grants = Arc::new(
            XpGrantService::new(
                collaborators.progress,
                boosts.clone(),
                rewards,
                roles,
                collaborators.notifier,
                timeout,
            )
            .with_announce_channel(config.notify.announce_channel.clone()),
        );
        let voice = Arc::new(VoiceTracker::new(
            grants.clone(),
            collaborators.activity.clone(),
            clock.clone(),
            VoiceSettings::from_config(&config.voice),
            timeout,
        ));
        let messages = Arc::new(MessageGate::new(
            grants.clone(),
            collaborators.activity,
            clock,
            config.message_cooldown(),
            timeout,
        ));

        Self {
            boosts,
            grants,
            voice,
            messages,
            intervals: SweepIntervals::from_config(config),
        }
    }

    /// Override sweep periods (tests run them in milliseconds).
    pub fn with_intervals(mut self, intervals: SweepIntervals) -> Self {
        self.intervals = intervals;
        self
    }

    pub fn intervals(&self) -> &SweepIntervals {
        &self.intervals
    }

    /// Start the periodic sweepers. Stop them with [`SchedulerHandle::shutdown`].
    pub fn start(&self) -> SchedulerHandle {
        Scheduler::start(
            self.voice.clone(),
            self.messages.clone(),
            self.boosts.clone(),
            self.intervals.clone(),
        )
    }
}
