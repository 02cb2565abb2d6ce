//! Periodic sweepers
//!
//! Each sweeper is its own task driving an interval loop until the shared
//! cancellation token fires. A sweeper runs its ticks one after another, so
//! two ticks of the same sweeper never overlap; a tick that overruns its
//! period skips the missed ticks instead of bunching them up.

use crate::boost::BoostRegistry;
use crate::messages::MessageGate;
use crate::voice::VoiceTracker;
use levelup_core::LevelingConfig;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct SweepIntervals {
    pub voice_xp: Duration,
    pub voice_flush: Duration,
    pub boost_expiry: Duration,
    pub cooldown_prune: Duration,
}

impl SweepIntervals {
    pub fn from_config(config: &LevelingConfig) -> Self {
        Self {
            voice_xp: Duration::from_secs(config.voice.sweep_secs),
            voice_flush: Duration::from_secs(config.voice.flush_secs),
            boost_expiry: Duration::from_secs(config.boost.sweep_secs),
            cooldown_prune: Duration::from_secs(config.message.cooldown_prune_secs),
        }
    }
}

impl Default for SweepIntervals {
    fn default() -> Self {
        Self::from_config(&LevelingConfig::default())
    }
}

/// Running sweepers. Dropping the handle does not stop them; call
/// [`SchedulerHandle::shutdown`].
pub struct SchedulerHandle {
    cancel: CancellationToken,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl SchedulerHandle {
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|(name, _)| *name).collect()
    }

    pub fn is_running(&self) -> bool {
        self.tasks.iter().any(|(_, task)| !task.is_finished())
    }

    /// Cancel every sweeper and wait for the in-flight ticks to finish.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for (name, task) in self.tasks {
            if let Err(e) = task.await {
                warn!("Sweeper {} ended abnormally: {}", name, e);
            }
        }
        info!("Sweepers stopped");
    }
}

pub struct Scheduler;

impl Scheduler {
    pub fn start(
        voice: Arc<VoiceTracker>,
        messages: Arc<MessageGate>,
        boosts: Arc<BoostRegistry>,
        intervals: SweepIntervals,
    ) -> SchedulerHandle {
        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();

        let tracker = voice.clone();
        tasks.push((
            "voice-xp",
            spawn_periodic("voice-xp", intervals.voice_xp, cancel.clone(), move || {
                let tracker = tracker.clone();
                async move {
                    let report = tracker.xp_tick().await;
                    if report.granted + report.failed + report.evicted > 0 {
                        debug!(
                            "Voice tick: {} granted, {} failed, {} evicted",
                            report.granted, report.failed, report.evicted
                        );
                    }
                }
            }),
        ));

        let tracker = voice;
        tasks.push((
            "voice-flush",
            spawn_periodic("voice-flush", intervals.voice_flush, cancel.clone(), move || {
                let tracker = tracker.clone();
                async move {
                    tracker.flush_durations().await;
                }
            }),
        ));

        tasks.push((
            "boost-expiry",
            spawn_periodic("boost-expiry", intervals.boost_expiry, cancel.clone(), move || {
                let boosts = boosts.clone();
                async move {
                    if let Err(e) = boosts.sweep_expired().await {
                        warn!("Boost sweep failed: {}", e);
                    }
                }
            }),
        ));

        tasks.push((
            "cooldown-prune",
            spawn_periodic("cooldown-prune", intervals.cooldown_prune, cancel.clone(), move || {
                let messages = messages.clone();
                async move {
                    let dropped = messages.prune();
                    if dropped > 0 {
                        debug!("Pruned {} message cooldowns", dropped);
                    }
                }
            }),
        ));

        info!("Started {} sweepers", tasks.len());
        SchedulerHandle { cancel, tasks }
    }
}

/// Run `job` every `period` until `cancel` fires. The first run happens one
/// period after start.
pub fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    cancel: CancellationToken,
    mut job: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let period = period.max(Duration::from_millis(1));
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                // A started tick always runs to completion.
                _ = ticker.tick() => job().await,
            }
        }
        debug!("Sweeper {} stopped", name);
    })
}
