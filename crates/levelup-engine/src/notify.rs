//! Level-up announcements.

use async_trait::async_trait;
use levelup_core::LevelUpNotice;
use tracing::info;

/// Renders a level-up for members to see. Delivery is best-effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn level_up(&self, notice: &LevelUpNotice);
}

/// Writes notices to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn level_up(&self, notice: &LevelUpNotice) {
        info!(
            "{} reached level {} in {} (from {}, +{} coins){}",
            notice.user,
            notice.new_level,
            notice.guild,
            notice.old_level,
            notice.reward,
            notice
                .channel
                .as_deref()
                .map(|c| format!(" → #{}", c))
                .unwrap_or_default()
        );
    }
}
