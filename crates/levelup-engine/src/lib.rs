//! Levelup Engine - XP grants, boosts, level roles, rewards and activity sweepers

pub mod activity;
pub mod boost;
pub mod clock;
pub mod engine;
pub mod grant;
pub mod memory;
pub mod messages;
pub mod notify;
pub mod rewards;
pub mod roles;
pub mod scheduler;
pub mod store;
pub mod voice;

pub use activity::ActivityLedger;
pub use boost::BoostRegistry;
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{Collaborators, LevelingEngine};
pub use grant::XpGrantService;
pub use memory::InMemoryBackend;
pub use messages::MessageGate;
pub use notify::{Notifier, TracingNotifier};
pub use rewards::{CurrencyLedger, RewardDispatcher};
pub use roles::{ReconcileReport, RoleGateway, RoleReconciler};
pub use scheduler::{Scheduler, SchedulerHandle, SweepIntervals};
pub use store::{BoostStore, ProgressStore};
pub use voice::{FlushReport, TickReport, VoiceSettings, VoiceTracker};
