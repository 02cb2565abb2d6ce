//! Levelup Core - Types, the level curve, configuration and error handling

pub mod config;
pub mod curve;
pub mod error;
pub mod types;

pub use config::LevelingConfig;
pub use curve::{level_for_xp, required, xp_step, MAX_LEVEL_STEPS};
pub use error::{Error, ErrorClass, Result};
pub use types::*;
