//! Error types for Levelup

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("persistence timeout: {op} after {after_ms}ms")]
    Timeout { op: &'static str, after_ms: u64 },

    #[error("conflicting update for {user} in {guild}")]
    Conflict { user: String, guild: String },

    #[error("role error: {role} - {message}")]
    Role { role: String, message: String },

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse grouping used when deciding how loudly to log a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad input; nothing was attempted.
    Validation,
    /// Store unreachable, slow or contended; the grant was aborted.
    Persistence,
    /// A role or currency effect failed after the level was committed.
    SideEffect,
    Ambient,
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence(message.into())
    }

    pub fn role(role: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            message: message.into(),
        }
    }

    pub fn ledger(message: impl Into<String>) -> Self {
        Self::Ledger(message.into())
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) => ErrorClass::Validation,
            Self::Persistence(_) | Self::Timeout { .. } | Self::Conflict { .. } => {
                ErrorClass::Persistence
            }
            Self::Role { .. } | Self::Ledger(_) => ErrorClass::SideEffect,
            Self::Config(_) | Self::Io(_) | Self::Toml(_) | Self::Json(_) => ErrorClass::Ambient,
        }
    }
}
