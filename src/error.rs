//! Error taxonomy for the cockpit core.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CockpitError {
    /// Malformed event or command input. Nothing was mutated.
    #[error("validation error: {0}")]
    Validation(String),

    /// A staff, proposal, todo, incident or store id is absent from current state.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid transition for {subject}: {from} -> {to}")]
    InvalidTransition {
        subject: String,
        from: String,
        to: String,
    },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),
}

impl CockpitError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }
}

pub type Result<T> = std::result::Result<T, CockpitError>;
