//! Engine error taxonomy.
//!
//! Three families matter to callers:
//! - configuration errors fail fast before any stage runs and are never retried;
//! - transient call failures (parse / contract) are absorbed inside
//!   [`crate::call::call_typed`] and only surface as `CallExhausted` once the
//!   attempt budget is spent;
//! - anything else is fatal to the enclosing stage and the run. Work already
//!   checkpointed before the failure stays valid for a later resume.

use thiserror::Error;

use crate::actor::ActorError;

pub type EngineResult<T> = Result<T, EngineError>;

/// A single failed attempt inside the retry-validate wrapper.
#[derive(Debug, Error)]
pub enum CallError {
    /// The actor itself failed (transport retries already exhausted inside it).
    #[error(transparent)]
    Actor(#[from] ActorError),

    /// Response text did not contain parseable JSON.
    #[error("invalid JSON: {0}")]
    Parse(String),

    /// Parsed JSON violated the named contract.
    #[error("contract violation [{contract}]: {message}")]
    Contract {
        contract: &'static str,
        message: String,
    },
}

/// Unified error type for all engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Bad role configuration, duplicate actor names, etc. Never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// A retry-validate call exhausted its attempt budget.
    #[error("{label} failed after {attempts} attempts: {last_error}")]
    CallExhausted {
        label: String,
        attempts: u32,
        last_error: String,
    },

    /// One or more actors failed their preflight probe. Aggregated: every
    /// failing actor is named, passing actors are not mentioned.
    #[error("preflight failed:\n{0}")]
    Preflight(String),

    /// A stage hit an unrecoverable condition (missing artifact, bad
    /// reference between records, reload mismatch).
    #[error("stage failure: {0}")]
    Stage(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A spawned worker task panicked or was aborted.
    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
