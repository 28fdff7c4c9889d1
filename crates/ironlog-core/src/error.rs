//! Core error types for ironlog-core.
//!
//! Lifecycle operations fail with [`SessionError`]. Repository and health
//! bridge boundaries have their own error kinds which are wrapped into
//! `SessionError` when they surface from a lifecycle call.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::session::SessionState;

/// Core error type for ironlog-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Session lifecycle errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Repository errors raised outside a lifecycle operation
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Opening or migrating the SQLite store
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure of a session lifecycle operation.
///
/// Validation variants are raised before any mutation. `PersistenceFailure`
/// is raised after the in-memory session was already changed.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("cannot {operation} while {}", describe_state(.current))]
    InvalidStateTransition {
        operation: &'static str,
        current: Option<SessionState>,
    },

    #[error("a workout session is already in progress")]
    SessionAlreadyActive,

    #[error("exercise {0} not found in session")]
    ExerciseNotFound(Uuid),

    #[error("set {0} not found")]
    SetNotFound(Uuid),

    #[error("workout {0} not found")]
    WorkoutNotFound(Uuid),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to persist session: {0}")]
    PersistenceFailure(#[from] RepositoryError),

    /// Never returned by the manager itself, which reports bridge
    /// failures through `HealthSync::Failed`. Produced by
    /// `HealthSync::into_result` for callers that escalate them.
    #[error("health sync failed: {0}")]
    HealthBridgeFailure(#[from] HealthError),
}

fn describe_state(state: &Option<SessionState>) -> String {
    match state {
        Some(state) => format!("session is {state}"),
        None => "no session is in progress".to_string(),
    }
}

/// Errors reported by a session, workout or exercise repository.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("record {0} not found")]
    NotFound(Uuid),

    #[error("save failed: {0}")]
    SaveFailed(String),

    #[error("update failed: {0}")]
    UpdateFailed(String),

    #[error("fetch failed: {0}")]
    FetchFailed(String),

    #[error("delete failed: {0}")]
    DeleteFailed(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Errors reported by the platform health bridge.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HealthError {
    #[error("health data is not available on this device")]
    Unavailable,

    #[error("health data access was not authorized")]
    NotAuthorized,

    #[error("no health session for handle {0}")]
    SessionNotFound(String),

    #[error("{0}")]
    Failed(String),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dot-path key
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Data directory could not be resolved or created
    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
