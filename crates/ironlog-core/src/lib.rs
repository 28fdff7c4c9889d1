//! # ironlog Core Library
//!
//! Core logic for ironlog, a strength-training log. All operations are
//! available through the standalone `ironlog` CLI, which is a thin shell over
//! this crate.
//!
//! ## Architecture
//!
//! - **Session lifecycle**: a single-writer manager that owns the one
//!   in-progress workout session and persists every change through a
//!   repository
//! - **History & statistics**: pure rollups over completed sessions
//!   (filters, month grouping, volume, streaks, per-exercise bests)
//! - **Storage**: repository traits with in-memory and SQLite
//!   implementations, plus TOML configuration
//! - **Health bridge**: advisory mirroring of sessions into a platform
//!   health store
//!
//! ## Key Components
//!
//! - [`SessionManager`]: session state machine
//! - [`HistoryService`]: history queries and statistics
//! - [`RestTimer`]: wall-clock rest countdown
//! - [`SqliteStore`]: persistent repositories
//! - [`Config`]: application configuration

pub mod error;
pub mod events;
pub mod health;
pub mod history;
pub mod repository;
pub mod rest_timer;
pub mod session;
pub mod stats;
pub mod storage;
pub mod warmup;
pub mod workout;

pub use error::{ConfigError, CoreError, HealthError, RepositoryError, SessionError};
pub use events::Event;
pub use health::{ActivityType, EnergyModel, HealthBridge, HealthSessionHandle};
pub use history::{HistoryFilter, HistoryService, MonthGroup};
pub use repository::{ExerciseCatalog, InMemoryStore, SessionRepository, WorkoutRepository};
pub use rest_timer::{RestTimer, RestTimerState};
pub use session::{
    HealthSync, SessionExercise, SessionManager, SessionSet, SessionState, SessionUpdate,
    SetUpdate, WorkoutSession,
};
pub use stats::{ExerciseProgress, StatisticsPeriod, WorkoutStatistics};
pub use storage::{Config, SqliteStore};
pub use warmup::{WarmupScheme, WarmupSet, WarmupStep};
pub use workout::{Exercise, TemplateExercise, WorkoutTemplate};
