//! Persistence boundaries consumed by the core.
//!
//! Every call is asynchronous and may take arbitrary wall-clock time. A
//! write is only considered done once the returned future resolves `Ok`.

mod memory;

pub use memory::InMemoryStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::session::WorkoutSession;
use crate::workout::{Exercise, WorkoutTemplate};

/// Stores workout sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert a new session.
    ///
    /// # Errors
    /// `SaveFailed` if a session with the same id already exists or the
    /// write fails.
    async fn save(&self, session: &WorkoutSession) -> Result<(), RepositoryError>;

    /// Replace a stored session.
    ///
    /// # Errors
    /// `NotFound` if the id is unknown, `UpdateFailed` on write failure.
    async fn update(&self, session: &WorkoutSession) -> Result<(), RepositoryError>;

    async fn fetch(&self, id: Uuid) -> Result<Option<WorkoutSession>, RepositoryError>;

    /// All stored sessions, oldest start first.
    async fn fetch_all(&self) -> Result<Vec<WorkoutSession>, RepositoryError>;

    /// # Errors
    /// `NotFound` if the id is unknown, `DeleteFailed` on write failure.
    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;
}

/// Stores workout templates.
#[async_trait]
pub trait WorkoutRepository: Send + Sync {
    /// Insert or replace a template.
    async fn save(&self, workout: &WorkoutTemplate) -> Result<(), RepositoryError>;

    async fn fetch(&self, id: Uuid) -> Result<Option<WorkoutTemplate>, RepositoryError>;

    /// All templates, sorted by name.
    async fn fetch_all(&self) -> Result<Vec<WorkoutTemplate>, RepositoryError>;

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError>;
}

/// Exercise catalog lookups.
#[async_trait]
pub trait ExerciseCatalog: Send + Sync {
    /// Insert or replace a catalog entry.
    async fn save(&self, exercise: &Exercise) -> Result<(), RepositoryError>;

    async fn fetch(&self, id: Uuid) -> Result<Option<Exercise>, RepositoryError>;

    /// All entries, sorted by name.
    async fn fetch_all(&self) -> Result<Vec<Exercise>, RepositoryError>;
}
