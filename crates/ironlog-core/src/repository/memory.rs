//! In-memory repositories for tests and embedding.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ExerciseCatalog, SessionRepository, WorkoutRepository};
use crate::error::RepositoryError;
use crate::session::WorkoutSession;
use crate::workout::{Exercise, WorkoutTemplate};

/// Keeps sessions, templates and catalog entries in process memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    sessions: RwLock<HashMap<Uuid, WorkoutSession>>,
    workouts: RwLock<HashMap<Uuid, WorkoutTemplate>>,
    exercises: RwLock<HashMap<Uuid, Exercise>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with already-finished sessions.
    pub fn with_sessions(sessions: impl IntoIterator<Item = WorkoutSession>) -> Self {
        let map = sessions.into_iter().map(|s| (s.id, s)).collect();
        Self {
            sessions: RwLock::new(map),
            ..Self::default()
        }
    }
}

#[async_trait]
impl SessionRepository for InMemoryStore {
    async fn save(&self, session: &WorkoutSession) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(RepositoryError::SaveFailed(format!(
                "session {} already exists",
                session.id
            )));
        }
        sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn update(&self, session: &WorkoutSession) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&session.id) {
            Some(stored) => {
                *stored = session.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(session.id)),
        }
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<WorkoutSession>, RepositoryError> {
        Ok(self.sessions.read().await.get(&id).cloned())
    }

    async fn fetch_all(&self) -> Result<Vec<WorkoutSession>, RepositoryError> {
        let mut all: Vec<WorkoutSession> = self.sessions.read().await.values().cloned().collect();
        all.sort_by_key(|s| s.start_date);
        Ok(all)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.sessions
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound(id))
    }
}

#[async_trait]
impl WorkoutRepository for InMemoryStore {
    async fn save(&self, workout: &WorkoutTemplate) -> Result<(), RepositoryError> {
        self.workouts.write().await.insert(workout.id, workout.clone());
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<WorkoutTemplate>, RepositoryError> {
        Ok(self.workouts.read().await.get(&id).cloned())
    }

    async fn fetch_all(&self) -> Result<Vec<WorkoutTemplate>, RepositoryError> {
        let mut all: Vec<WorkoutTemplate> = self.workouts.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.workouts
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(RepositoryError::NotFound(id))
    }
}

#[async_trait]
impl ExerciseCatalog for InMemoryStore {
    async fn save(&self, exercise: &Exercise) -> Result<(), RepositoryError> {
        self.exercises.write().await.insert(exercise.id, exercise.clone());
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Exercise>, RepositoryError> {
        Ok(self.exercises.read().await.get(&id).cloned())
    }

    async fn fetch_all(&self) -> Result<Vec<Exercise>, RepositoryError> {
        let mut all: Vec<Exercise> = self.exercises.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn save_then_fetch_returns_equal_record() {
        let store = InMemoryStore::new();
        let session = WorkoutSession::new(Some(Uuid::new_v4()), "Legs", Utc::now());
        SessionRepository::save(&store, &session).await.unwrap();

        let fetched = SessionRepository::fetch(&store, session.id).await.unwrap();
        assert_eq!(fetched, Some(session));
    }

    #[tokio::test]
    async fn duplicate_save_fails() {
        let store = InMemoryStore::new();
        let session = WorkoutSession::new(None, "Legs", Utc::now());
        SessionRepository::save(&store, &session).await.unwrap();
        let err = SessionRepository::save(&store, &session).await.unwrap_err();
        assert!(matches!(err, RepositoryError::SaveFailed(_)));
    }

    #[tokio::test]
    async fn update_and_delete_unknown_are_not_found() {
        let store = InMemoryStore::new();
        let session = WorkoutSession::new(None, "Legs", Utc::now());
        assert_eq!(
            store.update(&session).await.unwrap_err(),
            RepositoryError::NotFound(session.id)
        );
        assert_eq!(
            SessionRepository::delete(&store, session.id).await.unwrap_err(),
            RepositoryError::NotFound(session.id)
        );
    }
}
