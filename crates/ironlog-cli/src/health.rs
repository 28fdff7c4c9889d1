//! Health store kept in the local database.
//!
//! Stands in for a platform health service: workouts mirrored from a
//! session are written to the key-value table so the energy estimate and
//! metadata survive between invocations.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ironlog_core::health::{HealthRecord, HealthWorkoutSummary};
use ironlog_core::{ActivityType, HealthBridge, HealthError, HealthSessionHandle, SqliteStore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const KEY_PREFIX: &str = "health_workout:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum EntryState {
    Running,
    Paused,
    Saved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HealthWorkoutEntry {
    activity: ActivityType,
    start_date: DateTime<Utc>,
    state: EntryState,
    #[serde(default)]
    summary: Option<HealthWorkoutSummary>,
}

pub struct LocalHealthStore {
    store: Arc<SqliteStore>,
}

impl LocalHealthStore {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }

    fn key(handle: &HealthSessionHandle) -> String {
        format!("{KEY_PREFIX}{}", handle.as_str())
    }

    fn load(&self, handle: &HealthSessionHandle) -> Result<HealthWorkoutEntry, HealthError> {
        let json = self
            .store
            .kv_get(&Self::key(handle))
            .map_err(|e| HealthError::Failed(e.to_string()))?
            .ok_or_else(|| HealthError::SessionNotFound(handle.as_str().to_string()))?;
        serde_json::from_str(&json).map_err(|e| HealthError::Failed(e.to_string()))
    }

    fn store_entry(
        &self,
        handle: &HealthSessionHandle,
        entry: &HealthWorkoutEntry,
    ) -> Result<(), HealthError> {
        let json = serde_json::to_string(entry).map_err(|e| HealthError::Failed(e.to_string()))?;
        self.store
            .kv_set(&Self::key(handle), &json)
            .map_err(|e| HealthError::Failed(e.to_string()))
    }

    fn transition(
        &self,
        handle: &HealthSessionHandle,
        from: EntryState,
        to: EntryState,
    ) -> Result<(), HealthError> {
        let mut entry = self.load(handle)?;
        if entry.state != from {
            return Err(HealthError::Failed(format!(
                "health workout is {:?}, expected {:?}",
                entry.state, from
            )));
        }
        entry.state = to;
        self.store_entry(handle, &entry)
    }
}

#[async_trait]
impl HealthBridge for LocalHealthStore {
    async fn start_session(
        &self,
        activity: ActivityType,
        start_date: DateTime<Utc>,
    ) -> Result<HealthSessionHandle, HealthError> {
        let handle = HealthSessionHandle(Uuid::new_v4().to_string());
        let entry = HealthWorkoutEntry {
            activity,
            start_date,
            state: EntryState::Running,
            summary: None,
        };
        self.store_entry(&handle, &entry)?;
        tracing::debug!(handle = handle.as_str(), "health workout started");
        Ok(handle)
    }

    async fn pause_session(&self, handle: &HealthSessionHandle) -> Result<(), HealthError> {
        self.transition(handle, EntryState::Running, EntryState::Paused)
    }

    async fn resume_session(&self, handle: &HealthSessionHandle) -> Result<(), HealthError> {
        self.transition(handle, EntryState::Paused, EntryState::Running)
    }

    async fn end_session(
        &self,
        handle: &HealthSessionHandle,
        summary: &HealthWorkoutSummary,
    ) -> Result<HealthRecord, HealthError> {
        let mut entry = self.load(handle)?;
        if entry.state == EntryState::Saved {
            return Err(HealthError::Failed("health workout already saved".into()));
        }
        entry.state = EntryState::Saved;
        entry.summary = Some(summary.clone());
        self.store_entry(handle, &entry)?;
        Ok(HealthRecord {
            active_energy_kcal: Some(summary.active_energy_kcal),
            metadata: summary.metadata.clone(),
        })
    }

    async fn abort_session(&self, handle: &HealthSessionHandle) -> Result<(), HealthError> {
        self.load(handle)?;
        self.store
            .kv_delete(&Self::key(handle))
            .map_err(|e| HealthError::Failed(e.to_string()))
    }
}
