//! Platform health-data bridge.
//!
//! The bridge mirrors a workout session into the platform's health store.
//! It is advisory: the session manager reports its failures but never lets
//! them undo a local transition.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::HealthError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    TraditionalStrengthTraining,
    FunctionalStrengthTraining,
    HighIntensityIntervalTraining,
}

/// Opaque handle for a running health workout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HealthSessionHandle(pub String);

impl HealthSessionHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Figures reported to the platform when a workout ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthWorkoutSummary {
    pub end_date: DateTime<Utc>,
    pub active_energy_kcal: f64,
    pub distance_meters: Option<f64>,
    pub metadata: BTreeMap<String, String>,
}

/// What the platform recorded once the workout was saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub active_energy_kcal: Option<f64>,
    pub metadata: BTreeMap<String, String>,
}

#[async_trait]
pub trait HealthBridge: Send + Sync {
    async fn start_session(
        &self,
        activity: ActivityType,
        start_date: DateTime<Utc>,
    ) -> Result<HealthSessionHandle, HealthError>;

    async fn pause_session(&self, handle: &HealthSessionHandle) -> Result<(), HealthError>;

    async fn resume_session(&self, handle: &HealthSessionHandle) -> Result<(), HealthError>;

    async fn end_session(
        &self,
        handle: &HealthSessionHandle,
        summary: &HealthWorkoutSummary,
    ) -> Result<HealthRecord, HealthError>;

    /// Discard a workout without saving it.
    async fn abort_session(&self, handle: &HealthSessionHandle) -> Result<(), HealthError>;
}

/// Inputs for the active-energy estimate sent with a finished workout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyModel {
    pub body_mass_kg: f64,
    /// Metabolic equivalent of the activity.
    pub met: f64,
}

impl Default for EnergyModel {
    fn default() -> Self {
        Self {
            body_mass_kg: 75.0,
            met: 5.0,
        }
    }
}

impl EnergyModel {
    /// kcal = MET × body mass (kg) × hours.
    pub fn estimate_kcal(&self, duration: chrono::Duration) -> f64 {
        let hours = duration.num_seconds().max(0) as f64 / 3600.0;
        self.met * self.body_mass_kg * hours
    }
}
