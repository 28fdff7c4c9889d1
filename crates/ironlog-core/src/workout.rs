//! Workout templates and exercise catalog entries.
//!
//! A template is the plan a session is started from; the catalog supplies
//! default targets when an exercise is added to a running session.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionError;
use crate::session::{SessionExercise, SessionSet};

/// Exercise catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exercise {
    pub id: Uuid,
    pub name: String,
    #[serde(default = "default_target_sets")]
    pub default_sets: u32,
    #[serde(default = "default_target_reps")]
    pub default_reps: u32,
    #[serde(default)]
    pub default_weight: f64,
    #[serde(default)]
    pub default_rest_secs: Option<u32>,
}

fn default_target_sets() -> u32 {
    3
}
fn default_target_reps() -> u32 {
    10
}

impl Exercise {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            default_sets: default_target_sets(),
            default_reps: default_target_reps(),
            default_weight: 0.0,
            default_rest_secs: None,
        }
    }

    pub fn with_targets(mut self, sets: u32, reps: u32, weight: f64) -> Self {
        self.default_sets = sets;
        self.default_reps = reps;
        self.default_weight = weight;
        self
    }
}

/// One planned exercise inside a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateExercise {
    pub exercise_id: Uuid,
    pub exercise_name: String,
    pub target_sets: u32,
    pub target_reps: u32,
    #[serde(default)]
    pub target_weight: f64,
    #[serde(default)]
    pub rest_time_secs: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl TemplateExercise {
    pub fn new(
        exercise_id: Uuid,
        exercise_name: impl Into<String>,
        target_sets: u32,
        target_reps: u32,
        target_weight: f64,
    ) -> Self {
        Self {
            exercise_id,
            exercise_name: exercise_name.into(),
            target_sets,
            target_reps,
            target_weight,
            rest_time_secs: None,
            notes: None,
        }
    }

    /// Catalog defaults become the plan.
    pub fn from_exercise(exercise: &Exercise) -> Self {
        Self {
            rest_time_secs: exercise.default_rest_secs,
            ..Self::new(
                exercise.id,
                exercise.name.clone(),
                exercise.default_sets,
                exercise.default_reps,
                exercise.default_weight,
            )
        }
    }

    /// Builds the session exercise with one open set per target set.
    pub fn to_session_exercise(&self, order_index: u32) -> SessionExercise {
        let mut exercise = SessionExercise::new(self.exercise_id, &self.exercise_name, order_index);
        exercise.notes = self.notes.clone();
        exercise.rest_time_to_next_secs = self.rest_time_secs;
        exercise.sets = (0..self.target_sets)
            .map(|i| {
                let mut set = SessionSet::new(i, self.target_weight, self.target_reps);
                set.rest_time_secs = self.rest_time_secs;
                set
            })
            .collect();
        exercise
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutTemplate {
    pub id: Uuid,
    pub name: String,
    pub exercises: Vec<TemplateExercise>,
}

impl WorkoutTemplate {
    /// # Errors
    /// Returns `InvalidInput` if the name is blank.
    pub fn new(
        name: impl Into<String>,
        exercises: Vec<TemplateExercise>,
    ) -> Result<Self, SessionError> {
        let template = Self {
            id: Uuid::new_v4(),
            name: name.into(),
            exercises,
        };
        template.validate()?;
        Ok(template)
    }

    /// # Errors
    /// Returns `InvalidInput` if the name is blank or a target weight is
    /// negative.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.name.trim().is_empty() {
            return Err(SessionError::InvalidInput("workout name is empty".into()));
        }
        if let Some(bad) = self
            .exercises
            .iter()
            .find(|e| !e.target_weight.is_finite() || e.target_weight < 0.0)
        {
            return Err(SessionError::InvalidInput(format!(
                "target weight for '{}' must be non-negative",
                bad.exercise_name
            )));
        }
        Ok(())
    }
}
