//! Workout session entities.
//!
//! A [`WorkoutSession`] is the aggregate root: it owns its exercises, which
//! own their sets. Exercises and sets are kept sorted by `order_index`, and
//! the indices stay contiguous from zero after every edit.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl SessionState {
    /// `Completed` and `Cancelled` never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Cancelled)
    }

    pub fn is_in_progress(self) -> bool {
        matches!(self, SessionState::Active | SessionState::Paused)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Active => "active",
            SessionState::Paused => "paused",
            SessionState::Completed => "completed",
            SessionState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionState::Active),
            "paused" => Ok(SessionState::Paused),
            "completed" => Ok(SessionState::Completed),
            "cancelled" => Ok(SessionState::Cancelled),
            other => Err(format!("unknown session state: {other}")),
        }
    }
}

/// One performed unit of an exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSet {
    pub id: Uuid,
    pub weight: f64,
    pub reps: u32,
    pub completed: bool,
    /// Set once, when `completed` first becomes true.
    pub completed_at: Option<DateTime<Utc>>,
    pub order_index: u32,
    #[serde(default)]
    pub rest_time_secs: Option<u32>,
    #[serde(default)]
    pub is_warmup: bool,
}

impl SessionSet {
    pub fn new(order_index: u32, weight: f64, reps: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            weight,
            reps,
            completed: false,
            completed_at: None,
            order_index,
            rest_time_secs: None,
            is_warmup: false,
        }
    }

    pub fn warmup(order_index: u32, weight: f64, reps: u32) -> Self {
        Self {
            is_warmup: true,
            ..Self::new(order_index, weight, reps)
        }
    }

    /// Marks the set done. A set that is already complete keeps its
    /// original `completed_at`.
    pub fn mark_completed(&mut self, at: DateTime<Utc>) {
        if !self.completed {
            self.completed = true;
            self.completed_at = Some(at);
        }
    }

    pub fn volume(&self) -> f64 {
        self.weight * self.reps as f64
    }

    /// Counts toward volume and statistics.
    pub fn is_counted(&self) -> bool {
        self.completed && !self.is_warmup
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionExercise {
    pub id: Uuid,
    pub exercise_id: Uuid,
    /// Name captured when the exercise joined the session.
    pub exercise_name: String,
    pub sets: Vec<SessionSet>,
    #[serde(default)]
    pub notes: Option<String>,
    pub order_index: u32,
    #[serde(default)]
    pub is_finished: bool,
    #[serde(default)]
    pub rest_time_to_next_secs: Option<u32>,
}

impl SessionExercise {
    pub fn new(exercise_id: Uuid, exercise_name: impl Into<String>, order_index: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            exercise_id,
            exercise_name: exercise_name.into(),
            sets: Vec::new(),
            notes: None,
            order_index,
            is_finished: false,
            rest_time_to_next_secs: None,
        }
    }

    pub fn set(&self, set_id: Uuid) -> Option<&SessionSet> {
        self.sets.iter().find(|s| s.id == set_id)
    }

    pub fn set_mut(&mut self, set_id: Uuid) -> Option<&mut SessionSet> {
        self.sets.iter_mut().find(|s| s.id == set_id)
    }

    /// True once every non-warmup set is complete. An exercise without
    /// working sets never counts as done.
    pub fn working_sets_done(&self) -> bool {
        let mut working = self.sets.iter().filter(|s| !s.is_warmup).peekable();
        working.peek().is_some() && working.all(|s| s.completed)
    }

    pub fn completed_volume(&self) -> f64 {
        self.sets.iter().filter(|s| s.is_counted()).map(SessionSet::volume).sum()
    }

    /// Renumbers sets `0..n` in their current order.
    pub fn reindex_sets(&mut self) {
        for (index, set) in self.sets.iter_mut().enumerate() {
            set.order_index = index as u32;
        }
    }

    pub fn next_set_index(&self) -> u32 {
        self.sets.len() as u32
    }
}

/// Link to the platform health workout recorded alongside a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthLink {
    pub handle: String,
    #[serde(default)]
    pub active_energy_kcal: Option<f64>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSession {
    pub id: Uuid,
    pub workout_id: Option<Uuid>,
    pub workout_name: String,
    pub start_date: DateTime<Utc>,
    /// Present exactly when the state is terminal.
    pub end_date: Option<DateTime<Utc>>,
    pub state: SessionState,
    pub exercises: Vec<SessionExercise>,
    #[serde(default)]
    pub health: Option<HealthLink>,
}

impl WorkoutSession {
    pub fn new(
        workout_id: Option<Uuid>,
        workout_name: impl Into<String>,
        start_date: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            workout_id,
            workout_name: workout_name.into(),
            start_date,
            end_date: None,
            state: SessionState::Active,
            exercises: Vec::new(),
            health: None,
        }
    }

    pub fn exercise(&self, exercise_id: Uuid) -> Option<&SessionExercise> {
        self.exercises.iter().find(|e| e.id == exercise_id)
    }

    pub fn exercise_mut(&mut self, exercise_id: Uuid) -> Option<&mut SessionExercise> {
        self.exercises.iter_mut().find(|e| e.id == exercise_id)
    }

    /// Elapsed time between start and end; `None` while in progress.
    pub fn duration(&self) -> Option<Duration> {
        self.end_date.map(|end| end - self.start_date)
    }

    /// Elapsed time so far, measured against `now` for a live session.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        self.end_date.unwrap_or(now) - self.start_date
    }

    /// Σ weight × reps over completed working sets.
    pub fn total_volume(&self) -> f64 {
        self.exercises.iter().map(SessionExercise::completed_volume).sum()
    }

    /// Completed working sets across all exercises.
    pub fn counted_sets(&self) -> impl Iterator<Item = &SessionSet> {
        self.exercises
            .iter()
            .flat_map(|e| e.sets.iter())
            .filter(|s| s.is_counted())
    }

    pub fn counted_set_count(&self) -> u32 {
        self.counted_sets().count() as u32
    }

    pub fn counted_reps(&self) -> u64 {
        self.counted_sets().map(|s| s.reps as u64).sum()
    }

    /// Renumbers exercises `0..n` in their current order.
    pub fn reindex_exercises(&mut self) {
        for (index, exercise) in self.exercises.iter_mut().enumerate() {
            exercise.order_index = index as u32;
        }
    }

    pub fn next_exercise_index(&self) -> u32 {
        self.exercises.len() as u32
    }
}
