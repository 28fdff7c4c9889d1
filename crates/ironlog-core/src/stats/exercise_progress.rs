//! Per-exercise progress across sessions.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::session::WorkoutSession;

/// Brzycki estimate: weight × 36 / (37 − reps).
///
/// One rep is the weight itself; the formula is capped at 36 reps where it
/// would otherwise blow up.
pub fn estimate_one_rep_max(weight: f64, reps: u32) -> f64 {
    match reps {
        0 => 0.0,
        1 => weight,
        r if r >= 37 => weight * 2.0,
        r => weight * (36.0 / (37.0 - f64::from(r))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestSet {
    pub weight: f64,
    pub reps: u32,
    pub estimated_one_rep_max: f64,
    pub session_id: Uuid,
    pub performed_at: DateTime<Utc>,
}

/// Progress summary for one catalog exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseProgress {
    pub exercise_id: Uuid,
    /// Name from the most recent session that included the exercise.
    pub exercise_name: String,
    pub session_count: u32,
    pub total_volume: f64,
    pub best_set: Option<BestSet>,
    pub last_performed: DateTime<Utc>,
}

impl ExerciseProgress {
    /// Builds one entry per catalog exercise from completed working sets.
    /// Entries are sorted by name.
    pub fn collect(sessions: &[WorkoutSession]) -> Vec<ExerciseProgress> {
        let mut chronological: Vec<&WorkoutSession> = sessions.iter().collect();
        chronological.sort_by_key(|s| s.start_date);

        let mut by_exercise: HashMap<Uuid, ExerciseProgress> = HashMap::new();
        for session in chronological {
            for exercise in &session.exercises {
                let entry = by_exercise
                    .entry(exercise.exercise_id)
                    .or_insert_with(|| ExerciseProgress {
                        exercise_id: exercise.exercise_id,
                        exercise_name: exercise.exercise_name.clone(),
                        session_count: 0,
                        total_volume: 0.0,
                        best_set: None,
                        last_performed: session.start_date,
                    });
                entry.exercise_name = exercise.exercise_name.clone();
                entry.session_count += 1;
                entry.last_performed = session.start_date;
                entry.total_volume += exercise.completed_volume();

                for set in exercise.sets.iter().filter(|s| s.is_counted()) {
                    let e1rm = estimate_one_rep_max(set.weight, set.reps);
                    let better = entry
                        .best_set
                        .as_ref()
                        .map_or(true, |best| e1rm > best.estimated_one_rep_max);
                    if better {
                        entry.best_set = Some(BestSet {
                            weight: set.weight,
                            reps: set.reps,
                            estimated_one_rep_max: e1rm,
                            session_id: session.id,
                            performed_at: set.completed_at.unwrap_or(session.start_date),
                        });
                    }
                }
            }
        }

        let mut progress: Vec<ExerciseProgress> = by_exercise.into_values().collect();
        progress.sort_by(|a, b| a.exercise_name.cmp(&b.exercise_name));
        progress
    }
}
