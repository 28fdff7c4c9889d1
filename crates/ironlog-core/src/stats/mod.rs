//! Statistics over completed workout sessions.
//!
//! Everything here is a pure function of a session snapshot. Nothing is
//! persisted; each query recomputes from scratch.

mod exercise_progress;
mod streak;
mod workout_stats;

pub use exercise_progress::{estimate_one_rep_max, BestSet, ExerciseProgress};
pub use streak::{calendar_day, Streaks};
pub use workout_stats::{StatisticsPeriod, WorkoutStatistics};
