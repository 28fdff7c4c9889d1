use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::rest_timer::RestTimerState;
use crate::session::SessionState;

/// Every state change in the core produces an Event.
/// The presentation layer renders them; the CLI prints them as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    SessionStarted {
        session_id: Uuid,
        workout_id: Option<Uuid>,
        workout_name: String,
        exercise_count: usize,
        at: DateTime<Utc>,
    },
    SessionPaused {
        session_id: Uuid,
        at: DateTime<Utc>,
    },
    SessionResumed {
        session_id: Uuid,
        at: DateTime<Utc>,
    },
    /// Session reached `completed` with its final totals.
    SessionEnded {
        session_id: Uuid,
        duration_secs: i64,
        total_volume: f64,
        completed_sets: u32,
        at: DateTime<Utc>,
    },
    SessionCancelled {
        session_id: Uuid,
        at: DateTime<Utc>,
    },
    /// A persisted in-progress session was adopted after restart.
    SessionRestored {
        session_id: Uuid,
        state: SessionState,
        at: DateTime<Utc>,
    },
    SetCompleted {
        exercise_id: Uuid,
        set_id: Uuid,
        weight: f64,
        reps: u32,
        at: DateTime<Utc>,
    },
    SetAdded {
        exercise_id: Uuid,
        set_id: Uuid,
        is_warmup: bool,
    },
    SetRemoved {
        exercise_id: Uuid,
        set_id: Uuid,
    },
    SetUpdated {
        exercise_id: Uuid,
        set_id: Uuid,
    },
    /// `auto` is true when completing the last working set finished it.
    ExerciseFinished {
        exercise_id: Uuid,
        auto: bool,
        at: DateTime<Utc>,
    },
    ExerciseAdded {
        exercise_id: Uuid,
        catalog_id: Uuid,
        order_index: u32,
    },
    ExerciseRemoved {
        exercise_id: Uuid,
    },
    ExerciseUpdated {
        exercise_id: Uuid,
    },
    ExercisesReordered {
        order: Vec<Uuid>,
    },
    RestStarted {
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    RestPaused {
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    RestResumed {
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    RestAdjusted {
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    RestCompleted {
        at: DateTime<Utc>,
    },
    RestSkipped {
        remaining_ms: u64,
        at: DateTime<Utc>,
    },
    RestSnapshot {
        state: RestTimerState,
        remaining_ms: u64,
        total_ms: u64,
        progress: f64,
        at: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_snake_case_tag() {
        let event = Event::SessionPaused {
            session_id: Uuid::nil(),
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "session_paused");
    }
}
