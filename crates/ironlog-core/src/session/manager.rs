//! Session lifecycle manager.
//!
//! Owns the one in-progress workout session and serialises every mutation
//! against it.
//!
//! ## State Transitions
//!
//! ```text
//! (none) -> Active <-> Paused -> (Completed | Cancelled)
//! ```
//!
//! Each mutating call validates its preconditions before touching the
//! session, applies the change, then persists through the
//! [`SessionRepository`]. A failed write surfaces as
//! [`SessionError::PersistenceFailure`] with the in-memory change kept;
//! [`SessionManager::flush`] retries the write and
//! [`SessionManager::discard`] drops the session.
//!
//! The health bridge is advisory. Its outcome is reported in
//! [`SessionUpdate::health`] and never undoes a local transition.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::model::{HealthLink, SessionSet, SessionState, WorkoutSession};
use crate::error::{HealthError, RepositoryError, SessionError};
use crate::events::Event;
use crate::health::{
    ActivityType, EnergyModel, HealthBridge, HealthSessionHandle, HealthWorkoutSummary,
};
use crate::repository::{ExerciseCatalog, SessionRepository, WorkoutRepository};
use crate::warmup::WarmupScheme;
use crate::workout::{TemplateExercise, WorkoutTemplate};

const IN_PROGRESS: &[SessionState] = &[SessionState::Active, SessionState::Paused];
const ACTIVE: &[SessionState] = &[SessionState::Active];

/// Outcome of the advisory health channel for one operation.
#[derive(Debug, Clone, PartialEq)]
pub enum HealthSync {
    /// No bridge configured, no linked health workout, or the operation
    /// does not touch health data.
    NotRequested,
    Synced,
    Failed(HealthError),
}

impl HealthSync {
    /// Escalates an advisory failure for callers that treat health sync as
    /// required.
    ///
    /// # Errors
    /// `HealthBridgeFailure` carrying the bridge's error.
    pub fn into_result(self) -> Result<(), SessionError> {
        match self {
            HealthSync::Failed(err) => Err(SessionError::HealthBridgeFailure(err)),
            HealthSync::NotRequested | HealthSync::Synced => Ok(()),
        }
    }

    fn from_result<T>(result: Result<T, HealthError>) -> (Option<T>, Self) {
        match result {
            Ok(value) => (Some(value), HealthSync::Synced),
            Err(err) => (None, HealthSync::Failed(err)),
        }
    }
}

/// Result of a successful mutating operation.
#[derive(Debug, Clone)]
pub struct SessionUpdate {
    /// Snapshot of the session after the change was persisted.
    pub session: WorkoutSession,
    pub events: Vec<Event>,
    pub health: HealthSync,
}

/// Field-wise edit of a single set. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetUpdate {
    pub weight: Option<f64>,
    pub reps: Option<u32>,
    pub rest_time_secs: Option<Option<u32>>,
    pub is_warmup: Option<bool>,
}

#[derive(Debug)]
struct Held {
    session: WorkoutSession,
    /// The repository holds a copy (save done at least once).
    stored: bool,
    /// The last write failed; the repository copy is stale.
    dirty: bool,
}

impl Held {
    fn snapshot(&self, events: Vec<Event>, health: HealthSync) -> SessionUpdate {
        SessionUpdate {
            session: self.session.clone(),
            events,
            health,
        }
    }

    fn health_handle(&self) -> Option<HealthSessionHandle> {
        self.session
            .health
            .as_ref()
            .map(|link| HealthSessionHandle(link.handle.clone()))
    }
}

/// Single-writer owner of the in-progress workout session.
pub struct SessionManager {
    sessions: Arc<dyn SessionRepository>,
    workouts: Arc<dyn WorkoutRepository>,
    catalog: Arc<dyn ExerciseCatalog>,
    health: Option<Arc<dyn HealthBridge>>,
    energy: EnergyModel,
    activity: ActivityType,
    slot: RwLock<Option<Held>>,
}

impl SessionManager {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        workouts: Arc<dyn WorkoutRepository>,
        catalog: Arc<dyn ExerciseCatalog>,
    ) -> Self {
        Self {
            sessions,
            workouts,
            catalog,
            health: None,
            energy: EnergyModel::default(),
            activity: ActivityType::TraditionalStrengthTraining,
            slot: RwLock::new(None),
        }
    }

    /// Mirror sessions into a platform health store.
    pub fn with_health(mut self, bridge: Arc<dyn HealthBridge>, energy: EnergyModel) -> Self {
        self.health = Some(bridge);
        self.energy = energy;
        self
    }

    pub fn with_activity(mut self, activity: ActivityType) -> Self {
        self.activity = activity;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Copy of the held session, if any.
    pub async fn current(&self) -> Option<WorkoutSession> {
        self.slot.read().await.as_ref().map(|h| h.session.clone())
    }

    pub async fn state(&self) -> Option<SessionState> {
        self.slot.read().await.as_ref().map(|h| h.session.state)
    }

    /// True when the held session has changes the repository lacks.
    pub async fn has_unsaved_changes(&self) -> bool {
        self.slot.read().await.as_ref().is_some_and(|h| h.dirty)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Starts a session from a stored workout template.
    ///
    /// # Errors
    /// `WorkoutNotFound` for an unknown id, plus everything
    /// [`start_session`](Self::start_session) returns.
    pub async fn start_from_workout(&self, workout_id: Uuid) -> Result<SessionUpdate, SessionError> {
        // Fail fast before the repository round-trip.
        check_can_start(self.slot.read().await.as_ref())?;
        let template = self
            .workouts
            .fetch(workout_id)
            .await?
            .ok_or(SessionError::WorkoutNotFound(workout_id))?;
        self.start_template(&template).await
    }

    pub async fn start_template(&self, template: &WorkoutTemplate) -> Result<SessionUpdate, SessionError> {
        self.start_session(Some(template.id), &template.name, &template.exercises)
            .await
    }

    /// Starts a new session. Each planned exercise becomes a session
    /// exercise with one open set per target set.
    ///
    /// # Errors
    /// `SessionAlreadyActive` while a session is active or paused;
    /// `InvalidInput` for a blank name or negative target weight;
    /// `PersistenceFailure` if the initial save fails (the session is kept).
    pub async fn start_session(
        &self,
        workout_id: Option<Uuid>,
        workout_name: &str,
        exercises: &[TemplateExercise],
    ) -> Result<SessionUpdate, SessionError> {
        let mut slot = self.slot.write().await;
        check_can_start(slot.as_ref())?;

        let plan = WorkoutTemplate {
            id: workout_id.unwrap_or_else(Uuid::nil),
            name: workout_name.trim().to_string(),
            exercises: exercises.to_vec(),
        };
        plan.validate()?;

        let now = Utc::now();
        let mut session = WorkoutSession::new(workout_id, plan.name, now);
        session.exercises = plan
            .exercises
            .iter()
            .enumerate()
            .map(|(i, planned)| planned.to_session_exercise(i as u32))
            .collect();

        let health = match &self.health {
            Some(bridge) => {
                let (handle, sync) =
                    HealthSync::from_result(bridge.start_session(self.activity, now).await);
                if let Some(handle) = handle {
                    session.health = Some(HealthLink {
                        handle: handle.0,
                        active_energy_kcal: None,
                        metadata: BTreeMap::new(),
                    });
                }
                sync
            }
            None => HealthSync::NotRequested,
        };
        log_health("start", session.id, &health);

        let event = Event::SessionStarted {
            session_id: session.id,
            workout_id,
            workout_name: session.workout_name.clone(),
            exercise_count: session.exercises.len(),
            at: now,
        };
        info!(
            session_id = %session.id,
            workout = %session.workout_name,
            exercises = session.exercises.len(),
            "session started"
        );

        let held = slot.insert(Held {
            session,
            stored: false,
            dirty: true,
        });
        self.persist(held).await?;
        Ok(held.snapshot(vec![event], health))
    }

    /// # Errors
    /// `InvalidStateTransition` unless the session is active.
    pub async fn pause_session(&self) -> Result<SessionUpdate, SessionError> {
        let mut slot = self.slot.write().await;
        let held = require(&mut slot, "pause", ACTIVE)?;
        held.session.state = SessionState::Paused;
        let event = Event::SessionPaused {
            session_id: held.session.id,
            at: Utc::now(),
        };
        info!(session_id = %held.session.id, "session paused");

        self.persist(held).await?;
        let health = match (&self.health, held.health_handle()) {
            (Some(bridge), Some(handle)) => {
                HealthSync::from_result(bridge.pause_session(&handle).await).1
            }
            _ => HealthSync::NotRequested,
        };
        log_health("pause", held.session.id, &health);
        Ok(held.snapshot(vec![event], health))
    }

    /// # Errors
    /// `InvalidStateTransition` unless the session is paused.
    pub async fn resume_session(&self) -> Result<SessionUpdate, SessionError> {
        let mut slot = self.slot.write().await;
        let held = require(&mut slot, "resume", &[SessionState::Paused])?;
        held.session.state = SessionState::Active;
        let event = Event::SessionResumed {
            session_id: held.session.id,
            at: Utc::now(),
        };
        info!(session_id = %held.session.id, "session resumed");

        self.persist(held).await?;
        let health = match (&self.health, held.health_handle()) {
            (Some(bridge), Some(handle)) => {
                HealthSync::from_result(bridge.resume_session(&handle).await).1
            }
            _ => HealthSync::NotRequested,
        };
        log_health("resume", held.session.id, &health);
        Ok(held.snapshot(vec![event], health))
    }

    /// Completes the session, reports it to the health bridge, imports
    /// what the platform recorded and persists the final record.
    ///
    /// # Errors
    /// `InvalidStateTransition` unless active or paused;
    /// `PersistenceFailure` if the final write fails. The completed session
    /// then stays held until [`flush`](Self::flush) or
    /// [`discard`](Self::discard).
    pub async fn end_session(&self) -> Result<SessionUpdate, SessionError> {
        let mut slot = self.slot.write().await;
        let held = require(&mut slot, "end", IN_PROGRESS)?;

        let now = Utc::now();
        held.session.state = SessionState::Completed;
        held.session.end_date = Some(now);

        let duration = held.session.elapsed(now);
        let event = Event::SessionEnded {
            session_id: held.session.id,
            duration_secs: duration.num_seconds(),
            total_volume: held.session.total_volume(),
            completed_sets: held.session.counted_set_count(),
            at: now,
        };

        let health = match (&self.health, held.health_handle()) {
            (Some(bridge), Some(handle)) => {
                let summary = HealthWorkoutSummary {
                    end_date: now,
                    active_energy_kcal: self.energy.estimate_kcal(duration),
                    distance_meters: None,
                    metadata: workout_metadata(&held.session),
                };
                let (record, sync) =
                    HealthSync::from_result(bridge.end_session(&handle, &summary).await);
                if let (Some(record), Some(link)) = (record, held.session.health.as_mut()) {
                    link.active_energy_kcal = record.active_energy_kcal;
                    link.metadata = record.metadata;
                }
                sync
            }
            _ => HealthSync::NotRequested,
        };
        log_health("end", held.session.id, &health);
        info!(
            session_id = %held.session.id,
            duration_secs = duration.num_seconds(),
            volume = held.session.total_volume(),
            "session completed"
        );

        self.persist(held).await?;
        let update = held.snapshot(vec![event], health);
        *slot = None;
        Ok(update)
    }

    /// Abandons the session without requiring any set to be complete.
    ///
    /// # Errors
    /// `InvalidStateTransition` unless active or paused;
    /// `PersistenceFailure` if the write fails.
    pub async fn cancel_session(&self) -> Result<SessionUpdate, SessionError> {
        let mut slot = self.slot.write().await;
        let held = require(&mut slot, "cancel", IN_PROGRESS)?;

        let now = Utc::now();
        held.session.state = SessionState::Cancelled;
        held.session.end_date = Some(now);
        let event = Event::SessionCancelled {
            session_id: held.session.id,
            at: now,
        };

        let health = match (&self.health, held.health_handle()) {
            (Some(bridge), Some(handle)) => {
                HealthSync::from_result(bridge.abort_session(&handle).await).1
            }
            _ => HealthSync::NotRequested,
        };
        log_health("cancel", held.session.id, &health);
        info!(session_id = %held.session.id, "session cancelled");

        self.persist(held).await?;
        let update = held.snapshot(vec![event], health);
        *slot = None;
        Ok(update)
    }

    /// Adopts the most recent persisted session that is still active or
    /// paused, e.g. after a restart. Returns `None` when there is none.
    ///
    /// # Errors
    /// `PersistenceFailure` if the repository cannot be read.
    pub async fn restore(&self) -> Result<Option<SessionUpdate>, SessionError> {
        let mut slot = self.slot.write().await;
        if let Some(held) = slot.as_ref() {
            return Ok(Some(held.snapshot(Vec::new(), HealthSync::NotRequested)));
        }

        let found = self
            .sessions
            .fetch_all()
            .await?
            .into_iter()
            .filter(|s| s.state.is_in_progress())
            .max_by_key(|s| s.start_date);

        let Some(session) = found else {
            return Ok(None);
        };
        info!(session_id = %session.id, state = %session.state, "session restored");
        let event = Event::SessionRestored {
            session_id: session.id,
            state: session.state,
            at: Utc::now(),
        };
        let held = slot.insert(Held {
            session,
            stored: true,
            dirty: false,
        });
        Ok(Some(held.snapshot(vec![event], HealthSync::NotRequested)))
    }

    /// Retries the write of a session whose last persist failed. A terminal
    /// session is released once written.
    ///
    /// # Errors
    /// `PersistenceFailure` if the write fails again.
    pub async fn flush(&self) -> Result<(), SessionError> {
        let mut slot = self.slot.write().await;
        let Some(held) = slot.as_mut() else {
            return Ok(());
        };
        if !held.dirty {
            return Ok(());
        }
        self.persist(held).await?;
        if held.session.state.is_terminal() {
            *slot = None;
        }
        Ok(())
    }

    /// Drops the held session without writing it. A linked health workout
    /// that is still running is aborted; a failure there is only logged.
    pub async fn discard(&self) -> Option<WorkoutSession> {
        let mut slot = self.slot.write().await;
        let held = slot.take()?;
        warn!(session_id = %held.session.id, dirty = held.dirty, "session discarded");

        if held.session.state.is_in_progress() {
            if let (Some(bridge), Some(handle)) = (&self.health, held.health_handle()) {
                let (_, health) = HealthSync::from_result(bridge.abort_session(&handle).await);
                log_health("discard", held.session.id, &health);
            }
        }
        Some(held.session)
    }

    // ── Sets ─────────────────────────────────────────────────────────

    /// Marks a set complete, optionally recording the weight and reps
    /// actually lifted. Completing the last open working set of an
    /// exercise finishes the exercise.
    ///
    /// # Errors
    /// `InvalidStateTransition` unless active; `ExerciseNotFound` /
    /// `SetNotFound` for bad ids; `InvalidInput` for a negative weight.
    pub async fn complete_set(
        &self,
        exercise_id: Uuid,
        set_id: Uuid,
        weight: Option<f64>,
        reps: Option<u32>,
    ) -> Result<SessionUpdate, SessionError> {
        self.edit("complete a set", ACTIVE, |session| {
            validate_weight(weight)?;
            let exercise = session
                .exercise_mut(exercise_id)
                .ok_or(SessionError::ExerciseNotFound(exercise_id))?;
            let set = exercise
                .set_mut(set_id)
                .ok_or(SessionError::SetNotFound(set_id))?;

            let now = Utc::now();
            if let Some(weight) = weight {
                set.weight = weight;
            }
            if let Some(reps) = reps {
                set.reps = reps;
            }
            set.mark_completed(now);
            let is_warmup = set.is_warmup;
            let mut events = vec![Event::SetCompleted {
                exercise_id,
                set_id,
                weight: set.weight,
                reps: set.reps,
                at: now,
            }];
            debug!(%exercise_id, %set_id, weight = set.weight, reps = set.reps, "set completed");

            if !is_warmup && !exercise.is_finished && exercise.working_sets_done() {
                exercise.is_finished = true;
                events.push(Event::ExerciseFinished {
                    exercise_id,
                    auto: true,
                    at: now,
                });
            }
            Ok(events)
        })
        .await
    }

    /// Appends a set. Missing weight/reps copy the exercise's last set.
    ///
    /// # Errors
    /// `InvalidStateTransition` unless active; `ExerciseNotFound`;
    /// `InvalidInput` for a negative weight.
    pub async fn add_set(
        &self,
        exercise_id: Uuid,
        weight: Option<f64>,
        reps: Option<u32>,
        is_warmup: bool,
    ) -> Result<SessionUpdate, SessionError> {
        self.edit("add a set", ACTIVE, |session| {
            validate_weight(weight)?;
            let exercise = session
                .exercise_mut(exercise_id)
                .ok_or(SessionError::ExerciseNotFound(exercise_id))?;

            let last = exercise.sets.last();
            let mut set = SessionSet::new(
                exercise.next_set_index(),
                weight.or(last.map(|s| s.weight)).unwrap_or(0.0),
                reps.or(last.map(|s| s.reps)).unwrap_or(0),
            );
            set.rest_time_secs = last.and_then(|s| s.rest_time_secs);
            set.is_warmup = is_warmup;
            let set_id = set.id;
            exercise.sets.push(set);
            debug!(%exercise_id, %set_id, "set added");
            Ok(vec![Event::SetAdded {
                exercise_id,
                set_id,
                is_warmup,
            }])
        })
        .await
    }

    /// # Errors
    /// `InvalidStateTransition` unless active; `ExerciseNotFound` /
    /// `SetNotFound`.
    pub async fn remove_set(&self, exercise_id: Uuid, set_id: Uuid) -> Result<SessionUpdate, SessionError> {
        self.edit("remove a set", ACTIVE, |session| {
            let exercise = session
                .exercise_mut(exercise_id)
                .ok_or(SessionError::ExerciseNotFound(exercise_id))?;
            let position = exercise
                .sets
                .iter()
                .position(|s| s.id == set_id)
                .ok_or(SessionError::SetNotFound(set_id))?;
            exercise.sets.remove(position);
            exercise.reindex_sets();
            debug!(%exercise_id, %set_id, "set removed");
            Ok(vec![Event::SetRemoved {
                exercise_id,
                set_id,
            }])
        })
        .await
    }

    /// # Errors
    /// `InvalidStateTransition` unless active; `ExerciseNotFound` /
    /// `SetNotFound`; `InvalidInput` for a negative weight.
    pub async fn update_set(
        &self,
        exercise_id: Uuid,
        set_id: Uuid,
        change: SetUpdate,
    ) -> Result<SessionUpdate, SessionError> {
        self.edit("update a set", ACTIVE, |session| {
            validate_weight(change.weight)?;
            let set = session
                .exercise_mut(exercise_id)
                .ok_or(SessionError::ExerciseNotFound(exercise_id))?
                .set_mut(set_id)
                .ok_or(SessionError::SetNotFound(set_id))?;
            if let Some(weight) = change.weight {
                set.weight = weight;
            }
            if let Some(reps) = change.reps {
                set.reps = reps;
            }
            if let Some(rest) = change.rest_time_secs {
                set.rest_time_secs = rest;
            }
            if let Some(is_warmup) = change.is_warmup {
                set.is_warmup = is_warmup;
            }
            Ok(vec![Event::SetUpdated {
                exercise_id,
                set_id,
            }])
        })
        .await
    }

    /// Overrides weight and/or reps on every set of an exercise.
    ///
    /// # Errors
    /// `InvalidStateTransition` unless active; `ExerciseNotFound`;
    /// `InvalidInput` for a negative weight or when neither value is given.
    pub async fn update_all_sets(
        &self,
        exercise_id: Uuid,
        weight: Option<f64>,
        reps: Option<u32>,
    ) -> Result<SessionUpdate, SessionError> {
        self.edit("update sets", ACTIVE, |session| {
            validate_weight(weight)?;
            if weight.is_none() && reps.is_none() {
                return Err(SessionError::InvalidInput(
                    "either weight or reps must be given".into(),
                ));
            }
            let exercise = session
                .exercise_mut(exercise_id)
                .ok_or(SessionError::ExerciseNotFound(exercise_id))?;
            let mut events = Vec::with_capacity(exercise.sets.len());
            for set in &mut exercise.sets {
                if let Some(weight) = weight {
                    set.weight = weight;
                }
                if let Some(reps) = reps {
                    set.reps = reps;
                }
                events.push(Event::SetUpdated {
                    exercise_id,
                    set_id: set.id,
                });
            }
            Ok(events)
        })
        .await
    }

    /// Inserts a warmup ramp for `working_weight` ahead of the working sets.
    ///
    /// # Errors
    /// `InvalidStateTransition` unless active; `ExerciseNotFound`;
    /// `InvalidInput` when the scheme yields no sets for that weight.
    pub async fn add_warmup_sets(
        &self,
        exercise_id: Uuid,
        working_weight: f64,
        scheme: &WarmupScheme,
    ) -> Result<SessionUpdate, SessionError> {
        self.edit("add warmup sets", ACTIVE, |session| {
            validate_weight(Some(working_weight))?;
            let exercise = session
                .exercise_mut(exercise_id)
                .ok_or(SessionError::ExerciseNotFound(exercise_id))?;
            let ramp = scheme.calculate(working_weight);
            if ramp.is_empty() {
                return Err(SessionError::InvalidInput(format!(
                    "no warmup needed for {working_weight}"
                )));
            }

            let warmups: Vec<SessionSet> = ramp
                .iter()
                .map(|w| SessionSet::warmup(0, w.weight, w.reps))
                .collect();
            let events = warmups
                .iter()
                .map(|s| Event::SetAdded {
                    exercise_id,
                    set_id: s.id,
                    is_warmup: true,
                })
                .collect();
            exercise.sets.splice(0..0, warmups);
            exercise.reindex_sets();
            Ok(events)
        })
        .await
    }

    // ── Exercises ────────────────────────────────────────────────────

    /// Reassigns `order_index` 0..n-1 following `order`.
    ///
    /// # Errors
    /// `InvalidStateTransition` unless active or paused; `InvalidInput`
    /// unless `order` is a permutation of the session's exercise ids.
    pub async fn reorder_exercises(&self, order: &[Uuid]) -> Result<SessionUpdate, SessionError> {
        self.edit("reorder exercises", IN_PROGRESS, |session| {
            let unique: HashSet<Uuid> = order.iter().copied().collect();
            let current: HashSet<Uuid> = session.exercises.iter().map(|e| e.id).collect();
            if unique.len() != order.len() {
                return Err(SessionError::InvalidInput(
                    "exercise order contains duplicates".into(),
                ));
            }
            if unique != current {
                return Err(SessionError::InvalidInput(
                    "exercise order must list every session exercise exactly once".into(),
                ));
            }

            session
                .exercises
                .sort_by_key(|e| order.iter().position(|id| *id == e.id));
            session.reindex_exercises();
            Ok(vec![Event::ExercisesReordered {
                order: order.to_vec(),
            }])
        })
        .await
    }

    /// Appends a catalog exercise using its default targets.
    ///
    /// # Errors
    /// `InvalidStateTransition` unless active or paused; `ExerciseNotFound`
    /// if the catalog has no such entry; `InvalidInput` if its default
    /// weight is negative or not finite.
    pub async fn add_exercise(&self, catalog_id: Uuid) -> Result<SessionUpdate, SessionError> {
        check_state(self.slot.read().await.as_ref(), "add an exercise", IN_PROGRESS)?;
        let entry = self
            .catalog
            .fetch(catalog_id)
            .await?
            .ok_or(SessionError::ExerciseNotFound(catalog_id))?;
        let planned = TemplateExercise::from_exercise(&entry);
        validate_weight(Some(planned.target_weight))?;

        self.edit("add an exercise", IN_PROGRESS, |session| {
            let order_index = session.next_exercise_index();
            let exercise = planned.to_session_exercise(order_index);
            let exercise_id = exercise.id;
            session.exercises.push(exercise);
            debug!(%exercise_id, %catalog_id, "exercise added");
            Ok(vec![Event::ExerciseAdded {
                exercise_id,
                catalog_id,
                order_index,
            }])
        })
        .await
    }

    /// # Errors
    /// `InvalidStateTransition` unless active or paused; `ExerciseNotFound`.
    pub async fn remove_exercise(&self, exercise_id: Uuid) -> Result<SessionUpdate, SessionError> {
        self.edit("remove an exercise", IN_PROGRESS, |session| {
            let position = session
                .exercises
                .iter()
                .position(|e| e.id == exercise_id)
                .ok_or(SessionError::ExerciseNotFound(exercise_id))?;
            session.exercises.remove(position);
            session.reindex_exercises();
            Ok(vec![Event::ExerciseRemoved { exercise_id }])
        })
        .await
    }

    /// Marks an exercise finished whether or not its sets are complete.
    ///
    /// # Errors
    /// `InvalidStateTransition` unless active or paused; `ExerciseNotFound`.
    pub async fn finish_exercise(&self, exercise_id: Uuid) -> Result<SessionUpdate, SessionError> {
        self.edit("finish an exercise", IN_PROGRESS, |session| {
            let exercise = session
                .exercise_mut(exercise_id)
                .ok_or(SessionError::ExerciseNotFound(exercise_id))?;
            exercise.is_finished = true;
            Ok(vec![Event::ExerciseFinished {
                exercise_id,
                auto: false,
                at: Utc::now(),
            }])
        })
        .await
    }

    /// # Errors
    /// `InvalidStateTransition` unless active or paused; `ExerciseNotFound`.
    pub async fn update_exercise_notes(
        &self,
        exercise_id: Uuid,
        notes: Option<String>,
    ) -> Result<SessionUpdate, SessionError> {
        self.edit("edit notes", IN_PROGRESS, |session| {
            let exercise = session
                .exercise_mut(exercise_id)
                .ok_or(SessionError::ExerciseNotFound(exercise_id))?;
            exercise.notes = notes.filter(|n| !n.trim().is_empty());
            Ok(vec![Event::ExerciseUpdated { exercise_id }])
        })
        .await
    }

    /// # Errors
    /// `InvalidStateTransition` unless active or paused; `ExerciseNotFound`.
    pub async fn set_exercise_rest_time(
        &self,
        exercise_id: Uuid,
        rest_time_secs: Option<u32>,
    ) -> Result<SessionUpdate, SessionError> {
        self.edit("set rest time", IN_PROGRESS, |session| {
            let exercise = session
                .exercise_mut(exercise_id)
                .ok_or(SessionError::ExerciseNotFound(exercise_id))?;
            exercise.rest_time_to_next_secs = rest_time_secs;
            Ok(vec![Event::ExerciseUpdated { exercise_id }])
        })
        .await
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Runs `apply` against the held session under the write lock, then
    /// persists. `apply` must return its errors before mutating anything.
    async fn edit<F>(
        &self,
        operation: &'static str,
        allowed: &[SessionState],
        apply: F,
    ) -> Result<SessionUpdate, SessionError>
    where
        F: FnOnce(&mut WorkoutSession) -> Result<Vec<Event>, SessionError>,
    {
        let mut slot = self.slot.write().await;
        let held = require(&mut slot, operation, allowed)?;
        let events = apply(&mut held.session)?;
        self.persist(held).await?;
        Ok(held.snapshot(events, HealthSync::NotRequested))
    }

    async fn persist(&self, held: &mut Held) -> Result<(), RepositoryError> {
        let result = if held.stored {
            self.sessions.update(&held.session).await
        } else {
            self.sessions.save(&held.session).await
        };
        match result {
            Ok(()) => {
                held.stored = true;
                held.dirty = false;
                Ok(())
            }
            Err(err) => {
                held.dirty = true;
                warn!(session_id = %held.session.id, error = %err, "failed to persist session");
                Err(err)
            }
        }
    }
}

fn check_can_start(held: Option<&Held>) -> Result<(), SessionError> {
    match held.map(|h| h.session.state) {
        None => Ok(()),
        Some(state) if state.is_in_progress() => Err(SessionError::SessionAlreadyActive),
        // A finished session whose final write has not landed yet.
        Some(state) => Err(SessionError::InvalidStateTransition {
            operation: "start a session",
            current: Some(state),
        }),
    }
}

fn check_state(
    held: Option<&Held>,
    operation: &'static str,
    allowed: &[SessionState],
) -> Result<(), SessionError> {
    let current = held.map(|h| h.session.state);
    match current {
        Some(state) if allowed.contains(&state) => Ok(()),
        _ => Err(SessionError::InvalidStateTransition { operation, current }),
    }
}

fn require<'a>(
    slot: &'a mut Option<Held>,
    operation: &'static str,
    allowed: &[SessionState],
) -> Result<&'a mut Held, SessionError> {
    check_state(slot.as_ref(), operation, allowed)?;
    slot.as_mut().ok_or(SessionError::InvalidStateTransition {
        operation,
        current: None,
    })
}

fn validate_weight(weight: Option<f64>) -> Result<(), SessionError> {
    match weight {
        Some(w) if !w.is_finite() || w < 0.0 => Err(SessionError::InvalidInput(format!(
            "weight must be a non-negative number, got {w}"
        ))),
        _ => Ok(()),
    }
}

fn workout_metadata(session: &WorkoutSession) -> BTreeMap<String, String> {
    let mut metadata = BTreeMap::new();
    metadata.insert("workout_name".to_string(), session.workout_name.clone());
    metadata.insert("session_id".to_string(), session.id.to_string());
    metadata.insert("total_volume".to_string(), format!("{:.1}", session.total_volume()));
    metadata.insert("completed_sets".to_string(), session.counted_set_count().to_string());
    metadata
}

fn log_health(operation: &str, session_id: Uuid, health: &HealthSync) {
    if let HealthSync::Failed(err) = health {
        warn!(%session_id, operation, error = %err, "health sync failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryStore;
    use crate::workout::Exercise;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Session repository whose writes can be switched off.
    #[derive(Default)]
    struct FlakyRepository {
        inner: InMemoryStore,
        failing: AtomicBool,
    }

    impl FlakyRepository {
        fn fail(&self, on: bool) {
            self.failing.store(on, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl SessionRepository for FlakyRepository {
        async fn save(&self, session: &WorkoutSession) -> Result<(), RepositoryError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(RepositoryError::SaveFailed("offline".into()));
            }
            SessionRepository::save(&self.inner, session).await
        }
        async fn update(&self, session: &WorkoutSession) -> Result<(), RepositoryError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(RepositoryError::UpdateFailed("offline".into()));
            }
            self.inner.update(session).await
        }
        async fn fetch(&self, id: Uuid) -> Result<Option<WorkoutSession>, RepositoryError> {
            SessionRepository::fetch(&self.inner, id).await
        }
        async fn fetch_all(&self) -> Result<Vec<WorkoutSession>, RepositoryError> {
            SessionRepository::fetch_all(&self.inner).await
        }
        async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
            SessionRepository::delete(&self.inner, id).await
        }
    }

    /// Health bridge that records calls and can be told to fail.
    #[derive(Default)]
    struct RecordingBridge {
        calls: Mutex<Vec<&'static str>>,
        failing: AtomicBool,
    }

    impl RecordingBridge {
        fn record(&self, call: &'static str) -> Result<(), HealthError> {
            self.calls.lock().unwrap().push(call);
            if self.failing.load(Ordering::SeqCst) {
                Err(HealthError::Unavailable)
            } else {
                Ok(())
            }
        }
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HealthBridge for RecordingBridge {
        async fn start_session(
            &self,
            _activity: ActivityType,
            _start_date: chrono::DateTime<Utc>,
        ) -> Result<HealthSessionHandle, HealthError> {
            self.record("start")?;
            Ok(HealthSessionHandle("hk-1".into()))
        }
        async fn pause_session(&self, _handle: &HealthSessionHandle) -> Result<(), HealthError> {
            self.record("pause")
        }
        async fn resume_session(&self, _handle: &HealthSessionHandle) -> Result<(), HealthError> {
            self.record("resume")
        }
        async fn end_session(
            &self,
            _handle: &HealthSessionHandle,
            summary: &HealthWorkoutSummary,
        ) -> Result<crate::health::HealthRecord, HealthError> {
            self.record("end")?;
            let mut metadata = summary.metadata.clone();
            metadata.insert("source".into(), "watch".into());
            Ok(crate::health::HealthRecord {
                active_energy_kcal: Some(321.0),
                metadata,
            })
        }
        async fn abort_session(&self, _handle: &HealthSessionHandle) -> Result<(), HealthError> {
            self.record("abort")
        }
    }

    fn plan() -> Vec<TemplateExercise> {
        vec![
            TemplateExercise::new(Uuid::new_v4(), "Bench Press", 2, 10, 60.0),
            TemplateExercise::new(Uuid::new_v4(), "Row", 3, 8, 50.0),
            TemplateExercise::new(Uuid::new_v4(), "Curl", 1, 12, 15.0),
        ]
    }

    fn manager_with(repo: Arc<dyn SessionRepository>) -> (SessionManager, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let manager = SessionManager::new(repo, store.clone(), store.clone());
        (manager, store)
    }

    fn manager() -> (SessionManager, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let manager = SessionManager::new(store.clone(), store.clone(), store.clone());
        (manager, store)
    }

    fn assert_end_date_invariant(session: &WorkoutSession) {
        assert_eq!(session.end_date.is_some(), session.state.is_terminal());
    }

    #[tokio::test]
    async fn start_builds_session_from_plan() {
        let (manager, store) = manager();
        let started = manager.start_session(None, "Push", &plan()).await.unwrap();

        let session = started.session;
        assert_eq!(session.state, SessionState::Active);
        assert_eq!(session.exercises.len(), 3);
        assert_eq!(session.exercises[1].sets.len(), 3);
        assert_end_date_invariant(&session);
        assert_eq!(started.health, HealthSync::NotRequested);

        let stored = SessionRepository::fetch(store.as_ref(), session.id).await.unwrap();
        assert_eq!(stored, Some(session));
    }

    #[tokio::test]
    async fn start_while_active_or_paused_fails_and_keeps_session() {
        let (manager, _) = manager();
        let first = manager.start_session(None, "Push", &plan()).await.unwrap().session;

        let err = manager.start_session(None, "Pull", &[]).await.unwrap_err();
        assert!(matches!(err, SessionError::SessionAlreadyActive));

        manager.pause_session().await.unwrap();
        let err = manager.start_session(None, "Pull", &[]).await.unwrap_err();
        assert!(matches!(err, SessionError::SessionAlreadyActive));

        let current = manager.current().await.unwrap();
        assert_eq!(current.id, first.id);
        assert_eq!(current.workout_name, "Push");
    }

    #[tokio::test]
    async fn blank_name_is_rejected_before_anything_starts() {
        let (manager, _) = manager();
        let err = manager.start_session(None, "  ", &plan()).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidInput(_)));
        assert!(manager.current().await.is_none());
    }

    #[tokio::test]
    async fn start_from_unknown_workout_fails() {
        let (manager, _) = manager();
        let id = Uuid::new_v4();
        let err = manager.start_from_workout(id).await.unwrap_err();
        assert!(matches!(err, SessionError::WorkoutNotFound(missing) if missing == id));
    }

    #[tokio::test]
    async fn start_from_stored_workout_snapshots_name() {
        let (manager, store) = manager();
        let template = WorkoutTemplate::new("Legs", plan()).unwrap();
        WorkoutRepository::save(store.as_ref(), &template).await.unwrap();

        let session = manager.start_from_workout(template.id).await.unwrap().session;
        assert_eq!(session.workout_id, Some(template.id));
        assert_eq!(session.workout_name, "Legs");
    }

    #[tokio::test]
    async fn illegal_transitions_are_rejected() {
        let (manager, _) = manager();
        for err in [
            manager.pause_session().await.unwrap_err(),
            manager.resume_session().await.unwrap_err(),
            manager.end_session().await.unwrap_err(),
            manager.cancel_session().await.unwrap_err(),
        ] {
            assert!(matches!(
                err,
                SessionError::InvalidStateTransition { current: None, .. }
            ));
        }

        manager.start_session(None, "Push", &plan()).await.unwrap();
        let err = manager.resume_session().await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidStateTransition {
                current: Some(SessionState::Active),
                ..
            }
        ));

        manager.pause_session().await.unwrap();
        assert!(manager.pause_session().await.is_err());
        let session = manager.current().await.unwrap();
        let set = &session.exercises[0].sets[0];
        let err = manager
            .complete_set(session.exercises[0].id, set.id, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidStateTransition { .. }));
    }

    #[tokio::test]
    async fn full_lifecycle_keeps_end_date_invariant() {
        let (manager, store) = manager();
        let s = manager.start_session(None, "Push", &plan()).await.unwrap().session;
        assert_end_date_invariant(&s);
        let s = manager.pause_session().await.unwrap().session;
        assert_eq!(s.state, SessionState::Paused);
        assert_end_date_invariant(&s);
        let s = manager.resume_session().await.unwrap().session;
        assert_end_date_invariant(&s);
        let ended = manager.end_session().await.unwrap();
        assert_eq!(ended.session.state, SessionState::Completed);
        assert_end_date_invariant(&ended.session);
        assert!(matches!(ended.events[0], Event::SessionEnded { .. }));

        assert!(manager.current().await.is_none());
        let stored = SessionRepository::fetch(store.as_ref(), s.id).await.unwrap().unwrap();
        assert_eq!(stored.state, SessionState::Completed);
        assert_end_date_invariant(&stored);
    }

    #[tokio::test]
    async fn cancel_discards_without_completion() {
        let (manager, store) = manager();
        let s = manager.start_session(None, "Push", &plan()).await.unwrap().session;
        manager.pause_session().await.unwrap();
        let cancelled = manager.cancel_session().await.unwrap().session;
        assert_eq!(cancelled.state, SessionState::Cancelled);
        assert_end_date_invariant(&cancelled);
        assert!(manager.current().await.is_none());

        let stored = SessionRepository::fetch(store.as_ref(), s.id).await.unwrap().unwrap();
        assert_eq!(stored.state, SessionState::Cancelled);
    }

    #[tokio::test]
    async fn completing_last_working_set_finishes_exercise() {
        let (manager, _) = manager();
        let session = manager.start_session(None, "Push", &plan()).await.unwrap().session;
        let exercise = &session.exercises[0];

        let first = manager
            .complete_set(exercise.id, exercise.sets[0].id, Some(62.5), Some(9))
            .await
            .unwrap();
        assert!(!first.session.exercises[0].is_finished);
        let set = &first.session.exercises[0].sets[0];
        assert_eq!((set.weight, set.reps), (62.5, 9));
        assert!(set.completed && set.completed_at.is_some());

        let last = manager
            .complete_set(exercise.id, exercise.sets[1].id, None, None)
            .await
            .unwrap();
        assert!(last.session.exercises[0].is_finished);
        assert!(last
            .events
            .iter()
            .any(|e| matches!(e, Event::ExerciseFinished { auto: true, .. })));
    }

    #[tokio::test]
    async fn completing_warmup_never_finishes_exercise() {
        let (manager, _) = manager();
        let session = manager.start_session(None, "Push", &plan()).await.unwrap().session;
        let exercise = &session.exercises[2];

        let with_warmup = manager.add_set(exercise.id, Some(5.0), Some(15), true).await.unwrap();
        let warmup_id = with_warmup.session.exercises[2].sets[1].id;
        let done = manager
            .complete_set(exercise.id, warmup_id, None, None)
            .await
            .unwrap();
        assert!(!done.session.exercises[2].is_finished);
        assert!(!done
            .events
            .iter()
            .any(|e| matches!(e, Event::ExerciseFinished { .. })));
    }

    #[tokio::test]
    async fn unknown_ids_fail_without_mutation() {
        let (manager, _) = manager();
        let session = manager.start_session(None, "Push", &plan()).await.unwrap().session;
        let exercise = &session.exercises[0];

        let err = manager
            .complete_set(Uuid::new_v4(), exercise.sets[0].id, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::ExerciseNotFound(_)));

        let err = manager
            .complete_set(exercise.id, Uuid::new_v4(), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::SetNotFound(_)));

        let err = manager
            .complete_set(exercise.id, exercise.sets[0].id, Some(-1.0), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidInput(_)));

        assert_eq!(manager.current().await.unwrap(), session);
    }

    #[tokio::test]
    async fn add_remove_update_sets() {
        let (manager, _) = manager();
        let session = manager.start_session(None, "Push", &plan()).await.unwrap().session;
        let exercise_id = session.exercises[0].id;

        let added = manager.add_set(exercise_id, None, None, false).await.unwrap().session;
        let sets = &added.exercises[0].sets;
        assert_eq!(sets.len(), 3);
        assert_eq!((sets[2].weight, sets[2].reps, sets[2].order_index), (60.0, 10, 2));

        let removed = manager
            .remove_set(exercise_id, sets[0].id)
            .await
            .unwrap()
            .session;
        let indices: Vec<u32> = removed.exercises[0].sets.iter().map(|s| s.order_index).collect();
        assert_eq!(indices, vec![0, 1]);

        let target = removed.exercises[0].sets[1].id;
        let change = SetUpdate {
            weight: Some(70.0),
            reps: Some(6),
            rest_time_secs: Some(Some(120)),
            is_warmup: None,
        };
        let updated = manager.update_set(exercise_id, target, change).await.unwrap().session;
        let set = updated.exercises[0].set(target).unwrap();
        assert_eq!((set.weight, set.reps, set.rest_time_secs), (70.0, 6, Some(120)));

        let bulk = manager
            .update_all_sets(exercise_id, Some(80.0), None)
            .await
            .unwrap()
            .session;
        assert!(bulk.exercises[0].sets.iter().all(|s| s.weight == 80.0));
        assert!(manager.update_all_sets(exercise_id, None, None).await.is_err());
    }

    #[tokio::test]
    async fn warmup_sets_go_before_working_sets() {
        let (manager, _) = manager();
        let session = manager.start_session(None, "Push", &plan()).await.unwrap().session;
        let exercise_id = session.exercises[0].id;

        let updated = manager
            .add_warmup_sets(exercise_id, 100.0, &WarmupScheme::default())
            .await
            .unwrap()
            .session;
        let sets = &updated.exercises[0].sets;
        assert_eq!(sets.len(), 5);
        assert!(sets[..3].iter().all(|s| s.is_warmup));
        assert!(sets[3..].iter().all(|s| !s.is_warmup));
        let indices: Vec<u32> = sets.iter().map(|s| s.order_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn reorder_applies_permutation() {
        let (manager, _) = manager();
        let session = manager.start_session(None, "Push", &plan()).await.unwrap().session;
        let ids: Vec<Uuid> = session.exercises.iter().map(|e| e.id).collect();
        let order = vec![ids[2], ids[0], ids[1]];

        let reordered = manager.reorder_exercises(&order).await.unwrap().session;
        let got: Vec<(Uuid, u32)> = reordered
            .exercises
            .iter()
            .map(|e| (e.id, e.order_index))
            .collect();
        assert_eq!(got, vec![(ids[2], 0), (ids[0], 1), (ids[1], 2)]);
    }

    #[tokio::test]
    async fn reorder_rejects_non_permutations() {
        let (manager, _) = manager();
        let session = manager.start_session(None, "Push", &plan()).await.unwrap().session;
        let ids: Vec<Uuid> = session.exercises.iter().map(|e| e.id).collect();

        for bad in [
            vec![ids[0], ids[1]],
            vec![ids[0], ids[0], ids[1]],
            vec![ids[0], ids[1], Uuid::new_v4()],
            vec![ids[0], ids[1], ids[2], ids[2]],
        ] {
            let err = manager.reorder_exercises(&bad).await.unwrap_err();
            assert!(matches!(err, SessionError::InvalidInput(_)));
        }
        assert_eq!(manager.current().await.unwrap(), session);
    }

    #[tokio::test]
    async fn add_exercise_uses_catalog_defaults() {
        let (manager, store) = manager();
        let deadlift = Exercise::new("Deadlift").with_targets(2, 5, 140.0);
        ExerciseCatalog::save(store.as_ref(), &deadlift).await.unwrap();
        manager.start_session(None, "Pull", &plan()).await.unwrap();

        let updated = manager.add_exercise(deadlift.id).await.unwrap().session;
        let added = updated.exercises.last().unwrap();
        assert_eq!(added.exercise_id, deadlift.id);
        assert_eq!(added.order_index, 3);
        assert_eq!(added.sets.len(), 2);
        assert_eq!(added.sets[0].weight, 140.0);

        let err = manager.add_exercise(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, SessionError::ExerciseNotFound(_)));
    }

    #[tokio::test]
    async fn add_exercise_rejects_invalid_catalog_weight() {
        let (manager, store) = manager();
        let dip = Exercise::new("Dip").with_targets(1, 5, -10.0);
        let broken = Exercise::new("Broken").with_targets(1, 5, f64::NAN);
        ExerciseCatalog::save(store.as_ref(), &dip).await.unwrap();
        ExerciseCatalog::save(store.as_ref(), &broken).await.unwrap();
        let session = manager.start_session(None, "Push", &plan()).await.unwrap().session;

        for id in [dip.id, broken.id] {
            let err = manager.add_exercise(id).await.unwrap_err();
            assert!(matches!(err, SessionError::InvalidInput(_)));
        }
        assert_eq!(manager.current().await.unwrap(), session);
    }

    #[tokio::test]
    async fn exercise_notes_and_rest_time() {
        let (manager, _) = manager();
        let session = manager.start_session(None, "Push", &plan()).await.unwrap().session;
        let bench = session.exercises[0].id;

        let noted = manager
            .update_exercise_notes(bench, Some("pause at chest".into()))
            .await
            .unwrap();
        assert_eq!(
            noted.session.exercises[0].notes.as_deref(),
            Some("pause at chest")
        );
        assert_eq!(noted.events, vec![Event::ExerciseUpdated { exercise_id: bench }]);

        // Blank notes clear the field.
        let cleared = manager
            .update_exercise_notes(bench, Some("  ".into()))
            .await
            .unwrap()
            .session;
        assert_eq!(cleared.exercises[0].notes, None);

        manager.pause_session().await.unwrap();
        let rested = manager
            .set_exercise_rest_time(bench, Some(120))
            .await
            .unwrap()
            .session;
        assert_eq!(rested.exercises[0].rest_time_to_next_secs, Some(120));
        let unset = manager.set_exercise_rest_time(bench, None).await.unwrap().session;
        assert_eq!(unset.exercises[0].rest_time_to_next_secs, None);

        let missing = Uuid::new_v4();
        let before = manager.current().await.unwrap();
        assert!(matches!(
            manager.update_exercise_notes(missing, Some("x".into())).await,
            Err(SessionError::ExerciseNotFound(id)) if id == missing
        ));
        assert!(matches!(
            manager.set_exercise_rest_time(missing, Some(60)).await,
            Err(SessionError::ExerciseNotFound(id)) if id == missing
        ));
        assert_eq!(manager.current().await.unwrap(), before);
    }

    #[tokio::test]
    async fn remove_and_finish_exercise() {
        let (manager, _) = manager();
        let session = manager.start_session(None, "Push", &plan()).await.unwrap().session;

        let finished = manager
            .finish_exercise(session.exercises[1].id)
            .await
            .unwrap()
            .session;
        assert!(finished.exercises[1].is_finished);
        assert!(finished.exercises[1].sets.iter().all(|s| !s.completed));

        let removed = manager
            .remove_exercise(session.exercises[0].id)
            .await
            .unwrap()
            .session;
        let indices: Vec<u32> = removed.exercises.iter().map(|e| e.order_index).collect();
        assert_eq!(indices, vec![0, 1]);
    }

    #[tokio::test]
    async fn persistence_failure_keeps_mutation_and_flush_recovers() {
        let repo = Arc::new(FlakyRepository::default());
        let (manager, _) = manager_with(repo.clone());
        let session = manager.start_session(None, "Push", &plan()).await.unwrap().session;

        repo.fail(true);
        let err = manager.pause_session().await.unwrap_err();
        assert!(matches!(err, SessionError::PersistenceFailure(_)));
        assert_eq!(manager.state().await, Some(SessionState::Paused));
        assert!(manager.has_unsaved_changes().await);

        let stored = repo.fetch(session.id).await.unwrap().unwrap();
        assert_eq!(stored.state, SessionState::Active);

        repo.fail(false);
        manager.flush().await.unwrap();
        assert!(!manager.has_unsaved_changes().await);
        let stored = repo.fetch(session.id).await.unwrap().unwrap();
        assert_eq!(stored.state, SessionState::Paused);
    }

    #[tokio::test]
    async fn failed_final_write_holds_completed_session_until_flushed() {
        let repo = Arc::new(FlakyRepository::default());
        let (manager, _) = manager_with(repo.clone());
        let session = manager.start_session(None, "Push", &plan()).await.unwrap().session;

        repo.fail(true);
        assert!(manager.end_session().await.is_err());
        assert_eq!(manager.state().await, Some(SessionState::Completed));

        let err = manager.start_session(None, "Pull", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::InvalidStateTransition {
                current: Some(SessionState::Completed),
                ..
            }
        ));

        repo.fail(false);
        manager.flush().await.unwrap();
        assert!(manager.current().await.is_none());
        let stored = repo.fetch(session.id).await.unwrap().unwrap();
        assert_eq!(stored.state, SessionState::Completed);
        assert!(manager.start_session(None, "Pull", &[]).await.is_ok());
    }

    #[tokio::test]
    async fn discard_drops_held_session() {
        let repo = Arc::new(FlakyRepository::default());
        let (manager, _) = manager_with(repo.clone());
        repo.fail(true);
        assert!(manager.start_session(None, "Push", &plan()).await.is_err());
        assert_eq!(manager.state().await, Some(SessionState::Active));

        let dropped = manager.discard().await.unwrap();
        assert_eq!(dropped.workout_name, "Push");
        assert!(manager.current().await.is_none());
        assert!(repo.fetch_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn discard_aborts_running_health_workout() {
        let repo = Arc::new(FlakyRepository::default());
        let store = Arc::new(InMemoryStore::new());
        let bridge = Arc::new(RecordingBridge::default());
        let manager = SessionManager::new(repo.clone(), store.clone(), store)
            .with_health(bridge.clone(), EnergyModel::default());

        repo.fail(true);
        assert!(manager.start_session(None, "Push", &plan()).await.is_err());
        let dropped = manager.discard().await.unwrap();
        assert_eq!(dropped.health.unwrap().handle, "hk-1");
        assert_eq!(bridge.calls(), vec!["start", "abort"]);
    }

    #[tokio::test]
    async fn discard_after_failed_end_leaves_saved_health_workout() {
        let repo = Arc::new(FlakyRepository::default());
        let store = Arc::new(InMemoryStore::new());
        let bridge = Arc::new(RecordingBridge::default());
        let manager = SessionManager::new(repo.clone(), store.clone(), store)
            .with_health(bridge.clone(), EnergyModel::default());

        manager.start_session(None, "Push", &plan()).await.unwrap();
        repo.fail(true);
        assert!(manager.end_session().await.is_err());
        manager.discard().await.unwrap();
        assert_eq!(bridge.calls(), vec!["start", "end"]);
    }

    #[tokio::test]
    async fn discard_with_failing_bridge_still_drops_session() {
        let repo = Arc::new(FlakyRepository::default());
        let store = Arc::new(InMemoryStore::new());
        let bridge = Arc::new(RecordingBridge::default());
        let manager = SessionManager::new(repo.clone(), store.clone(), store)
            .with_health(bridge.clone(), EnergyModel::default());

        repo.fail(true);
        assert!(manager.start_session(None, "Push", &plan()).await.is_err());
        bridge.failing.store(true, Ordering::SeqCst);
        assert!(manager.discard().await.is_some());
        assert!(manager.current().await.is_none());
    }

    #[test]
    fn health_failure_escalates_on_request() {
        assert!(HealthSync::Synced.into_result().is_ok());
        assert!(HealthSync::NotRequested.into_result().is_ok());
        let err = HealthSync::Failed(HealthError::NotAuthorized)
            .into_result()
            .unwrap_err();
        assert!(matches!(
            err,
            SessionError::HealthBridgeFailure(HealthError::NotAuthorized)
        ));
    }

    #[tokio::test]
    async fn health_bridge_is_forwarded_and_energy_imported() {
        let store = Arc::new(InMemoryStore::new());
        let bridge = Arc::new(RecordingBridge::default());
        let manager = SessionManager::new(store.clone(), store.clone(), store.clone())
            .with_health(bridge.clone(), EnergyModel::default());

        let started = manager.start_session(None, "Push", &plan()).await.unwrap();
        assert_eq!(started.health, HealthSync::Synced);
        assert_eq!(started.session.health.as_ref().unwrap().handle, "hk-1");
        manager.pause_session().await.unwrap();
        manager.resume_session().await.unwrap();
        let ended = manager.end_session().await.unwrap();

        assert_eq!(bridge.calls(), vec!["start", "pause", "resume", "end"]);
        let link = ended.session.health.unwrap();
        assert_eq!(link.active_energy_kcal, Some(321.0));
        assert_eq!(link.metadata.get("source").map(String::as_str), Some("watch"));
        assert_eq!(link.metadata.get("workout_name").map(String::as_str), Some("Push"));
    }

    #[tokio::test]
    async fn health_failures_never_block_local_progress() {
        let store = Arc::new(InMemoryStore::new());
        let bridge = Arc::new(RecordingBridge::default());
        let manager = SessionManager::new(store.clone(), store.clone(), store.clone())
            .with_health(bridge.clone(), EnergyModel::default());

        let started = manager.start_session(None, "Push", &plan()).await.unwrap();
        assert_eq!(started.health, HealthSync::Synced);

        bridge.failing.store(true, Ordering::SeqCst);
        let paused = manager.pause_session().await.unwrap();
        assert_eq!(paused.health, HealthSync::Failed(HealthError::Unavailable));
        assert_eq!(paused.session.state, SessionState::Paused);

        let ended = manager.end_session().await.unwrap();
        assert!(matches!(ended.health, HealthSync::Failed(_)));
        assert_eq!(ended.session.state, SessionState::Completed);
        let stored = SessionRepository::fetch(store.as_ref(), ended.session.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.state, SessionState::Completed);
    }

    #[tokio::test]
    async fn failed_health_start_still_starts_session() {
        let store = Arc::new(InMemoryStore::new());
        let bridge = Arc::new(RecordingBridge::default());
        bridge.failing.store(true, Ordering::SeqCst);
        let manager = SessionManager::new(store.clone(), store.clone(), store.clone())
            .with_health(bridge.clone(), EnergyModel::default());

        let started = manager.start_session(None, "Push", &plan()).await.unwrap();
        assert!(matches!(started.health, HealthSync::Failed(_)));
        assert!(started.session.health.is_none());

        // Without a linked health workout nothing is forwarded later.
        let paused = manager.pause_session().await.unwrap();
        assert_eq!(paused.health, HealthSync::NotRequested);
        assert_eq!(bridge.calls(), vec!["start"]);
    }

    #[tokio::test]
    async fn restore_adopts_in_progress_session() {
        let store = Arc::new(InMemoryStore::new());
        let first = SessionManager::new(store.clone(), store.clone(), store.clone());
        let started = first.start_session(None, "Push", &plan()).await.unwrap().session;
        first.pause_session().await.unwrap();

        let second = SessionManager::new(store.clone(), store.clone(), store.clone());
        let restored = second.restore().await.unwrap().unwrap();
        assert_eq!(restored.session.id, started.id);
        assert_eq!(restored.session.state, SessionState::Paused);

        second.resume_session().await.unwrap();
        second.end_session().await.unwrap();
        let third = SessionManager::new(store.clone(), store.clone(), store.clone());
        assert!(third.restore().await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_mutations_are_serialised() {
        let (manager, store) = manager();
        let planned = vec![TemplateExercise::new(Uuid::new_v4(), "Squat", 20, 5, 100.0)];
        let session = manager.start_session(None, "Legs", &planned).await.unwrap().session;
        let manager = Arc::new(manager);
        let exercise = session.exercises[0].clone();

        let mut handles = Vec::new();
        for set in exercise.sets.iter() {
            let manager = manager.clone();
            let (exercise_id, set_id) = (exercise.id, set.id);
            handles.push(tokio::spawn(async move {
                manager.complete_set(exercise_id, set_id, None, None).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let current = manager.current().await.unwrap();
        assert!(current.exercises[0].sets.iter().all(|s| s.completed));
        assert!(current.exercises[0].is_finished);
        let stored = SessionRepository::fetch(store.as_ref(), session.id).await.unwrap();
        assert_eq!(stored, Some(current));
    }
}
