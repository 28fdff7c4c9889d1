use std::time::Duration;

use chrono::Utc;
use clap::Subcommand;
use ironlog_core::{
    ExerciseCatalog, HealthSync, SessionManager, SessionUpdate, SetUpdate, TemplateExercise,
};
use serde_json::json;
use uuid::Uuid;

use super::{print_json, rest, App, CliResult};

#[derive(Subcommand)]
pub enum SessionAction {
    /// Start a session from a saved workout or as an ad-hoc session
    Start {
        /// Workout template to start from
        #[arg(long, conflicts_with_all = ["name", "exercise"])]
        workout: Option<Uuid>,
        /// Name for an ad-hoc session
        #[arg(long, default_value = "Quick Workout")]
        name: String,
        /// Catalog exercise to include (repeatable)
        #[arg(long)]
        exercise: Vec<Uuid>,
    },
    /// Pause the active session
    Pause,
    /// Resume the paused session
    Resume,
    /// Finish the session and record it in history
    End,
    /// Abandon the session
    Cancel,
    /// Print the in-progress session as JSON
    Status,
    /// Mark a set as done, optionally recording what was actually lifted
    CompleteSet {
        exercise: Uuid,
        set: Uuid,
        #[arg(long)]
        weight: Option<f64>,
        #[arg(long)]
        reps: Option<u32>,
        /// Do not start the rest timer
        #[arg(long)]
        no_rest: bool,
    },
    /// Append a set to an exercise
    AddSet {
        exercise: Uuid,
        #[arg(long)]
        weight: Option<f64>,
        #[arg(long)]
        reps: Option<u32>,
        #[arg(long)]
        warmup: bool,
    },
    /// Remove a set from an exercise
    RemoveSet { exercise: Uuid, set: Uuid },
    /// Edit one set
    UpdateSet {
        exercise: Uuid,
        set: Uuid,
        #[arg(long)]
        weight: Option<f64>,
        #[arg(long)]
        reps: Option<u32>,
        /// Rest after this set in seconds
        #[arg(long, conflicts_with = "clear_rest")]
        rest: Option<u32>,
        /// Remove the per-set rest time
        #[arg(long)]
        clear_rest: bool,
        /// Mark (true) or unmark (false) as a warmup set
        #[arg(long)]
        warmup: Option<bool>,
    },
    /// Apply weight and/or reps to every set of an exercise
    UpdateSets {
        exercise: Uuid,
        #[arg(long)]
        weight: Option<f64>,
        #[arg(long)]
        reps: Option<u32>,
    },
    /// Insert a warmup ramp ahead of an exercise's working sets
    Warmup {
        exercise: Uuid,
        /// Working weight (defaults to the first working set's weight)
        #[arg(long)]
        weight: Option<f64>,
    },
    /// Add a catalog exercise to the session
    AddExercise { catalog_id: Uuid },
    /// Remove an exercise from the session
    RemoveExercise { exercise: Uuid },
    /// Mark an exercise as finished
    FinishExercise { exercise: Uuid },
    /// Set or clear an exercise's notes
    Notes { exercise: Uuid, text: Option<String> },
    /// Set or clear the rest time after an exercise
    RestTime { exercise: Uuid, seconds: Option<u32> },
    /// Reorder exercises; every exercise id must appear exactly once
    Reorder {
        #[arg(required = true)]
        order: Vec<Uuid>,
    },
}

fn print_update(update: &SessionUpdate) -> CliResult {
    let health = match &update.health {
        HealthSync::NotRequested => None,
        HealthSync::Synced => Some("synced".to_string()),
        HealthSync::Failed(e) => Some(format!("failed: {e}")),
    };
    print_json(&json!({
        "session": update.session,
        "events": update.events,
        "health": health,
    }))
}

async fn start(
    app: &App,
    manager: &SessionManager,
    workout: Option<Uuid>,
    name: &str,
    exercises: &[Uuid],
) -> Result<SessionUpdate, Box<dyn std::error::Error>> {
    if let Some(id) = workout {
        return Ok(manager.start_from_workout(id).await?);
    }
    let mut planned = Vec::with_capacity(exercises.len());
    for id in exercises {
        let entry = ExerciseCatalog::fetch(app.store.as_ref(), *id)
            .await?
            .ok_or_else(|| format!("exercise not found: {id}"))?;
        planned.push(TemplateExercise::from_exercise(&entry));
    }
    Ok(manager.start_session(None, name, &planned).await?)
}

/// Starts the rest timer after a completed working set. The set's own rest
/// time wins over the exercise's, which wins over the configured default.
fn start_rest(app: &App, update: &SessionUpdate, exercise_id: Uuid, set_id: Uuid) -> CliResult {
    let Some(exercise) = update.session.exercise(exercise_id) else {
        return Ok(());
    };
    let Some(set) = exercise.set(set_id) else {
        return Ok(());
    };
    if set.is_warmup {
        return Ok(());
    }
    let secs = set
        .rest_time_secs
        .or(exercise.rest_time_to_next_secs)
        .unwrap_or(app.config.session.default_rest_secs);
    let mut timer = rest::load_timer(&app.store);
    timer.start(Duration::from_secs(u64::from(secs)));
    rest::save_timer(&app.store, &timer)
}

pub async fn run(action: SessionAction) -> CliResult {
    let app = App::open()?;
    let manager = app.manager().await?;

    let update = match action {
        SessionAction::Start {
            workout,
            name,
            exercise,
        } => start(&app, &manager, workout, &name, &exercise).await?,
        SessionAction::Pause => manager.pause_session().await?,
        SessionAction::Resume => manager.resume_session().await?,
        SessionAction::End => manager.end_session().await?,
        SessionAction::Cancel => manager.cancel_session().await?,
        SessionAction::Status => {
            return match manager.current().await {
                Some(session) => print_json(&json!({
                    "session": session,
                    "elapsed_secs": session.elapsed(Utc::now()).num_seconds(),
                    "total_volume": session.total_volume(),
                    "completed_sets": session.counted_set_count(),
                })),
                None => print_json(&json!({ "session": null })),
            };
        }
        SessionAction::CompleteSet {
            exercise,
            set,
            weight,
            reps,
            no_rest,
        } => {
            let update = manager.complete_set(exercise, set, weight, reps).await?;
            if !no_rest {
                start_rest(&app, &update, exercise, set)?;
            }
            update
        }
        SessionAction::AddSet {
            exercise,
            weight,
            reps,
            warmup,
        } => manager.add_set(exercise, weight, reps, warmup).await?,
        SessionAction::RemoveSet { exercise, set } => manager.remove_set(exercise, set).await?,
        SessionAction::UpdateSet {
            exercise,
            set,
            weight,
            reps,
            rest,
            clear_rest,
            warmup,
        } => {
            let rest_time_secs = if clear_rest { Some(None) } else { rest.map(Some) };
            let change = SetUpdate {
                weight,
                reps,
                rest_time_secs,
                is_warmup: warmup,
            };
            manager.update_set(exercise, set, change).await?
        }
        SessionAction::UpdateSets {
            exercise,
            weight,
            reps,
        } => manager.update_all_sets(exercise, weight, reps).await?,
        SessionAction::Warmup { exercise, weight } => {
            let working = match weight {
                Some(w) => w,
                None => manager
                    .current()
                    .await
                    .and_then(|s| {
                        s.exercise(exercise)
                            .and_then(|e| e.sets.iter().find(|set| !set.is_warmup))
                            .map(|set| set.weight)
                    })
                    .ok_or("no working set to base the warmup on; pass --weight")?,
            };
            manager
                .add_warmup_sets(exercise, working, &app.config.warmup)
                .await?
        }
        SessionAction::AddExercise { catalog_id } => manager.add_exercise(catalog_id).await?,
        SessionAction::RemoveExercise { exercise } => manager.remove_exercise(exercise).await?,
        SessionAction::FinishExercise { exercise } => manager.finish_exercise(exercise).await?,
        SessionAction::Notes { exercise, text } => {
            manager.update_exercise_notes(exercise, text).await?
        }
        SessionAction::RestTime { exercise, seconds } => {
            manager.set_exercise_rest_time(exercise, seconds).await?
        }
        SessionAction::Reorder { order } => manager.reorder_exercises(&order).await?,
    };

    print_update(&update)
}
