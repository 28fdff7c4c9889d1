use clap::Subcommand;
use ironlog_core::{Exercise, ExerciseCatalog};

use super::{print_json, App, CliResult};

#[derive(Subcommand)]
pub enum ExerciseAction {
    /// Add an exercise to the catalog
    Add {
        name: String,
        /// Default number of sets (defaults to session.default_target_sets)
        #[arg(long)]
        sets: Option<u32>,
        /// Default reps per set (defaults to session.default_target_reps)
        #[arg(long)]
        reps: Option<u32>,
        /// Default working weight
        #[arg(long, default_value = "0")]
        weight: f64,
        /// Rest after the exercise in seconds
        #[arg(long)]
        rest: Option<u32>,
    },
    /// List the catalog
    List,
}

pub async fn run(action: ExerciseAction) -> CliResult {
    let app = App::open()?;
    let store = app.store.as_ref();

    match action {
        ExerciseAction::Add {
            name,
            sets,
            reps,
            weight,
            rest,
        } => {
            if name.trim().is_empty() {
                return Err("exercise name is empty".into());
            }
            if !weight.is_finite() || weight < 0.0 {
                return Err("weight must be non-negative".into());
            }
            let mut exercise = Exercise::new(name.trim()).with_targets(
                sets.unwrap_or(app.config.session.default_target_sets),
                reps.unwrap_or(app.config.session.default_target_reps),
                weight,
            );
            exercise.default_rest_secs = rest;
            ExerciseCatalog::save(store, &exercise).await?;
            print_json(&exercise)?;
        }
        ExerciseAction::List => {
            let exercises = ExerciseCatalog::fetch_all(store).await?;
            print_json(&exercises)?;
        }
    }
    Ok(())
}
