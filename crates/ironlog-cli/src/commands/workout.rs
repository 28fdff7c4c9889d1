use clap::Subcommand;
use ironlog_core::{ExerciseCatalog, TemplateExercise, WorkoutRepository, WorkoutTemplate};
use uuid::Uuid;

use super::{print_json, App, CliResult};

#[derive(Subcommand)]
pub enum WorkoutAction {
    /// Create a workout from catalog exercises
    Create {
        name: String,
        /// Catalog exercise to include, in order (repeatable)
        #[arg(long)]
        exercise: Vec<Uuid>,
    },
    /// List saved workouts
    List,
    /// Show one workout
    Show { id: Uuid },
    /// Delete a workout
    Delete { id: Uuid },
}

pub async fn run(action: WorkoutAction) -> CliResult {
    let app = App::open()?;
    let store = app.store.as_ref();

    match action {
        WorkoutAction::Create { name, exercise } => {
            let mut planned = Vec::with_capacity(exercise.len());
            for id in exercise {
                let entry = ExerciseCatalog::fetch(store, id)
                    .await?
                    .ok_or_else(|| format!("exercise not found: {id}"))?;
                planned.push(TemplateExercise::from_exercise(&entry));
            }
            let template = WorkoutTemplate::new(name, planned)?;
            WorkoutRepository::save(store, &template).await?;
            print_json(&template)?;
        }
        WorkoutAction::List => {
            let workouts = WorkoutRepository::fetch_all(store).await?;
            print_json(&workouts)?;
        }
        WorkoutAction::Show { id } => {
            let workout = WorkoutRepository::fetch(store, id)
                .await?
                .ok_or_else(|| format!("workout not found: {id}"))?;
            print_json(&workout)?;
        }
        WorkoutAction::Delete { id } => {
            WorkoutRepository::delete(store, id).await?;
            println!("workout deleted: {id}");
        }
    }
    Ok(())
}
