mod manager;
mod model;

pub use manager::{HealthSync, SessionManager, SessionUpdate, SetUpdate};
pub use model::{HealthLink, SessionExercise, SessionSet, SessionState, WorkoutSession};
