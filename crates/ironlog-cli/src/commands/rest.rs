use std::time::Duration;

use clap::Subcommand;
use ironlog_core::{Config, RestTimer, SqliteStore};

use super::{print_json, CliResult};

const TIMER_KEY: &str = "rest_timer";

#[derive(Subcommand)]
pub enum RestAction {
    /// Start a rest period (defaults to session.default_rest_secs)
    Start {
        /// Rest length in seconds
        seconds: Option<u64>,
    },
    /// Pause the running rest period
    Pause,
    /// Resume a paused rest period
    Resume,
    /// End the rest period early
    Skip,
    /// Add or remove rest time
    Adjust {
        /// Seconds to add (negative to remove)
        #[arg(allow_hyphen_values = true)]
        delta: i64,
    },
    /// Print current rest timer state as JSON
    Status,
}

pub fn load_timer(store: &SqliteStore) -> RestTimer {
    if let Ok(Some(json)) = store.kv_get(TIMER_KEY) {
        if let Ok(timer) = serde_json::from_str::<RestTimer>(&json) {
            return timer;
        }
    }
    RestTimer::new()
}

pub fn save_timer(store: &SqliteStore, timer: &RestTimer) -> CliResult {
    let json = serde_json::to_string(timer)?;
    store.kv_set(TIMER_KEY, &json)?;
    Ok(())
}

pub fn run(action: RestAction) -> CliResult {
    let config = Config::load()?;
    let store = SqliteStore::open_default()?;
    let mut timer = load_timer(&store);
    // Bring the countdown up to date before acting on it.
    let completed = timer.tick();

    let event = match action {
        RestAction::Start { seconds } => {
            let secs = seconds.unwrap_or(u64::from(config.session.default_rest_secs));
            timer.start(Duration::from_secs(secs))
        }
        RestAction::Pause => timer.pause(),
        RestAction::Resume => timer.resume(),
        RestAction::Skip => timer.skip(),
        RestAction::Adjust { delta } => timer.adjust(delta),
        RestAction::Status => completed,
    };

    match event {
        Some(event) => print_json(&event)?,
        None => print_json(&timer.snapshot())?,
    }

    save_timer(&store, &timer)
}
