use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod health;

#[derive(Parser)]
#[command(name = "ironlog", version, about = "ironlog workout tracker CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Live workout session control
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },
    /// Workout template management
    Workout {
        #[command(subcommand)]
        action: commands::workout::WorkoutAction,
    },
    /// Exercise catalog management
    Exercise {
        #[command(subcommand)]
        action: commands::exercise::ExerciseAction,
    },
    /// Completed session history
    History {
        #[command(subcommand)]
        action: commands::history::HistoryAction,
    },
    /// Workout statistics
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Rest timer between sets
    Rest {
        #[command(subcommand)]
        action: commands::rest::RestAction,
    },
    /// Warmup ramp calculator
    Warmup {
        #[command(subcommand)]
        action: commands::warmup::WarmupAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

/// Logs go to stderr so stdout stays machine-readable JSON.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("IRONLOG_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Session { action } => commands::session::run(action).await,
        Commands::Workout { action } => commands::workout::run(action).await,
        Commands::Exercise { action } => commands::exercise::run(action).await,
        Commands::History { action } => commands::history::run(action).await,
        Commands::Stats { action } => commands::stats::run(action).await,
        Commands::Rest { action } => commands::rest::run(action),
        Commands::Warmup { action } => commands::warmup::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
