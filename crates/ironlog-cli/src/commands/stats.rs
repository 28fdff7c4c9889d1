use chrono::{NaiveDate, Utc};
use clap::{Subcommand, ValueEnum};
use ironlog_core::StatisticsPeriod;
use serde_json::json;

use super::history::{FilterArgs, Range};
use super::{print_json, App, CliResult};

#[derive(Clone, Copy, ValueEnum)]
pub enum Period {
    Week,
    Month,
    Year,
    All,
}

#[derive(Subcommand)]
pub enum StatsAction {
    /// Totals, streaks and most frequent workout for a period
    Summary {
        #[arg(long, value_enum, default_value = "week")]
        period: Period,
        /// First day of a custom period (YYYY-MM-DD)
        #[arg(long, requires = "to")]
        from: Option<NaiveDate>,
        /// Last day of a custom period (YYYY-MM-DD)
        #[arg(long, requires = "from")]
        to: Option<NaiveDate>,
    },
    /// Per-exercise volume, best set and estimated one-rep max
    Progress {
        #[command(flatten)]
        filter: FilterArgs,
    },
}

pub async fn run(action: StatsAction) -> CliResult {
    let app = App::open()?;
    let history = app.history();
    let now = Utc::now();

    match action {
        StatsAction::Summary { period, from, to } => {
            let period = match (from, to) {
                (Some(from), Some(to)) => {
                    if from > to {
                        return Err(format!("--from {from} is after --to {to}").into());
                    }
                    StatisticsPeriod::Custom {
                        start: app.day_start(from),
                        end: app.day_end(to),
                    }
                }
                _ => match period {
                    Period::Week => StatisticsPeriod::Week,
                    Period::Month => StatisticsPeriod::Month,
                    Period::Year => StatisticsPeriod::Year,
                    Period::All => StatisticsPeriod::AllTime,
                },
            };
            let stats = history.statistics(period, now).await?;
            print_json(&json!({
                "statistics": stats,
                "average_duration_secs": stats.average_duration_secs(),
            }))?;
        }
        StatsAction::Progress { filter } => {
            let filter = filter.to_filter(&app, Range::All)?;
            print_json(&history.exercise_progress(filter, now).await?)?;
        }
    }
    Ok(())
}
