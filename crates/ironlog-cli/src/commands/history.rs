use chrono::{NaiveDate, Utc};
use clap::{Args, Subcommand, ValueEnum};
use ironlog_core::HistoryFilter;
use uuid::Uuid;

use super::{print_json, App, CliResult};

#[derive(Clone, Copy, ValueEnum)]
pub enum Range {
    Recent,
    Week,
    Month,
    ThreeMonths,
    Year,
    All,
}

/// History selection shared by `history` and `stats progress`.
///
/// `--workout` wins over `--from/--to`, which win over `--range`.
#[derive(Args)]
pub struct FilterArgs {
    /// Rolling window
    #[arg(long, value_enum)]
    range: Option<Range>,
    /// Session count for `--range recent` (defaults to history.recent_limit)
    #[arg(long)]
    limit: Option<usize>,
    /// First day of a date range (YYYY-MM-DD)
    #[arg(long, requires = "to")]
    from: Option<NaiveDate>,
    /// Last day of a date range (YYYY-MM-DD)
    #[arg(long, requires = "from")]
    to: Option<NaiveDate>,
    /// Only sessions started from this workout
    #[arg(long)]
    workout: Option<Uuid>,
}

impl FilterArgs {
    pub fn to_filter(&self, app: &App, default: Range) -> Result<HistoryFilter, String> {
        if let Some(workout_id) = self.workout {
            return Ok(HistoryFilter::ForWorkout { workout_id });
        }
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from > to {
                return Err(format!("--from {from} is after --to {to}"));
            }
            return Ok(HistoryFilter::DateRange {
                start: app.day_start(from),
                end: app.day_end(to),
            });
        }
        Ok(match self.range.unwrap_or(default) {
            Range::Recent => HistoryFilter::Recent {
                limit: self.limit.unwrap_or(app.config.history.recent_limit),
            },
            Range::Week => HistoryFilter::LastWeek,
            Range::Month => HistoryFilter::LastMonth,
            Range::ThreeMonths => HistoryFilter::LastThreeMonths,
            Range::Year => HistoryFilter::LastYear,
            Range::All => HistoryFilter::All,
        })
    }
}

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List completed sessions, most recent first
    List {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Completed sessions grouped by month
    Grouped {
        #[command(flatten)]
        filter: FilterArgs,
    },
}

pub async fn run(action: HistoryAction) -> CliResult {
    let app = App::open()?;
    let history = app.history();
    let now = Utc::now();

    match action {
        HistoryAction::List { filter } => {
            let filter = filter.to_filter(&app, Range::Recent)?;
            print_json(&history.sessions(filter, now).await?)?;
        }
        HistoryAction::Grouped { filter } => {
            let filter = filter.to_filter(&app, Range::All)?;
            print_json(&history.grouped(filter, now).await?)?;
        }
    }
    Ok(())
}
