//! Session history.
//!
//! History is the set of completed sessions. In-progress and cancelled
//! sessions never appear here or in any statistic derived from it.

mod grouping;

pub use grouping::{group_by_month, MonthGroup};

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Months, Offset, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::RepositoryError;
use crate::repository::SessionRepository;
use crate::session::{SessionState, WorkoutSession};
use crate::stats::{ExerciseProgress, StatisticsPeriod, WorkoutStatistics};

/// Time window or workout selection applied to history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryFilter {
    /// The `limit` most recent sessions.
    Recent { limit: usize },
    LastWeek,
    LastMonth,
    LastThreeMonths,
    LastYear,
    All,
    /// Sessions that started within `start..=end`.
    DateRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    ForWorkout { workout_id: Uuid },
}

impl HistoryFilter {
    /// Earliest start date admitted by a rolling window.
    fn window_start(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            HistoryFilter::LastWeek => Some(now - Duration::days(7)),
            HistoryFilter::LastMonth => now.checked_sub_months(Months::new(1)),
            HistoryFilter::LastThreeMonths => now.checked_sub_months(Months::new(3)),
            HistoryFilter::LastYear => now.checked_sub_months(Months::new(12)),
            _ => None,
        }
    }

    pub fn matches(&self, session: &WorkoutSession, now: DateTime<Utc>) -> bool {
        match self {
            HistoryFilter::Recent { .. } | HistoryFilter::All => true,
            HistoryFilter::DateRange { start, end } => {
                session.start_date >= *start && session.start_date <= *end
            }
            HistoryFilter::ForWorkout { workout_id } => session.workout_id == Some(*workout_id),
            rolling => rolling
                .window_start(now)
                .map_or(true, |from| session.start_date >= from),
        }
    }

    /// Completed sessions passing the filter, most recent first.
    pub fn apply(&self, sessions: &[WorkoutSession], now: DateTime<Utc>) -> Vec<WorkoutSession> {
        let mut matching: Vec<WorkoutSession> = sessions
            .iter()
            .filter(|s| s.state == SessionState::Completed)
            .filter(|s| self.matches(s, now))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.start_date.cmp(&a.start_date));
        if let HistoryFilter::Recent { limit } = self {
            matching.truncate(*limit);
        }
        matching
    }
}

/// Read-side view over a session repository.
///
/// Every query fetches a fresh snapshot; nothing is cached between calls.
pub struct HistoryService {
    sessions: Arc<dyn SessionRepository>,
    offset: FixedOffset,
}

impl HistoryService {
    pub fn new(sessions: Arc<dyn SessionRepository>) -> Self {
        Self {
            sessions,
            offset: Utc.fix(),
        }
    }

    /// Calendar days and months are computed in this offset.
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.offset = offset;
        self
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// # Errors
    /// Propagates the repository's `FetchFailed`.
    pub async fn sessions(
        &self,
        filter: HistoryFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<WorkoutSession>, RepositoryError> {
        let all = self.sessions.fetch_all().await?;
        let matching = filter.apply(&all, now);
        debug!(?filter, total = all.len(), matching = matching.len(), "history query");
        Ok(matching)
    }

    /// # Errors
    /// Propagates the repository's `FetchFailed`.
    pub async fn grouped(
        &self,
        filter: HistoryFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<MonthGroup>, RepositoryError> {
        let sessions = self.sessions(filter, now).await?;
        Ok(group_by_month(sessions, self.offset))
    }

    /// # Errors
    /// Propagates the repository's `FetchFailed`.
    pub async fn statistics(
        &self,
        period: StatisticsPeriod,
        now: DateTime<Utc>,
    ) -> Result<WorkoutStatistics, RepositoryError> {
        let all = self.sessions.fetch_all().await?;
        Ok(WorkoutStatistics::compute(&all, period, now, self.offset))
    }

    /// # Errors
    /// Propagates the repository's `FetchFailed`.
    pub async fn exercise_progress(
        &self,
        filter: HistoryFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<ExerciseProgress>, RepositoryError> {
        let sessions = self.sessions(filter, now).await?;
        Ok(ExerciseProgress::collect(&sessions))
    }
}
