use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, FixedOffset, Months, Utc};
use serde::{Deserialize, Serialize};

use super::streak::{calendar_day, Streaks};
use crate::session::{SessionState, WorkoutSession};

/// Window the statistics cover, measured back from "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatisticsPeriod {
    Week,
    Month,
    Year,
    AllTime,
    Custom {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl StatisticsPeriod {
    pub fn contains(&self, start_date: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let from = match self {
            StatisticsPeriod::Week => Some(now - Duration::days(7)),
            StatisticsPeriod::Month => now.checked_sub_months(Months::new(1)),
            StatisticsPeriod::Year => now.checked_sub_months(Months::new(12)),
            StatisticsPeriod::AllTime => None,
            StatisticsPeriod::Custom { start, end } => {
                return start_date >= *start && start_date <= *end;
            }
        };
        from.map_or(true, |from| start_date >= from)
    }
}

/// Aggregate metrics for one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutStatistics {
    pub period: StatisticsPeriod,
    pub total_workouts: u32,
    pub total_duration_secs: i64,
    /// Σ weight × reps over completed working sets.
    pub total_volume: f64,
    pub total_sets: u32,
    pub total_reps: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub active_days: u32,
    pub most_frequent_workout: Option<String>,
}

impl WorkoutStatistics {
    pub fn empty(period: StatisticsPeriod) -> Self {
        Self {
            period,
            total_workouts: 0,
            total_duration_secs: 0,
            total_volume: 0.0,
            total_sets: 0,
            total_reps: 0,
            current_streak: 0,
            longest_streak: 0,
            active_days: 0,
            most_frequent_workout: None,
        }
    }

    /// Computes statistics over the completed sessions in `period`.
    /// Calendar days (for streaks and active days) are taken in `offset`.
    pub fn compute(
        sessions: &[WorkoutSession],
        period: StatisticsPeriod,
        now: DateTime<Utc>,
        offset: FixedOffset,
    ) -> Self {
        let mut included: Vec<&WorkoutSession> = sessions
            .iter()
            .filter(|s| s.state == SessionState::Completed)
            .filter(|s| period.contains(s.start_date, now))
            .collect();
        if included.is_empty() {
            return Self::empty(period);
        }
        included.sort_by_key(|s| s.start_date);

        let mut stats = Self::empty(period);
        let mut days = BTreeSet::new();
        for session in &included {
            stats.total_workouts += 1;
            if let Some(duration) = session.duration() {
                stats.total_duration_secs += duration.num_seconds().max(0);
            }
            stats.total_volume += session.total_volume();
            stats.total_sets += session.counted_set_count();
            stats.total_reps += session.counted_reps();
            days.insert(calendar_day(session.start_date, offset));
        }

        let streaks = Streaks::from_days(&days, calendar_day(now, offset));
        stats.current_streak = streaks.current;
        stats.longest_streak = streaks.longest;
        stats.active_days = days.len() as u32;
        stats.most_frequent_workout = most_frequent(&included);
        stats
    }

    pub fn average_duration_secs(&self) -> i64 {
        if self.total_workouts == 0 {
            return 0;
        }
        self.total_duration_secs / i64::from(self.total_workouts)
    }
}

/// Highest count wins; ties go to the name seen first in `chronological`.
fn most_frequent(chronological: &[&WorkoutSession]) -> Option<String> {
    let mut counts: HashMap<&str, (u32, usize)> = HashMap::new();
    for (index, session) in chronological.iter().enumerate() {
        counts
            .entry(session.workout_name.as_str())
            .or_insert((0, index))
            .0 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(name, _)| name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionExercise, SessionSet};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn completed(name: &str, y: i32, m: u32, d: u32) -> WorkoutSession {
        let start = Utc.with_ymd_and_hms(y, m, d, 18, 0, 0).unwrap();
        let mut session = WorkoutSession::new(None, name, start);
        session.state = SessionState::Completed;
        session.end_date = Some(start + Duration::minutes(60));
        session
    }

    fn done(weight: f64, reps: u32, warmup: bool) -> SessionSet {
        let mut set = if warmup {
            SessionSet::warmup(0, weight, reps)
        } else {
            SessionSet::new(0, weight, reps)
        };
        set.mark_completed(Utc::now());
        set
    }

    fn today() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 4, 20, 0, 0).unwrap()
    }

    #[test]
    fn empty_input_yields_zeroes() {
        let stats = WorkoutStatistics::compute(&[], StatisticsPeriod::AllTime, today(), utc());
        assert_eq!(stats.total_workouts, 0);
        assert_eq!(stats.total_volume, 0.0);
        assert_eq!(stats.current_streak, 0);
        assert_eq!(stats.most_frequent_workout, None);
        assert_eq!(stats.average_duration_secs(), 0);
    }

    #[test]
    fn volume_excludes_warmups() {
        let mut session = completed("Push", 2025, 1, 4);
        let mut exercise = SessionExercise::new(Uuid::new_v4(), "Bench Press", 0);
        exercise.sets = vec![done(20.0, 5, true), done(60.0, 10, false), done(40.0, 5, false)];
        session.exercises.push(exercise);

        let stats =
            WorkoutStatistics::compute(&[session], StatisticsPeriod::AllTime, today(), utc());
        assert_eq!(stats.total_volume, 800.0);
        assert_eq!(stats.total_sets, 2);
        assert_eq!(stats.total_reps, 15);
    }

    #[test]
    fn streak_scenario_with_gap() {
        let sessions = vec![
            completed("A", 2025, 1, 1),
            completed("B", 2025, 1, 2),
            completed("C", 2025, 1, 4),
        ];
        let stats =
            WorkoutStatistics::compute(&sessions, StatisticsPeriod::AllTime, today(), utc());
        assert_eq!(stats.current_streak, 1);
        assert_eq!(stats.longest_streak, 2);
        assert_eq!(stats.active_days, 3);
        assert_eq!(stats.total_duration_secs, 3 * 3600);
    }

    #[test]
    fn same_day_sessions_count_once_for_days() {
        let sessions = vec![completed("A", 2025, 1, 4), completed("B", 2025, 1, 4)];
        let stats =
            WorkoutStatistics::compute(&sessions, StatisticsPeriod::AllTime, today(), utc());
        assert_eq!(stats.total_workouts, 2);
        assert_eq!(stats.active_days, 1);
        assert_eq!(stats.current_streak, 1);
    }

    #[test]
    fn most_frequent_tie_goes_to_earliest() {
        let sessions = vec![
            completed("Legs", 2025, 1, 3),
            completed("Push", 2025, 1, 1),
            completed("Pull", 2025, 1, 2),
            completed("Pull", 2025, 1, 4),
            completed("Push", 2025, 1, 4),
        ];
        let stats =
            WorkoutStatistics::compute(&sessions, StatisticsPeriod::AllTime, today(), utc());
        assert_eq!(stats.most_frequent_workout.as_deref(), Some("Push"));
    }

    #[test]
    fn period_and_state_filter() {
        let mut cancelled = completed("Cancelled", 2025, 1, 3);
        cancelled.state = SessionState::Cancelled;
        let sessions = vec![
            completed("Old", 2024, 6, 1),
            completed("Recent", 2025, 1, 2),
            cancelled,
        ];
        let week = WorkoutStatistics::compute(&sessions, StatisticsPeriod::Week, today(), utc());
        assert_eq!(week.total_workouts, 1);
        let year = WorkoutStatistics::compute(&sessions, StatisticsPeriod::Year, today(), utc());
        assert_eq!(year.total_workouts, 2);

        let custom = StatisticsPeriod::Custom {
            start: Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap(),
        };
        let stats = WorkoutStatistics::compute(&sessions, custom, today(), utc());
        assert_eq!(stats.most_frequent_workout.as_deref(), Some("Old"));
    }
}
