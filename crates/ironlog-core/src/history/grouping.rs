//! Calendar-month grouping for history lists.

use chrono::{Datelike, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::session::WorkoutSession;

/// Sessions that started in one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthGroup {
    pub year: i32,
    pub month: u32,
    /// e.g. "January 2025"
    pub label: String,
    /// Most recent first.
    pub sessions: Vec<WorkoutSession>,
}

/// Groups sessions by the calendar month of their start date in `offset`.
///
/// Months come newest first and sessions inside a month are newest first,
/// whatever the input order.
pub fn group_by_month(mut sessions: Vec<WorkoutSession>, offset: FixedOffset) -> Vec<MonthGroup> {
    sessions.sort_by(|a, b| b.start_date.cmp(&a.start_date));

    let mut groups: Vec<MonthGroup> = Vec::new();
    for session in sessions {
        let local = session.start_date.with_timezone(&offset);
        let (year, month) = (local.year(), local.month());
        match groups.last_mut() {
            Some(group) if group.year == year && group.month == month => {
                group.sessions.push(session);
            }
            _ => groups.push(MonthGroup {
                year,
                month,
                label: month_label(year, month),
                sessions: vec![session],
            }),
        }
    }
    groups
}

fn month_label(year: i32, month: u32) -> String {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|first| first.format("%B %Y").to_string())
        .unwrap_or_else(|| format!("{year}-{month:02}"))
}
