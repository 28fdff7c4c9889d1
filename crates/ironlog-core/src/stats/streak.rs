//! Consecutive-day streaks.

use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Calendar date of `at` as seen in `offset`.
pub fn calendar_day(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streaks {
    /// Run of active days ending today, or ending yesterday when today has
    /// no session yet. Zero otherwise: an older active day does not count
    /// as the anchor, so a streak that ended two or more days ago is over.
    pub current: u32,
    pub longest: u32,
}

impl Streaks {
    /// Computes streaks from the set of active days.
    pub fn from_days(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> Self {
        let mut longest = 0u32;
        let mut run = 0u32;
        let mut previous: Option<NaiveDate> = None;

        for &day in days {
            run = match previous {
                Some(prev) if prev.succ_opt() == Some(day) => run + 1,
                _ => 1,
            };
            longest = longest.max(run);
            previous = Some(day);
        }

        let anchor = if days.contains(&today) {
            Some(today)
        } else {
            today.pred_opt().filter(|yesterday| days.contains(yesterday))
        };

        let mut current = 0u32;
        let mut cursor = anchor;
        while let Some(day) = cursor.filter(|d| days.contains(d)) {
            current += 1;
            cursor = day.pred_opt();
        }

        Self { current, longest }
    }
}
