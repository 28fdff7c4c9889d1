pub mod config;
pub mod exercise;
pub mod history;
pub mod rest;
pub mod session;
pub mod stats;
pub mod warmup;
pub mod workout;

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use ironlog_core::{Config, HistoryService, SessionManager, SqliteStore};
use serde::Serialize;

use crate::health::LocalHealthStore;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Store and configuration shared by every command.
pub struct App {
    pub store: Arc<SqliteStore>,
    pub config: Config,
}

impl App {
    pub fn open() -> Result<Self, Box<dyn std::error::Error>> {
        let config = Config::load()?;
        let store = Arc::new(SqliteStore::open_default()?);
        Ok(Self { store, config })
    }

    pub fn offset(&self) -> FixedOffset {
        self.config.utc_offset().unwrap_or_else(|| Utc.fix())
    }

    /// Manager with any in-progress session from a previous invocation
    /// already adopted.
    pub async fn manager(&self) -> Result<SessionManager, Box<dyn std::error::Error>> {
        let store = self.store.clone();
        let mut manager = SessionManager::new(store.clone(), store.clone(), store.clone());
        if self.config.health.enabled {
            manager = manager.with_health(
                Arc::new(LocalHealthStore::new(store)),
                self.config.energy_model(),
            );
        }
        manager.restore().await?;
        Ok(manager)
    }

    pub fn history(&self) -> HistoryService {
        HistoryService::new(self.store.clone()).with_offset(self.offset())
    }

    /// Start of `date` in the configured offset.
    pub fn day_start(&self, date: NaiveDate) -> DateTime<Utc> {
        self.local_to_utc(date, NaiveTime::MIN)
    }

    /// Last instant of `date` in the configured offset.
    pub fn day_end(&self, date: NaiveDate) -> DateTime<Utc> {
        let end = NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN);
        self.local_to_utc(date, end)
    }

    fn local_to_utc(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let offset = self.offset();
        offset
            .from_local_datetime(&date.and_time(time))
            .single()
            .map(|local| local.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&date.and_time(time)))
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
