//! services/api/src/adapters/holiday.rs
//!
//! Holiday calendar adapter. When a calendar file is configured it decides
//! holiday classification; without one, Saturdays and Sundays classify as
//! holidays. The classification only affects view/report coloring.

use chrono::NaiveDate;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

use kintai_core::ports::HolidayCalendar;
use kintai_core::time_rules::is_weekend;

pub struct FileHolidayCalendar {
    /// `None` means no external calendar; weekends classify as holidays.
    dates: Option<HashSet<NaiveDate>>,
}

impl FileHolidayCalendar {
    /// Loads a JSON array of ISO dates. An unreadable or malformed file
    /// degrades to weekend-only classification with a warning.
    pub fn from_file(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("holiday calendar {} unreadable ({e}); using weekends only", path.display());
                return Self::weekend_only();
            }
        };
        let entries: Vec<String> = match serde_json::from_str(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("holiday calendar {} malformed ({e}); using weekends only", path.display());
                return Self::weekend_only();
            }
        };
        let mut dates = HashSet::new();
        for entry in entries {
            match entry.parse::<NaiveDate>() {
                Ok(date) => {
                    dates.insert(date);
                }
                Err(_) => warn!("skipping malformed holiday date: {entry}"),
            }
        }
        info!("loaded {} holidays from {}", dates.len(), path.display());
        Self { dates: Some(dates) }
    }

    pub fn weekend_only() -> Self {
        Self { dates: None }
    }
}

impl HolidayCalendar for FileHolidayCalendar {
    fn is_holiday(&self, date: NaiveDate) -> bool {
        match &self.dates {
            Some(dates) => dates.contains(&date),
            None => is_weekend(date),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn weekend_only_classification() {
        let calendar = FileHolidayCalendar::weekend_only();
        let saturday = NaiveDate::from_ymd_opt(2025, 7, 5).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2025, 7, 8).unwrap();
        assert!(calendar.is_holiday(saturday));
        assert!(!calendar.is_holiday(tuesday));
    }

    #[test]
    fn calendar_file_takes_over_classification() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        // Marine Day 2025; the list replaces the weekend rule entirely.
        write!(file, r#"["2025-07-21", "not-a-date"]"#).unwrap();

        let calendar = FileHolidayCalendar::from_file(file.path());
        let marine_day = NaiveDate::from_ymd_opt(2025, 7, 21).unwrap();
        let saturday = NaiveDate::from_ymd_opt(2025, 7, 5).unwrap();
        assert!(calendar.is_holiday(marine_day));
        assert!(!calendar.is_holiday(saturday));
    }

    #[test]
    fn missing_file_degrades_to_weekends() {
        let calendar = FileHolidayCalendar::from_file(Path::new("/nonexistent/holidays.json"));
        let sunday = NaiveDate::from_ymd_opt(2025, 7, 6).unwrap();
        assert!(calendar.is_holiday(sunday));
    }
}
