//! crates/kintai_core/src/time_rules.rs
//!
//! Pure date/time arithmetic for the attendance domain: the fixed JST
//! offset, the 15-minute punch rounding rule, worked-minutes computation,
//! and calendar-month enumeration. Everything here is deterministic and
//! side-effect free so the rules can be tested without a clock or a store.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Timelike, Utc, Weekday};
use regex::Regex;
use std::sync::OnceLock;

use crate::domain::{AttendanceRecord, MonthlyTotals};

/// "Today" is always computed in UTC+9, independent of server locale.
pub fn jst_offset() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).expect("UTC+9 is a valid offset")
}

pub fn jst_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&jst_offset())
}

/// The current JST calendar date as an ISO `YYYY-MM-DD` string.
pub fn jst_today_string() -> String {
    jst_now().format("%Y-%m-%d").to_string()
}

/// Rounds a wall-clock instant to the nearest 15-minute mark (half-up) and
/// formats it as the `HH:MM` string stored in a punch field.
///
/// Minute mapping: 0-7 -> :00, 8-22 -> :15, 23-37 -> :30, 38-52 -> :45,
/// 53-59 -> :00 of the next hour. Seconds are discarded.
pub fn rounded_punch_time(now: DateTime<FixedOffset>) -> String {
    let rounded = (now.minute() + 7) / 15 * 15;
    let hour_start = now
        .with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .expect("zeroing sub-hour components cannot fail");
    let punch = hour_start + Duration::minutes(i64::from(rounded));
    punch.format("%H:%M").to_string()
}

/// Parses a `HH:MM` string into minutes since midnight. Returns `None` for
/// anything that does not split into two integers; out-of-range hours are
/// accepted as-is, matching the coercion rules of the monthly totals.
pub fn minutes_of(time: &str) -> Option<i64> {
    let (h, m) = time.split_once(':')?;
    let h: i64 = h.trim().parse().ok()?;
    let m: i64 = m.trim().parse().ok()?;
    Some(h * 60 + m)
}

/// The record's break duration in decimal hours; absent, empty, or
/// unparseable values coerce to the 1.0 default.
pub fn break_time_hours(record: &AttendanceRecord) -> f64 {
    record
        .break_time
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .and_then(|s| s.trim().parse::<f64>().ok())
        .unwrap_or(1.0)
}

/// Worked minutes for one day: `(check_out - check_in) - break_time * 60`.
/// Undefined (`None`) when either punch is missing/malformed or the result
/// is negative; undefined days contribute zero to totals and render blank.
pub fn worked_minutes(record: &AttendanceRecord) -> Option<i64> {
    let check_in = record.check_in.as_deref().filter(|s| !s.is_empty())?;
    let check_out = record.check_out.as_deref().filter(|s| !s.is_empty())?;
    let in_min = minutes_of(check_in)?;
    let out_min = minutes_of(check_out)?;
    let worked = out_min - in_min - (break_time_hours(record) * 60.0) as i64;
    (worked >= 0).then_some(worked)
}

/// Sums worked minutes and parseable travel costs over any set of records.
/// Unparseable travel costs are skipped without error.
pub fn monthly_totals<'a, I>(records: I) -> MonthlyTotals
where
    I: IntoIterator<Item = &'a AttendanceRecord>,
{
    let mut totals = MonthlyTotals::default();
    for record in records {
        if let Some(minutes) = worked_minutes(record) {
            totals.worked_minutes += minutes;
        }
        if let Some(cost) = record.travel_cost.as_deref() {
            if !cost.trim().is_empty() {
                if let Ok(cost) = cost.trim().parse::<f64>() {
                    totals.travel_cost += cost;
                }
            }
        }
    }
    totals
}

/// Every calendar day of `(year, month)` in order, handling month lengths,
/// leap years, and the December -> January rollover. `None` for an invalid
/// month number.
pub fn month_days(year: i32, month: u32) -> Option<Vec<NaiveDate>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    Some(
        first
            .iter_days()
            .take_while(|d| d.month() == month)
            .collect(),
    )
}

/// Single-character Japanese weekday abbreviation used by the report.
pub fn weekday_jp(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "月",
        Weekday::Tue => "火",
        Weekday::Wed => "水",
        Weekday::Thu => "木",
        Weekday::Fri => "金",
        Weekday::Sat => "土",
        Weekday::Sun => "日",
    }
}

/// Full English weekday name used by the monthly view payloads.
pub fn weekday_name(date: NaiveDate) -> String {
    date.format("%A").to_string()
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Japanese era label for a report year/month (Reiwa from May 2019,
/// Heisei before).
pub fn wareki_label(year: i32, month: u32) -> String {
    if year > 2019 || (year == 2019 && month >= 5) {
        format!("令和 {}", year - 2018)
    } else {
        format!("平成 {}", year - 1988)
    }
}

/// Usernames are restricted to ASCII alphanumerics and underscore.
pub fn valid_username(username: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("username pattern compiles"))
        .is_match(username)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(check_in: &str, check_out: &str, break_time: Option<&str>) -> AttendanceRecord {
        AttendanceRecord {
            check_in: Some(check_in.to_string()),
            check_out: Some(check_out.to_string()),
            break_time: break_time.map(|s| s.to_string()),
            ..Default::default()
        }
    }

    fn jst(h: u32, m: u32) -> DateTime<FixedOffset> {
        jst_offset()
            .with_ymd_and_hms(2025, 7, 8, h, m, 42)
            .unwrap()
    }

    #[test]
    fn punch_rounds_down_below_eight_minutes() {
        assert_eq!(rounded_punch_time(jst(9, 0)), "09:00");
        assert_eq!(rounded_punch_time(jst(9, 7)), "09:00");
    }

    #[test]
    fn punch_rounds_up_from_eight_minutes() {
        assert_eq!(rounded_punch_time(jst(9, 8)), "09:15");
        assert_eq!(rounded_punch_time(jst(9, 22)), "09:15");
        assert_eq!(rounded_punch_time(jst(9, 23)), "09:30");
        assert_eq!(rounded_punch_time(jst(9, 37)), "09:30");
        assert_eq!(rounded_punch_time(jst(9, 38)), "09:45");
        assert_eq!(rounded_punch_time(jst(9, 52)), "09:45");
    }

    #[test]
    fn punch_advances_hour_from_fifty_three_minutes() {
        assert_eq!(rounded_punch_time(jst(9, 53)), "10:00");
        assert_eq!(rounded_punch_time(jst(23, 59)), "00:00");
    }

    #[test]
    fn worked_minutes_subtracts_break() {
        // 9:00-18:00 with the default 1h break is a 480 minute day.
        assert_eq!(worked_minutes(&record("09:00", "18:00", None)), Some(480));
        assert_eq!(
            worked_minutes(&record("09:00", "18:00", Some("1.5"))),
            Some(450)
        );
    }

    #[test]
    fn worked_minutes_is_undefined_when_negative_or_missing() {
        assert_eq!(worked_minutes(&record("09:00", "09:30", None)), None);
        assert_eq!(
            worked_minutes(&AttendanceRecord {
                check_in: Some("09:00".into()),
                ..Default::default()
            }),
            None
        );
        assert_eq!(worked_minutes(&record("", "18:00", None)), None);
        assert_eq!(worked_minutes(&record("bogus", "18:00", None)), None);
    }

    #[test]
    fn worked_minutes_zero_is_defined() {
        // check_out exactly at check_in + break renders as "0.00", not blank.
        assert_eq!(worked_minutes(&record("09:00", "10:00", None)), Some(0));
    }

    #[test]
    fn unparseable_break_time_falls_back_to_default() {
        assert_eq!(
            worked_minutes(&record("09:00", "18:00", Some("soon"))),
            Some(480)
        );
        assert_eq!(worked_minutes(&record("09:00", "18:00", Some(""))), Some(480));
    }

    #[test]
    fn totals_skip_unparseable_travel_costs() {
        let mut with_cost = record("09:00", "18:00", None);
        with_cost.travel_cost = Some("540".into());
        let mut bad_cost = record("10:00", "19:00", None);
        bad_cost.travel_cost = Some("round trip".into());
        let mut blank_cost = AttendanceRecord::default();
        blank_cost.travel_cost = Some("".into());

        let totals = monthly_totals([&with_cost, &bad_cost, &blank_cost]);
        assert_eq!(totals.worked_minutes, 960);
        assert_eq!(totals.travel_cost, 540.0);
    }

    #[test]
    fn month_days_handles_lengths_and_rollover() {
        assert_eq!(month_days(2025, 2).unwrap().len(), 28);
        assert_eq!(month_days(2024, 2).unwrap().len(), 29);
        assert_eq!(month_days(2025, 12).unwrap().len(), 31);
        let last = *month_days(2025, 12).unwrap().last().unwrap();
        assert_eq!(last.succ_opt().unwrap().month(), 1);
        assert!(month_days(2025, 13).is_none());
    }

    #[test]
    fn weekday_abbreviations() {
        let date = NaiveDate::from_ymd_opt(2025, 7, 5).unwrap(); // Saturday
        assert_eq!(weekday_jp(date), "土");
        assert!(is_weekend(date));
        assert_eq!(weekday_name(date), "Saturday");
    }

    #[test]
    fn wareki_labels() {
        assert_eq!(wareki_label(2025, 7), "令和 7");
        assert_eq!(wareki_label(2019, 4), "平成 31");
        assert_eq!(wareki_label(2019, 5), "令和 1");
    }

    #[test]
    fn username_charset() {
        assert!(valid_username("yamada_42"));
        assert!(!valid_username("山田"));
        assert!(!valid_username("a b"));
        assert!(!valid_username(""));
    }
}
