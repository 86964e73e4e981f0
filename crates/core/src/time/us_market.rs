use anyhow::Context;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc};
use std::collections::HashSet;

const EST_OFFSET_SECS: i32 = 5 * 3600;

// If the job runs before this time (EST), treat it as "yesterday's" market date.
// NYSE close is 16:00 Eastern; the fixed EST offset plus a late cutoff keeps the
// resolved date stable across daylight saving.
const CLOSE_CUTOFF_HOUR_EST: u32 = 17;
const CLOSE_CUTOFF_MINUTE_EST: u32 = 0;

pub fn resolve_as_of_date(
    as_of_date_arg: Option<&str>,
    now_utc: DateTime<Utc>,
) -> anyhow::Result<NaiveDate> {
    if let Some(s) = as_of_date_arg {
        return Ok(NaiveDate::parse_from_str(s, "%Y-%m-%d")?);
    }

    let est = chrono::FixedOffset::west_opt(EST_OFFSET_SECS).context("invalid EST offset")?;
    let now_est = now_utc.with_timezone(&est);

    let cutoff_reached =
        (now_est.hour(), now_est.minute()) >= (CLOSE_CUTOFF_HOUR_EST, CLOSE_CUTOFF_MINUTE_EST);
    let mut date = now_est.date_naive();
    if !cutoff_reached {
        date = date - Duration::days(1);
    }

    // Roll back to previous business day.
    let holidays = configured_holidays();
    while is_weekend(date) || holidays.contains(&date) {
        date = date - Duration::days(1);
    }

    Ok(date)
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun)
}

fn configured_holidays() -> HashSet<NaiveDate> {
    // Minimal set of fixed-date market holidays.
    // Extend via US_MARKET_HOLIDAYS="YYYY-MM-DD,YYYY-MM-DD".
    let mut out = HashSet::new();
    let years = [2024, 2025, 2026, 2027, 2028, 2029, 2030];
    for y in years {
        if let Some(d) = NaiveDate::from_ymd_opt(y, 1, 1) {
            out.insert(d);
        }
        if let Some(d) = NaiveDate::from_ymd_opt(y, 7, 4) {
            out.insert(d);
        }
        if let Some(d) = NaiveDate::from_ymd_opt(y, 12, 25) {
            out.insert(d);
        }
    }

    if let Ok(s) = std::env::var("US_MARKET_HOLIDAYS") {
        for part in s.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if let Ok(d) = NaiveDate::parse_from_str(part, "%Y-%m-%d") {
                out.insert(d);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn explicit_argument_wins() {
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 23, 0, 0).unwrap();
        let d = resolve_as_of_date(Some("2025-11-28"), now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 11, 28).unwrap());
    }

    #[test]
    fn rolls_back_on_weekend() {
        // 2026-01-03 is Saturday. 12:00 UTC = 07:00 EST, before the cutoff, so the
        // base is Friday and the weekend rollback leaves it alone.
        let now = Utc.with_ymd_and_hms(2026, 1, 3, 12, 0, 0).unwrap();
        let d = resolve_as_of_date(None, now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 1, 2).unwrap());
    }

    #[test]
    fn uses_previous_day_before_cutoff() {
        // 2026-01-05 18:00 UTC = 13:00 EST (<17:00 cutoff).
        // Rolls back to Sunday, then to Friday.
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 18, 0, 0).unwrap();
        let d = resolve_as_of_date(None, now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 1, 2).unwrap());
    }

    #[test]
    fn uses_same_day_after_cutoff() {
        // 2026-01-05 23:00 UTC = 18:00 EST (>=17:00 cutoff).
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 23, 0, 0).unwrap();
        let d = resolve_as_of_date(None, now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
    }

    #[test]
    fn rolls_back_on_new_years_day() {
        // 2026-01-01 is a Thursday and a default holiday.
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 23, 0, 0).unwrap();
        let d = resolve_as_of_date(None, now).unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
    }
}
