//! Market calendar helpers. US listed options trade on New York time, so
//! "today" for DTE and earnings checks is the Eastern calendar date.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::US::Eastern;

/// Current trading date in US/Eastern.
#[must_use]
pub fn market_today() -> NaiveDate {
    market_date(Utc::now())
}

/// Eastern calendar date for a UTC instant.
#[must_use]
pub fn market_date(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&Eastern).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_late_utc_evening_is_still_previous_eastern_day() {
        // 02:30 UTC on the 15th is 22:30 EDT on the 14th
        let at = Utc.with_ymd_and_hms(2025, 7, 15, 2, 30, 0).unwrap();
        assert_eq!(market_date(at), NaiveDate::from_ymd_opt(2025, 7, 14).unwrap());
    }

    #[test]
    fn test_midday_utc_matches() {
        let at = Utc.with_ymd_and_hms(2025, 1, 10, 17, 0, 0).unwrap();
        assert_eq!(market_date(at), NaiveDate::from_ymd_opt(2025, 1, 10).unwrap());
    }
}
