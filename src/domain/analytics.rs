use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};

/// A calendar month, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn of<Tz: TimeZone>(date: &DateTime<Tz>) -> Self {
        Self::new(date.year(), date.month())
    }

    /// Months from `self` to `other` (negative if `other` is earlier).
    pub fn months_until(&self, other: YearMonth) -> i64 {
        (other.year as i64 - self.year as i64) * 12 + (other.month as i64 - self.month as i64)
    }

    pub fn add_months(&self, months: u32) -> Self {
        let zero_based = self.month - 1 + months;
        Self::new(self.year + (zero_based / 12) as i32, zero_based % 12 + 1)
    }

    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn last_day(&self) -> Option<NaiveDate> {
        self.add_months(1).first_day().map(|d| d - Duration::days(1))
    }
}

impl std::fmt::Display for YearMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Inclusive window covering the calendar month of `now` in its own time zone:
/// first day 00:00:00 through last day 23:59:59, returned in UTC.
/// A bound that falls in a DST gap moves to the nearest instant inside the month.
pub fn month_window<Tz: TimeZone>(now: &DateTime<Tz>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let tz = now.timezone();
    let month = YearMonth::of(now);
    let start = month.first_day()?.and_hms_opt(0, 0, 0)?;
    let end = month.last_day()?.and_hms_opt(23, 59, 59)?;

    let start = (0..=MAX_GAP_MINUTES)
        .find_map(|m| tz.from_local_datetime(&(start + Duration::minutes(m))).earliest())?;
    let end = (0..=MAX_GAP_MINUTES)
        .find_map(|m| tz.from_local_datetime(&(end - Duration::minutes(m))).latest())?;
    Some((start.with_timezone(&Utc), end.with_timezone(&Utc)))
}

// Longest wall-clock jump on record is a skipped day.
const MAX_GAP_MINUTES: i64 = 24 * 60;

/// Least-squares line y = slope * x + intercept.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearTrend {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearTrend {
    /// Fit a line in a single pass. Needs at least two points with distinct x.
    pub fn fit(points: &[(f64, f64)]) -> Option<Self> {
        if points.len() < 2 {
            return None;
        }
        let n = points.len() as f64;
        let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
        for &(x, y) in points {
            sum_x += x;
            sum_y += y;
            sum_xy += x * y;
            sum_xx += x * x;
        }

        let denominator = n * sum_xx - sum_x * sum_x;
        if denominator == 0.0 {
            return None;
        }
        let slope = (n * sum_xy - sum_x * sum_y) / denominator;
        let intercept = (sum_y - slope * sum_x) / n;
        Some(Self { slope, intercept })
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, LocalResult, NaiveDateTime};

    use super::*;

    #[test]
    fn test_year_month_arithmetic() {
        let nov = YearMonth::new(2024, 11);
        assert_eq!(nov.add_months(1), YearMonth::new(2024, 12));
        assert_eq!(nov.add_months(2), YearMonth::new(2025, 1));
        assert_eq!(nov.add_months(14), YearMonth::new(2026, 1));
        assert_eq!(nov.months_until(YearMonth::new(2025, 2)), 3);
        assert_eq!(YearMonth::new(2025, 2).months_until(nov), -3);
        assert_eq!(nov.to_string(), "2024-11");
    }

    #[test]
    fn test_last_day_handles_leap_years() {
        assert_eq!(
            YearMonth::new(2024, 2).last_day(),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(
            YearMonth::new(2025, 12).last_day(),
            NaiveDate::from_ymd_opt(2025, 12, 31)
        );
    }

    #[test]
    fn test_month_window_in_local_offset() {
        // UTC-3
        let tz = FixedOffset::west_opt(3 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2025, 2, 10, 15, 0, 0).unwrap();

        let (start, end) = month_window(&now).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 2, 1, 3, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 3, 1, 2, 59, 59).unwrap());
    }

    /// UTC-4 until 2025-03-01 04:00 UTC, then UTC-3: local midnight of
    /// March 1st is skipped.
    #[derive(Debug, Clone, Copy)]
    struct SpringForward;

    impl SpringForward {
        fn switch() -> NaiveDateTime {
            NaiveDate::from_ymd_opt(2025, 3, 1)
                .unwrap()
                .and_hms_opt(4, 0, 0)
                .unwrap()
        }

        fn before() -> FixedOffset {
            FixedOffset::west_opt(4 * 3600).unwrap()
        }

        fn after() -> FixedOffset {
            FixedOffset::west_opt(3 * 3600).unwrap()
        }
    }

    impl TimeZone for SpringForward {
        type Offset = FixedOffset;

        fn from_offset(_offset: &FixedOffset) -> Self {
            SpringForward
        }

        fn offset_from_local_date(&self, local: &NaiveDate) -> LocalResult<FixedOffset> {
            self.offset_from_local_datetime(&local.and_hms_opt(0, 0, 0).unwrap())
        }

        fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
            let candidates: Vec<FixedOffset> = [Self::before(), Self::after()]
                .into_iter()
                .filter(|offset| {
                    let utc = *local - Duration::seconds(i64::from(offset.local_minus_utc()));
                    self.offset_from_utc_datetime(&utc) == *offset
                })
                .collect();
            match candidates.as_slice() {
                [] => LocalResult::None,
                [one] => LocalResult::Single(*one),
                [first, second, ..] => LocalResult::Ambiguous(*first, *second),
            }
        }

        fn offset_from_utc_date(&self, utc: &NaiveDate) -> FixedOffset {
            self.offset_from_utc_datetime(&utc.and_hms_opt(0, 0, 0).unwrap())
        }

        fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> FixedOffset {
            if *utc < Self::switch() {
                Self::before()
            } else {
                Self::after()
            }
        }
    }

    #[test]
    fn test_month_window_skips_dst_gap() {
        let now = SpringForward.from_utc_datetime(
            &NaiveDate::from_ymd_opt(2025, 3, 10)
                .unwrap()
                .and_hms_opt(15, 0, 0)
                .unwrap(),
        );

        let (start, end) = month_window(&now).unwrap();
        // First valid local instant of the month is 01:00 at UTC-3
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 3, 1, 4, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 4, 1, 2, 59, 59).unwrap());
    }

    #[test]
    fn test_linear_trend_exact_line() {
        let points = [(0.0, 100.0), (1.0, 150.0), (2.0, 200.0)];
        let trend = LinearTrend::fit(&points).unwrap();
        assert!((trend.slope - 50.0).abs() < 1e-9);
        assert!((trend.intercept - 100.0).abs() < 1e-9);
        assert!((trend.predict(4.0) - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_linear_trend_needs_two_distinct_x() {
        assert!(LinearTrend::fit(&[]).is_none());
        assert!(LinearTrend::fit(&[(0.0, 1.0)]).is_none());
        assert!(LinearTrend::fit(&[(3.0, 1.0), (3.0, 5.0)]).is_none());
    }
}
