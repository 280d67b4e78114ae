//! Wall-clock access and the calendar-day format used by rows, reports and downloads.

use chrono::{DateTime, Duration, Utc};

/// Where services read the current instant from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Clock {
    #[default]
    System,
    Frozen(DateTime<Utc>),
}

impl Clock {
    #[must_use]
    pub fn system() -> Self {
        Self::System
    }

    #[must_use]
    pub fn frozen(at: DateTime<Utc>) -> Self {
        Self::Frozen(at)
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Frozen(at) => *at,
        }
    }

    /// Only a frozen clock moves; the system clock keeps real time.
    pub fn advance(&mut self, by: Duration) {
        if let Clock::Frozen(at) = self {
            *at += by;
        }
    }
}

/// `YYYY-MM-DD` in UTC: the `date` column, time-series buckets and export file names.
#[must_use]
pub fn day_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

/// 2023-11-14T22:13:20Z, the instant every test clock starts at.
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// # Panics
///
/// Never in practice: the constant is well inside chrono's range.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("test timestamp is representable")
}

#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::frozen(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frozen_clock_moves_only_when_advanced() {
        let mut clock = fixed_clock();
        assert_eq!(clock.now(), clock.now());
        clock.advance(Duration::minutes(90));
        assert_eq!(clock.now(), fixed_now() + Duration::minutes(90));
    }

    #[test]
    fn system_clock_is_not_advanced() {
        let mut clock = Clock::system();
        clock.advance(Duration::days(365));
        assert!(clock.now() <= Utc::now());
    }

    #[test]
    fn day_stamp_uses_the_utc_calendar_day() {
        assert_eq!(day_stamp(fixed_now()), "2023-11-14");
        assert_eq!(day_stamp(fixed_now() + Duration::hours(2)), "2023-11-15");
    }
}
