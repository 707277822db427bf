use std::fmt::Display;

use chrono::{DateTime, Datelike, Days, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Default, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BillingPeriod {
    Day,
    Week,
    #[default]
    Month,
    Year,
    Lifetime,
}

impl BillingPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingPeriod::Day => "day",
            BillingPeriod::Week => "week",
            BillingPeriod::Month => "month",
            BillingPeriod::Year => "year",
            BillingPeriod::Lifetime => "lifetime",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "day" => Some(BillingPeriod::Day),
            "week" => Some(BillingPeriod::Week),
            "month" => Some(BillingPeriod::Month),
            "year" => Some(BillingPeriod::Year),
            "lifetime" => Some(BillingPeriod::Lifetime),
            _ => None,
        }
    }

    /// Moves `start` forward by `interval` periods. Lifetime never ends and
    /// yields `None`. Month and year steps overflow into the following month
    /// when the target month is shorter (Jan 31 + 1 month is Mar 2 in a leap
    /// year).
    pub fn advance(&self, start: DateTime<Utc>, interval: u32) -> Option<DateTime<Utc>> {
        match self {
            BillingPeriod::Day => start.checked_add_days(Days::new(u64::from(interval))),
            BillingPeriod::Week => start.checked_add_days(Days::new(7 * u64::from(interval))),
            BillingPeriod::Month => add_months_overflowing(start, interval),
            BillingPeriod::Year => add_months_overflowing(start, interval.checked_mul(12)?),
            BillingPeriod::Lifetime => None,
        }
    }

    /// Price normalised to one month of revenue. Weeks count as 4.33 per
    /// month and days as 30. Lifetime packages contribute nothing.
    pub fn monthly_amount(&self, price: Decimal, interval: i32) -> Decimal {
        let interval = Decimal::from(interval.max(1));
        match self {
            BillingPeriod::Day => price * Decimal::from(30) / interval,
            BillingPeriod::Week => price * Decimal::new(433, 2) / interval,
            BillingPeriod::Month => price / interval,
            BillingPeriod::Year => price / (Decimal::from(12) * interval),
            BillingPeriod::Lifetime => Decimal::ZERO,
        }
    }
}

/// Steps from the first of the month so chrono never clamps, then adds the
/// day offset back, letting surplus days roll into the next month.
fn add_months_overflowing(start: DateTime<Utc>, months: u32) -> Option<DateTime<Utc>> {
    start
        .with_day(1)?
        .checked_add_months(Months::new(months))?
        .checked_add_days(Days::new(u64::from(start.day() - 1)))
}

impl Display for BillingPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 10, 30, 0).unwrap()
    }

    #[test]
    fn advance_scales_by_interval() {
        let start = at(2024, 1, 15);
        assert_eq!(BillingPeriod::Day.advance(start, 3), Some(at(2024, 1, 18)));
        assert_eq!(BillingPeriod::Week.advance(start, 2), Some(at(2024, 1, 29)));
        assert_eq!(BillingPeriod::Month.advance(start, 3), Some(at(2024, 4, 15)));
        assert_eq!(BillingPeriod::Year.advance(start, 2), Some(at(2026, 1, 15)));
        assert_eq!(BillingPeriod::Lifetime.advance(start, 1), None);
    }

    #[test]
    fn month_end_overflows_into_next_month() {
        assert_eq!(
            BillingPeriod::Month.advance(at(2024, 1, 31), 1),
            Some(at(2024, 3, 2))
        );
        assert_eq!(
            BillingPeriod::Month.advance(at(2023, 1, 31), 1),
            Some(at(2023, 3, 3))
        );
        assert_eq!(
            BillingPeriod::Month.advance(at(2024, 3, 31), 1),
            Some(at(2024, 5, 1))
        );
        assert_eq!(
            BillingPeriod::Year.advance(at(2024, 2, 29), 1),
            Some(at(2025, 3, 1))
        );
        assert_eq!(
            BillingPeriod::Year.advance(at(2024, 2, 29), 4),
            Some(at(2028, 2, 29))
        );
    }

    #[test]
    fn month_steps_keep_time_of_day() {
        let start = Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap();
        assert_eq!(
            BillingPeriod::Month.advance(start, 1),
            Some(Utc.with_ymd_and_hms(2024, 3, 2, 23, 59, 59).unwrap())
        );
    }

    #[test]
    fn monthly_amount_normalises_each_period() {
        assert_eq!(BillingPeriod::Month.monthly_amount(dec!(30), 3), dec!(10));
        assert_eq!(BillingPeriod::Year.monthly_amount(dec!(120), 1), dec!(10));
        assert_eq!(BillingPeriod::Week.monthly_amount(dec!(10), 1), dec!(43.3));
        assert_eq!(BillingPeriod::Day.monthly_amount(dec!(1), 2), dec!(15));
        assert_eq!(BillingPeriod::Lifetime.monthly_amount(dec!(500), 1), Decimal::ZERO);
    }

    #[test]
    fn unknown_period_does_not_parse() {
        assert_eq!(BillingPeriod::from_str("fortnight"), None);
        assert_eq!(BillingPeriod::from_str("year"), Some(BillingPeriod::Year));
    }
}
