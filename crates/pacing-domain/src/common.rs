//! Shared money and calendar primitives.

use std::fmt;

use chrono::{Duration, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of nano-units in one currency unit.
pub const NANO_PER_UNIT: i64 = 1_000_000_000;

/// Fractional digits kept on reported (not intermediate) values.
pub const REPORT_DECIMALS: u32 = 4;

/// Converts a currency amount into nano-units, truncating toward zero.
pub fn to_nano(amount: Decimal) -> i64 {
    saturating_i64(amount * Decimal::from(NANO_PER_UNIT))
}

/// Converts nano-units back into an exact decimal currency amount.
pub fn from_nano(nano: i64) -> Decimal {
    Decimal::new(nano, 9)
}

/// Multiplies a nano amount by a decimal factor, truncating toward zero.
pub fn mul_nano(nano: i64, factor: Decimal) -> i64 {
    saturating_i64(Decimal::from(nano) * factor)
}

/// Divides a nano amount by a decimal divisor, truncating toward zero.
/// A zero divisor yields zero.
pub fn div_nano(nano: i64, divisor: Decimal) -> i64 {
    if divisor.is_zero() {
        return 0;
    }
    saturating_i64(Decimal::from(nano) / divisor)
}

/// Rounds a reported value to exactly four decimals, half away from zero.
pub fn quantize(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(REPORT_DECIMALS, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(REPORT_DECIMALS);
    rounded
}

fn saturating_i64(value: Decimal) -> i64 {
    value.trunc().to_i64().unwrap_or(if value.is_sign_negative() {
        i64::MIN
    } else {
        i64::MAX
    })
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// Inclusive calendar range `[start, end]`.
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, DateRangeError> {
        if end < start {
            return Err(DateRangeError::EndBeforeStart { start, end });
        }
        Ok(Self { start, end })
    }

    /// A range covering exactly one day.
    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// Number of calendar days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Intersection of two ranges, `None` when they do not touch.
    pub fn overlap(&self, other: &DateRange) -> Option<DateRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start > end {
            None
        } else {
            Some(DateRange { start, end })
        }
    }

    pub fn iter_days(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.start;
        (0..self.days()).map(move |offset| start + Duration::days(offset))
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Errors that can occur when constructing [`DateRange`] values.
pub enum DateRangeError {
    EndBeforeStart { start: NaiveDate, end: NaiveDate },
}

impl fmt::Display for DateRangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateRangeError::EndBeforeStart { start, end } => {
                write!(f, "date range end {} is before start {}", end, start)
            }
        }
    }
}

impl std::error::Error for DateRangeError {}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    #[test]
    fn nano_conversion_truncates() {
        assert_eq!(to_nano(dec!(1.5)), 1_500_000_000);
        assert_eq!(to_nano(dec!(0.0000000019)), 1);
        assert_eq!(from_nano(2_500_000_000), dec!(2.5));
        assert_eq!(mul_nano(1_000, dec!(0.3333)), 333);
        assert_eq!(div_nano(1_000, dec!(3)), 333);
        assert_eq!(div_nano(1_000, Decimal::ZERO), 0);
    }

    #[test]
    fn quantize_rounds_half_up() {
        assert_eq!(quantize(dec!(1.23455)), dec!(1.2346));
        assert_eq!(quantize(dec!(1.23454)), dec!(1.2345));
        assert_eq!(quantize(dec!(-1.23455)), dec!(-1.2346));
        assert_eq!(quantize(dec!(3000)).to_string(), "3000.0000");
    }

    #[test]
    fn range_overlap_and_days() {
        let january = DateRange::new(day(1, 1), day(1, 31)).unwrap();
        let mid = DateRange::new(day(1, 15), day(1, 20)).unwrap();
        assert_eq!(january.days(), 31);
        assert_eq!(january.overlap(&mid), Some(mid));

        let february = DateRange::new(day(2, 1), day(2, 29)).unwrap();
        assert_eq!(january.overlap(&february), None);
        assert_eq!(february.iter_days().count(), 29);
    }

    #[test]
    fn range_rejects_inverted_bounds() {
        assert!(DateRange::new(day(3, 2), day(3, 1)).is_err());
        assert!(DateRange::new(day(3, 1), day(3, 1)).is_ok());
    }
}
