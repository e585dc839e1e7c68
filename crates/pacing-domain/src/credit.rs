//! Credit line items: the money pools budgets draw from.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{common::DateRange, currency::CurrencyCode};

/// Who a credit belongs to. Agency credits are shared by every account of the agency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CreditOwner {
    Account(Uuid),
    Agency(Uuid),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreditLineItem {
    pub id: Uuid,
    pub owner: CreditOwner,
    pub amount: Decimal,
    /// Fraction of total cost charged as license fee (0..1).
    pub license_fee: Decimal,
    #[serde(default)]
    pub currency: CurrencyCode,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub flat_fee: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flat_fee_start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flat_fee_end_date: Option<NaiveDate>,
    pub created_dt: DateTime<Utc>,
}

impl CreditLineItem {
    pub fn new(
        owner: CreditOwner,
        amount: Decimal,
        license_fee: Decimal,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner,
            amount,
            license_fee,
            currency: CurrencyCode::default(),
            start_date,
            end_date,
            flat_fee: Decimal::ZERO,
            flat_fee_start_date: None,
            flat_fee_end_date: None,
            created_dt: Utc::now(),
        }
    }

    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// Dates the flat fee is billed over; defaults to the credit's validity.
    pub fn flat_fee_range(&self) -> Option<DateRange> {
        let start = self.flat_fee_start_date.unwrap_or(self.start_date);
        let end = self.flat_fee_end_date.unwrap_or(self.end_date);
        DateRange::new(start, end).ok()
    }

    /// Flat fee spread evenly over the calendar months it touches.
    pub fn monthly_flat_fee(&self) -> Decimal {
        match self.flat_fee_range() {
            Some(range) => self.flat_fee / Decimal::from(months_touched(&range)),
            None => Decimal::ZERO,
        }
    }

    /// Flat fee billed for the calendar months of `window` that fall inside the fee range.
    pub fn flat_fee_in_range(&self, window: &DateRange) -> Decimal {
        if self.flat_fee.is_zero() {
            return Decimal::ZERO;
        }
        let Some(fee_range) = self.flat_fee_range() else {
            return Decimal::ZERO;
        };
        let Some(overlap) = fee_range.overlap(window) else {
            return Decimal::ZERO;
        };
        let total_months = months_touched(&fee_range);
        let months = months_touched(&overlap);
        if months >= total_months {
            return self.flat_fee;
        }
        self.flat_fee / Decimal::from(total_months) * Decimal::from(months)
    }
}

fn months_touched(range: &DateRange) -> i64 {
    let index = |date: NaiveDate| date.year() as i64 * 12 + date.month0() as i64;
    index(range.end) - index(range.start) + 1
}
