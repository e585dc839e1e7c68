//! Budget line items and the overlap/allocation arithmetic used by pacing.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{common::DateRange, credit::CreditLineItem};

pub const AUTOMATIC_BUDGET_COMMENT: &str = "Budget created automatically";

/// A money allocation for a campaign, funded by a credit over an inclusive date range.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BudgetLineItem {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub credit_id: Uuid,
    /// Nominal amount, in the credit's currency.
    pub amount: Decimal,
    /// Part of `amount` released back to the credit.
    #[serde(default)]
    pub freed_amount: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub margin: Decimal,
    pub created_dt: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl BudgetLineItem {
    pub fn new(
        campaign_id: Uuid,
        credit_id: Uuid,
        amount: Decimal,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            campaign_id,
            credit_id,
            amount,
            freed_amount: Decimal::ZERO,
            start_date,
            end_date,
            margin: Decimal::ZERO,
            created_dt: Utc::now(),
            comment: None,
        }
    }

    /// Zero-amount single-day budget used to park spend no other budget could absorb.
    pub fn automatic(
        campaign_id: Uuid,
        credit_id: Uuid,
        date: NaiveDate,
        created_dt: DateTime<Utc>,
    ) -> Self {
        Self {
            created_dt,
            comment: Some(AUTOMATIC_BUDGET_COMMENT.into()),
            ..Self::new(campaign_id, credit_id, Decimal::ZERO, date, date)
        }
    }

    pub fn allocated_amount(&self) -> Decimal {
        self.amount - self.freed_amount
    }

    /// Inclusive active range; `None` when the stored dates are inverted.
    pub fn date_range(&self) -> Option<DateRange> {
        DateRange::new(self.start_date, self.end_date).ok()
    }

    pub fn is_active_on(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn overlap(&self, window: &DateRange) -> Option<DateRange> {
        self.date_range()?.overlap(window)
    }

    /// Share of the allocation falling inside `window`, prorated linearly by day.
    pub fn allocated_total(&self, window: &DateRange) -> Decimal {
        let (Some(range), Some(overlap)) = (self.date_range(), self.overlap(window)) else {
            return Decimal::ZERO;
        };
        self.allocated_amount() * Decimal::from(overlap.days()) / Decimal::from(range.days())
    }

    /// Prorated allocation net of the funding credit's license fee.
    pub fn allocated_media(&self, credit: &CreditLineItem, window: &DateRange) -> Decimal {
        self.allocated_total(window) * (Decimal::ONE - credit.license_fee)
    }
}

/// Overlap of a budget with `[start_date, end_date]` as an optional pair.
pub fn get_overlap(
    budget: &BudgetLineItem,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> (Option<NaiveDate>, Option<NaiveDate>) {
    match DateRange::new(start_date, end_date)
        .ok()
        .and_then(|window| budget.overlap(&window))
    {
        Some(overlap) => (Some(overlap.start), Some(overlap.end)),
        None => (None, None),
    }
}

/// Attribution order: oldest `created_dt` first, budget id breaks ties.
///
/// Changing this order changes who pays for spend, so every waterfall goes through it.
pub fn waterfall_order(a: &BudgetLineItem, b: &BudgetLineItem) -> Ordering {
    a.created_dt
        .cmp(&b.created_dt)
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credit::CreditOwner;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn budget(amount: Decimal, start: NaiveDate, end: NaiveDate) -> BudgetLineItem {
        BudgetLineItem::new(Uuid::new_v4(), Uuid::new_v4(), amount, start, end)
    }

    #[test]
    fn overlap_inside_and_outside() {
        let january = budget(dec!(100), date(1, 1), date(1, 31));
        assert_eq!(
            get_overlap(&january, date(1, 15), date(1, 20)),
            (Some(date(1, 15)), Some(date(1, 20)))
        );
        assert_eq!(
            get_overlap(&january, date(2, 1), date(2, 10)),
            (None, None)
        );
        assert_eq!(
            get_overlap(&january, date(1, 25), date(2, 10)),
            (Some(date(1, 25)), Some(date(1, 31)))
        );
    }

    #[test]
    fn allocated_total_prorates_by_day() {
        let ten_days = budget(dec!(100), date(3, 1), date(3, 10));
        let window = DateRange::new(date(3, 6), date(3, 20)).unwrap();
        assert_eq!(ten_days.allocated_total(&window), dec!(50));

        let disjoint = DateRange::new(date(4, 1), date(4, 2)).unwrap();
        assert_eq!(ten_days.allocated_total(&disjoint), Decimal::ZERO);
    }

    #[test]
    fn allocated_media_nets_license_fee_and_freed_amount() {
        let mut item = budget(dec!(1000), date(3, 1), date(3, 10));
        item.freed_amount = dec!(200);
        let credit = CreditLineItem::new(
            CreditOwner::Account(Uuid::new_v4()),
            dec!(5000),
            dec!(0.25),
            date(1, 1),
            date(12, 31),
        );
        let window = DateRange::new(date(3, 1), date(3, 10)).unwrap();
        assert_eq!(item.allocated_total(&window), dec!(800));
        assert_eq!(item.allocated_media(&credit, &window), dec!(600));
    }

    #[test]
    fn waterfall_orders_by_creation_then_id() {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut older = budget(dec!(1), date(1, 1), date(1, 2));
        older.created_dt = base;
        let mut newer = budget(dec!(1), date(1, 1), date(1, 2));
        newer.created_dt = base + Duration::hours(1);
        assert_eq!(waterfall_order(&older, &newer), Ordering::Less);

        let mut twin = older.clone();
        twin.id = Uuid::nil();
        assert_eq!(waterfall_order(&twin, &older), Ordering::Less);
    }
}
