use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::mul_nano;

/// Spend charged against one budget on one calendar day.
///
/// Plain fields are in the reporting currency; `local_*` fields are the same
/// amounts in the funding credit's currency. All values are nano-units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct BudgetDailyStatement {
    pub budget_id: Uuid,
    pub date: NaiveDate,
    pub media_spend_nano: i64,
    pub data_spend_nano: i64,
    pub license_fee_nano: i64,
    pub margin_nano: i64,
    #[serde(default)]
    pub local_media_spend_nano: i64,
    #[serde(default)]
    pub local_data_spend_nano: i64,
    #[serde(default)]
    pub local_license_fee_nano: i64,
    #[serde(default)]
    pub local_margin_nano: i64,
}

impl BudgetDailyStatement {
    pub fn zero(budget_id: Uuid, date: NaiveDate) -> Self {
        Self {
            budget_id,
            date,
            media_spend_nano: 0,
            data_spend_nano: 0,
            license_fee_nano: 0,
            margin_nano: 0,
            local_media_spend_nano: 0,
            local_data_spend_nano: 0,
            local_license_fee_nano: 0,
            local_margin_nano: 0,
        }
    }

    /// Media plus data.
    pub fn spend_nano(&self) -> i64 {
        self.media_spend_nano + self.data_spend_nano
    }

    pub fn total_nano(&self) -> i64 {
        self.spend_nano() + self.license_fee_nano + self.margin_nano
    }

    pub fn local_spend_nano(&self) -> i64 {
        self.local_media_spend_nano + self.local_data_spend_nano
    }

    pub fn local_total_nano(&self) -> i64 {
        self.local_spend_nano() + self.local_license_fee_nano + self.local_margin_nano
    }

    /// Recomputes the local fields from the reporting fields at `rate`.
    pub fn apply_local_rate(&mut self, rate: Decimal) {
        self.local_media_spend_nano = mul_nano(self.media_spend_nano, rate);
        self.local_data_spend_nano = mul_nano(self.data_spend_nano, rate);
        self.local_license_fee_nano = mul_nano(self.license_fee_nano, rate);
        self.local_margin_nano = mul_nano(self.margin_nano, rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn local_amounts_follow_rate() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let mut statement = BudgetDailyStatement::zero(Uuid::new_v4(), date);
        statement.media_spend_nano = 1_000;
        statement.data_spend_nano = 500;
        statement.license_fee_nano = 150;
        statement.apply_local_rate(dec!(0.9));

        assert_eq!(statement.spend_nano(), 1_500);
        assert_eq!(statement.total_nano(), 1_650);
        assert_eq!(statement.local_media_spend_nano, 900);
        assert_eq!(statement.local_total_nano(), 900 + 450 + 135);
    }
}
