//! License-fee and margin rules applied while attributing spend to a budget.
//!
//! Two margin models coexist. Budgets starting before the cutover date use
//! [`FeePolicy::Legacy`]: capacity is only net of license fee and margin is
//! multiplied onto `media + data + fee` after the whole waterfall pass, so it
//! is not counted against the budget. Budgets starting on or after the cutover
//! use [`FeePolicy::Inline`]: margin is reserved out of capacity up front and
//! counted like any other charge.

use chrono::NaiveDate;
use pacing_domain::{common::mul_nano, BudgetDailyStatement, BudgetLineItem, CreditLineItem};
use rust_decimal::Decimal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeePolicy {
    Legacy,
    Inline,
}

impl FeePolicy {
    pub fn for_budget(budget: &BudgetLineItem, margin_cutover_date: NaiveDate) -> Self {
        if budget.start_date >= margin_cutover_date {
            FeePolicy::Inline
        } else {
            FeePolicy::Legacy
        }
    }
}

/// Fee rates of one budget, resolved once and applied for every statement it gets.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeSchedule {
    pub policy: FeePolicy,
    pub license_fee: Decimal,
    pub margin: Decimal,
}

impl FeeSchedule {
    pub fn resolve(
        budget: &BudgetLineItem,
        credit: &CreditLineItem,
        margin_cutover_date: NaiveDate,
    ) -> Self {
        Self {
            policy: FeePolicy::for_budget(budget, margin_cutover_date),
            license_fee: credit.license_fee,
            margin: budget.margin,
        }
    }

    /// Media plus data that fits in `capacity_nano` once fees are reserved.
    pub fn spend_capacity(&self, capacity_nano: i64) -> i64 {
        if capacity_nano <= 0 {
            return 0;
        }
        let net_of_fee = Decimal::ONE - self.license_fee;
        let factor = match self.policy {
            FeePolicy::Legacy => net_of_fee,
            FeePolicy::Inline => net_of_fee * (Decimal::ONE - self.margin),
        };
        mul_nano(capacity_nano, factor).max(0)
    }

    pub fn license_fee_nano(&self, spend_nano: i64) -> i64 {
        mul_nano(spend_nano, self.license_fee)
    }

    pub fn margin_nano(&self, spend_nano: i64, license_fee_nano: i64) -> i64 {
        mul_nano(spend_nano + license_fee_nano, self.margin)
    }

    /// Margin booked during attribution. Legacy budgets get theirs after the pass.
    pub fn inline_margin_nano(&self, spend_nano: i64, license_fee_nano: i64) -> i64 {
        match self.policy {
            FeePolicy::Inline => self.margin_nano(spend_nano, license_fee_nano),
            FeePolicy::Legacy => 0,
        }
    }

    /// Margin added once every budget of the day has been attributed.
    pub fn deferred_margin_nano(&self, spend_nano: i64, license_fee_nano: i64) -> Option<i64> {
        match self.policy {
            FeePolicy::Legacy => Some(self.margin_nano(spend_nano, license_fee_nano)),
            FeePolicy::Inline => None,
        }
    }

    /// Amount of a statement counted against the budget, in the credit currency.
    pub fn charged_local_nano(&self, statement: &BudgetDailyStatement) -> i64 {
        match self.policy {
            FeePolicy::Inline => statement.local_total_nano(),
            FeePolicy::Legacy => statement.local_total_nano() - statement.local_margin_nano,
        }
    }

    /// Amount of a statement counted against the budget, in the reporting currency.
    pub fn charged_nano(&self, statement: &BudgetDailyStatement) -> i64 {
        match self.policy {
            FeePolicy::Inline => statement.total_nano(),
            FeePolicy::Legacy => statement.total_nano() - statement.margin_nano,
        }
    }
}
