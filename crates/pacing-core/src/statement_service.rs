//! Daily statement generation: waterfall attribution of one campaign's spend
//! for one date across the budgets active on that date.

use std::collections::HashMap;

use chrono::NaiveDate;
use pacing_domain::{
    common::{div_nano, to_nano},
    Book, BudgetDailyStatement, CurrencyCode,
};
use rust_decimal::Decimal;
use tracing::{debug, error};
use uuid::Uuid;

use crate::{
    fee_policy::FeeSchedule,
    overspend_service::{OverspendHandler, OverspendOutcome},
    settings::EngineSettings,
    sources::{CampaignSpend, RateLookup},
    time::Clock,
    CoreError,
};

/// Result of regenerating one (campaign, date).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutcome {
    pub campaign_id: Uuid,
    pub date: NaiveDate,
    /// Statements deleted before regeneration.
    pub replaced: usize,
    pub statements_written: usize,
    pub attributed: CampaignSpend,
    /// Spend no budget had room for, before overspend handling.
    pub unattributed: CampaignSpend,
    pub overspend: Option<OverspendOutcome>,
    pub overspend_error: Option<String>,
}

/// Attributes observed spend to budgets, oldest budget first.
///
/// Regeneration replaces every statement of the campaign on the date, so
/// running it twice with the same inputs converges to the same rows.
pub struct StatementGenerator<'a> {
    rates: &'a dyn RateLookup,
    clock: &'a dyn Clock,
    settings: &'a EngineSettings,
}

impl<'a> StatementGenerator<'a> {
    pub fn new(
        rates: &'a dyn RateLookup,
        clock: &'a dyn Clock,
        settings: &'a EngineSettings,
    ) -> Self {
        Self {
            rates,
            clock,
            settings,
        }
    }

    pub fn generate(
        &self,
        book: &mut Book,
        campaign_id: Uuid,
        date: NaiveDate,
        spend: CampaignSpend,
    ) -> Result<GenerationOutcome, CoreError> {
        if book.campaign(campaign_id).is_none() {
            return Err(CoreError::CampaignNotFound(campaign_id));
        }

        let mut rates = DayRates::new(self.rates, date);
        let mut remaining = spend.sanitized();
        let mut drafts = Vec::new();

        for budget in book.budgets_active_on(campaign_id, date) {
            let credit = book
                .credit(budget.credit_id)
                .ok_or(CoreError::CreditNotFound(budget.credit_id))?;
            let schedule = FeeSchedule::resolve(budget, credit, self.settings.margin_cutover_date);
            let rate = rates.rate(&credit.currency)?;
            let mut statement = BudgetDailyStatement::zero(budget.id, date);

            if !remaining.is_zero() {
                let spent_local: i64 = book
                    .budget_statements_before(budget.id, date)
                    .map(|prior| schedule.charged_local_nano(prior))
                    .sum();
                let capacity_local = to_nano(budget.allocated_amount()) - spent_local;
                if capacity_local > 0 {
                    let capacity = div_nano(capacity_local, rate);
                    let (media, data) =
                        split_capacity(remaining, schedule.spend_capacity(capacity));
                    let fee = schedule.license_fee_nano(media + data);
                    statement.media_spend_nano = media;
                    statement.data_spend_nano = data;
                    statement.license_fee_nano = fee;
                    statement.margin_nano = schedule.inline_margin_nano(media + data, fee);
                    remaining.media_nano -= media;
                    remaining.data_nano -= data;
                    debug!(
                        budget = %budget.id,
                        %date,
                        capacity,
                        media,
                        data,
                        "attributed spend to budget"
                    );
                } else {
                    debug!(budget = %budget.id, %date, "budget depleted");
                }
            }
            drafts.push((statement, schedule, rate));
        }

        // Legacy budgets get margin only after every budget has been attributed.
        let statements: Vec<BudgetDailyStatement> = drafts
            .into_iter()
            .map(|(mut statement, schedule, rate)| {
                if let Some(margin) =
                    schedule.deferred_margin_nano(statement.spend_nano(), statement.license_fee_nano)
                {
                    statement.margin_nano = margin;
                }
                statement.apply_local_rate(rate);
                statement
            })
            .collect();

        let campaign_budget_ids: Vec<Uuid> = book
            .campaign_budgets(campaign_id)
            .iter()
            .map(|budget| budget.id)
            .collect();
        let replaced = book.remove_statements_on(&campaign_budget_ids, date);
        let attributed = statements.iter().fold(CampaignSpend::default(), |acc, s| {
            CampaignSpend::new(
                acc.media_nano + s.media_spend_nano,
                acc.data_nano + s.data_spend_nano,
            )
        });
        let statements_written = statements.len();
        for statement in statements {
            book.upsert_statement(statement);
        }

        let mut outcome = GenerationOutcome {
            campaign_id,
            date,
            replaced,
            statements_written,
            attributed,
            unattributed: remaining,
            overspend: None,
            overspend_error: None,
        };

        if !remaining.is_zero() {
            let handler = OverspendHandler::new(self.rates, self.clock, self.settings);
            match handler.absorb(book, campaign_id, date, remaining) {
                Ok(result) => outcome.overspend = Some(result),
                Err(err) => {
                    error!(
                        campaign = %campaign_id,
                        %date,
                        media_nano = remaining.media_nano,
                        data_nano = remaining.data_nano,
                        error = %err,
                        "overspend not handled"
                    );
                    outcome.overspend_error = Some(err.to_string());
                }
            }
        }

        book.touch();
        Ok(outcome)
    }
}

/// Both in full when they fit, otherwise media up to `capacity` and no data.
fn split_capacity(remaining: CampaignSpend, capacity: i64) -> (i64, i64) {
    let capacity = capacity.max(0);
    if remaining.total_nano() <= capacity {
        (remaining.media_nano, remaining.data_nano)
    } else {
        (remaining.media_nano.min(capacity), 0)
    }
}

/// Rates of a single date, looked up once per currency.
struct DayRates<'a> {
    lookup: &'a dyn RateLookup,
    date: NaiveDate,
    cache: HashMap<CurrencyCode, Decimal>,
}

impl<'a> DayRates<'a> {
    fn new(lookup: &'a dyn RateLookup, date: NaiveDate) -> Self {
        Self {
            lookup,
            date,
            cache: HashMap::new(),
        }
    }

    fn rate(&mut self, currency: &CurrencyCode) -> Result<Decimal, CoreError> {
        if let Some(rate) = self.cache.get(currency) {
            return Ok(*rate);
        }
        let rate = self.lookup.rate(currency, self.date)?;
        self.cache.insert(currency.clone(), rate);
        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_takes_capacity_before_data() {
        let spend = CampaignSpend::new(70, 50);
        assert_eq!(split_capacity(spend, 200), (70, 50));
        assert_eq!(split_capacity(spend, 120), (70, 50));
        assert_eq!(split_capacity(spend, 100), (70, 0));
        assert_eq!(split_capacity(spend, 60), (60, 0));
        assert_eq!(split_capacity(spend, -1), (0, 0));
    }
}
