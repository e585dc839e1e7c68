//! Parks spend that no budget had capacity for.

use chrono::NaiveDate;
use pacing_domain::{Book, BudgetDailyStatement, BudgetLineItem, CreditLineItem, CreditOwner};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    fee_policy::FeeSchedule,
    settings::EngineSettings,
    sources::{CampaignSpend, RateLookup},
    time::Clock,
    CoreError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverspendOutcome {
    /// The campaign is stopped in real time, so leftover spend is dropped.
    Skipped,
    Absorbed {
        budget_id: Uuid,
        /// Set when a zero-amount budget had to be created for the date.
        created_budget: bool,
        media_nano: i64,
        data_nano: i64,
    },
}

pub struct OverspendHandler<'a> {
    rates: &'a dyn RateLookup,
    clock: &'a dyn Clock,
    settings: &'a EngineSettings,
}

impl<'a> OverspendHandler<'a> {
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

    /// Adds `overspend` onto the statement of the campaign's most recently
    /// created active budget, creating a single-day budget if none is active.
    pub fn absorb(
        &self,
        book: &mut Book,
        campaign_id: Uuid,
        date: NaiveDate,
        overspend: CampaignSpend,
    ) -> Result<OverspendOutcome, CoreError> {
        let campaign = book
            .campaign(campaign_id)
            .ok_or(CoreError::CampaignNotFound(campaign_id))?;
        if campaign.real_time_campaign_stop {
            info!(campaign = %campaign_id, %date, "real-time stop enabled, overspend dropped");
            return Ok(OverspendOutcome::Skipped);
        }

        let existing = book.budgets_active_on(campaign_id, date).last().map(|b| (*b).clone());
        let (budget, created_budget) = match existing {
            Some(budget) => (budget, false),
            None => {
                let credit = latest_valid_credit(book, campaign_id, date)?;
                (
                    BudgetLineItem::automatic(campaign_id, credit.id, date, self.clock.now()),
                    true,
                )
            }
        };

        let credit = book
            .credit(budget.credit_id)
            .ok_or(CoreError::CreditNotFound(budget.credit_id))?;
        let schedule = FeeSchedule::resolve(&budget, credit, self.settings.margin_cutover_date);
        let rate = self.rates.rate(&credit.currency, date)?;

        let mut statement = book
            .statement(budget.id, date)
            .copied()
            .unwrap_or_else(|| BudgetDailyStatement::zero(budget.id, date));
        statement.media_spend_nano += overspend.media_nano;
        statement.data_spend_nano += overspend.data_nano;
        statement.license_fee_nano = schedule.license_fee_nano(statement.spend_nano());
        statement.margin_nano =
            schedule.margin_nano(statement.spend_nano(), statement.license_fee_nano);
        statement.apply_local_rate(rate);

        let budget_id = budget.id;
        if created_budget {
            warn!(
                campaign = %campaign_id,
                %date,
                budget = %budget_id,
                "no active budget, created one automatically"
            );
            book.add_budget(budget);
        }
        book.upsert_statement(statement);
        info!(
            campaign = %campaign_id,
            %date,
            budget = %budget_id,
            media_nano = overspend.media_nano,
            data_nano = overspend.data_nano,
            "overspend absorbed"
        );

        Ok(OverspendOutcome::Absorbed {
            budget_id,
            created_budget,
            media_nano: overspend.media_nano,
            data_nano: overspend.data_nano,
        })
    }
}

/// Most recently created credit valid on `date`, owned by the campaign's
/// account or by that account's agency.
fn latest_valid_credit(
    book: &Book,
    campaign_id: Uuid,
    date: NaiveDate,
) -> Result<&CreditLineItem, CoreError> {
    let campaign = book
        .campaign(campaign_id)
        .ok_or(CoreError::CampaignNotFound(campaign_id))?;
    let account = book
        .account(campaign.account_id)
        .ok_or(CoreError::AccountNotFound(campaign.account_id))?;

    book.credits
        .iter()
        .filter(|credit| credit.is_valid_on(date))
        .filter(|credit| match credit.owner {
            CreditOwner::Account(id) => id == account.id,
            CreditOwner::Agency(id) => account.agency_id == Some(id),
        })
        .max_by(|a, b| a.created_dt.cmp(&b.created_dt).then_with(|| a.id.cmp(&b.id)))
        .ok_or(CoreError::NoCreditForOverspend {
            campaign: campaign_id,
            date,
        })
}
