//! Reprocessing driver: decides which (campaign, date) pairs need their
//! statements regenerated and replays them oldest date first.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use pacing_domain::{Book, DateRange};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    settings::EngineSettings,
    sources::{CampaignSpend, RateLookup, SpendSource},
    spend_cache::SpendCache,
    statement_service::StatementGenerator,
    time::Clock,
    CoreError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReprocessRequest {
    pub from_date: NaiveDate,
    /// Restricts the run to one account's campaigns.
    pub account_id: Option<Uuid>,
    pub collect_spend_pcts: bool,
}

impl ReprocessRequest {
    pub fn from_date(from_date: NaiveDate) -> Self {
        Self {
            from_date,
            account_id: None,
            collect_spend_pcts: false,
        }
    }

    pub fn for_account(mut self, account_id: Uuid) -> Self {
        self.account_id = Some(account_id);
        self
    }

    pub fn with_spend_pcts(mut self) -> Self {
        self.collect_spend_pcts = true;
        self
    }
}

/// How much of a day's observed spend ended up on statements, and at what fee rates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EffectiveSpend {
    pub pct_actual_spend: Decimal,
    pub pct_license_fee: Decimal,
    pub pct_margin: Decimal,
}

impl EffectiveSpend {
    pub fn compute(actual_nano: i64, attributed_nano: i64, fee_nano: i64, margin_nano: i64) -> Self {
        Self {
            pct_actual_spend: ratio(attributed_nano, actual_nano),
            pct_license_fee: ratio(fee_nano, attributed_nano),
            pct_margin: ratio(margin_nano, attributed_nano + fee_nano),
        }
    }
}

fn ratio(numerator: i64, denominator: i64) -> Decimal {
    if denominator == 0 {
        return Decimal::ZERO;
    }
    Decimal::from(numerator) / Decimal::from(denominator)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CampaignFailure {
    pub campaign_id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct ReprocessReport {
    /// Dates regenerated per campaign, oldest first.
    pub processed: BTreeMap<Uuid, Vec<NaiveDate>>,
    /// Campaigns whose changes were rolled back.
    pub failures: Vec<CampaignFailure>,
    pub effective_spend: BTreeMap<(NaiveDate, Uuid), EffectiveSpend>,
    pub overspend_errors: usize,
}

impl ReprocessReport {
    pub fn dates_processed(&self) -> usize {
        self.processed.values().map(Vec::len).sum()
    }
}

pub struct ReprocessingDriver<'a> {
    spend: &'a dyn SpendSource,
    rates: &'a dyn RateLookup,
    clock: &'a dyn Clock,
    settings: &'a EngineSettings,
}

impl<'a> ReprocessingDriver<'a> {
    pub fn new(
        spend: &'a dyn SpendSource,
        rates: &'a dyn RateLookup,
        clock: &'a dyn Clock,
        settings: &'a EngineSettings,
    ) -> Self {
        Self {
            spend,
            rates,
            clock,
            settings,
        }
    }

    pub fn run(
        &self,
        book: &mut Book,
        request: &ReprocessRequest,
    ) -> Result<ReprocessReport, CoreError> {
        if let Some(account_id) = request.account_id {
            book.account(account_id)
                .ok_or(CoreError::AccountNotFound(account_id))?;
        }
        let today = self.clock.today();
        let mut report = ReprocessReport::default();
        let Ok(window) = DateRange::new(request.from_date, today) else {
            info!(from = %request.from_date, %today, "nothing to reprocess");
            return Ok(report);
        };

        let scoped: Vec<Uuid> = book
            .campaigns
            .iter()
            .filter(|campaign| request.account_id.map_or(true, |id| campaign.account_id == id))
            .map(|campaign| campaign.id)
            .collect();
        let mut cache = SpendCache::new(
            self.spend,
            self.clock,
            self.settings.spend_cache_ttl,
            scoped.clone(),
        );
        let campaigns = candidate_campaigns(book, &scoped, &window, &mut cache);
        let generator = StatementGenerator::new(self.rates, self.clock, self.settings);

        for campaign_id in campaigns {
            let Some(range) = campaign_date_range(book, campaign_id, request.from_date, today)
            else {
                debug!(campaign = %campaign_id, "no budgeted dates to reprocess");
                continue;
            };

            let snapshot = book.snapshot_campaign(campaign_id);
            let mut dates = Vec::new();
            let mut pcts = Vec::new();
            let mut overspend_errors = 0;
            let result: Result<(), CoreError> = range.iter_days().try_for_each(|date| {
                let spend = cache.campaign(date, campaign_id);
                let outcome = generator.generate(book, campaign_id, date, spend)?;
                if outcome.overspend_error.is_some() {
                    overspend_errors += 1;
                }
                if request.collect_spend_pcts {
                    pcts.push((date, effective_spend(book, campaign_id, date, spend)));
                }
                dates.push(date);
                Ok(())
            });

            match result {
                Ok(()) => {
                    debug!(campaign = %campaign_id, range = %range, "campaign reprocessed");
                    report.overspend_errors += overspend_errors;
                    report
                        .effective_spend
                        .extend(pcts.into_iter().map(|(date, pct)| ((date, campaign_id), pct)));
                    report.processed.insert(campaign_id, dates);
                }
                Err(err) => {
                    book.restore_campaign(snapshot);
                    error!(campaign = %campaign_id, error = %err, "campaign rolled back");
                    report.failures.push(CampaignFailure {
                        campaign_id,
                        error: err.to_string(),
                    });
                }
            }
        }

        book.touch();
        info!(
            campaigns = report.processed.len(),
            dates = report.dates_processed(),
            failures = report.failures.len(),
            spend_fetches = cache.fetches(),
            "reprocessing finished"
        );
        Ok(report)
    }
}

/// Live campaigns in scope plus archived ones that still have budgets or
/// spend in the window.
fn candidate_campaigns(
    book: &Book,
    scoped: &[Uuid],
    window: &DateRange,
    cache: &mut SpendCache<'_>,
) -> BTreeSet<Uuid> {
    let mut selected = BTreeSet::new();
    let mut archived = Vec::new();
    for id in scoped {
        let Some(campaign) = book.campaign(*id) else {
            continue;
        };
        if !campaign.archived || !book.budgets_overlapping(*id, window).is_empty() {
            selected.insert(*id);
        } else {
            archived.push(*id);
        }
    }
    if !archived.is_empty() {
        for date in window.iter_days() {
            let spend = cache.get(date);
            archived.retain(|id| {
                let has_spend = spend.get(id).is_some_and(|s| !s.sanitized().is_zero());
                if has_spend {
                    selected.insert(*id);
                }
                !has_spend
            });
            if archived.is_empty() {
                break;
            }
        }
    }
    selected
}

/// `[max(min(from, first unprocessed), first budget start), min(last budget end, today)]`.
fn campaign_date_range(
    book: &Book,
    campaign_id: Uuid,
    from: NaiveDate,
    today: NaiveDate,
) -> Option<DateRange> {
    let budgets = book.campaign_budgets(campaign_id);
    let earliest = budgets.iter().map(|budget| budget.start_date).min()?;
    let latest = budgets.iter().map(|budget| budget.end_date).max()?;
    let end = latest.min(today);

    let first_unprocessed = DateRange::new(earliest, end).ok().and_then(|span| {
        span.iter_days().find(|date| {
            budgets.iter().any(|budget| budget.is_active_on(*date))
                && !book.has_campaign_statement_on(campaign_id, *date)
        })
    });
    let start = first_unprocessed.map_or(from, |date| date.min(from)).max(earliest);
    DateRange::new(start, end).ok()
}

fn effective_spend(
    book: &Book,
    campaign_id: Uuid,
    date: NaiveDate,
    actual: CampaignSpend,
) -> EffectiveSpend {
    let statements = book.campaign_statements_on(campaign_id, date);
    let attributed = statements.iter().map(|s| s.spend_nano()).sum();
    let fee = statements.iter().map(|s| s.license_fee_nano).sum();
    let margin = statements.iter().map(|s| s.margin_nano).sum();
    EffectiveSpend::compute(actual.sanitized().total_nano(), attributed, fee, margin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn effective_spend_ratios_default_to_zero() {
        let pct = EffectiveSpend::compute(0, 0, 0, 0);
        assert_eq!(pct, EffectiveSpend::default());

        let pct = EffectiveSpend::compute(200, 100, 20, 12);
        assert_eq!(pct.pct_actual_spend, dec!(0.5));
        assert_eq!(pct.pct_license_fee, dec!(0.2));
        assert_eq!(pct.pct_margin, dec!(0.1));
    }
}
