//! Budget projections: allocation, pacing and end-of-period spend estimates
//! per account or campaign over a reporting window.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

use chrono::NaiveDate;
use pacing_domain::{
    from_nano, quantize, Account, Book, BudgetLineItem, CreditOwner, DateRange,
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::{settings::EngineSettings, time::Clock, CoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectionBreakdown {
    Account,
    Campaign,
}

impl fmt::Display for ProjectionBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProjectionBreakdown::Account => f.write_str("account"),
            ProjectionBreakdown::Campaign => f.write_str("campaign"),
        }
    }
}

impl FromStr for ProjectionBreakdown {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "account" => Ok(ProjectionBreakdown::Account),
            "campaign" => Ok(ProjectionBreakdown::Campaign),
            other => Err(CoreError::Validation(format!(
                "unknown breakdown `{other}`, expected account or campaign"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionRequest {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub breakdown: ProjectionBreakdown,
    /// Entities to report on; every account or campaign in the book when unset.
    pub entity_ids: Option<Vec<Uuid>>,
}

impl ProjectionRequest {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, breakdown: ProjectionBreakdown) -> Self {
        Self {
            start_date,
            end_date,
            breakdown,
            entity_ids: None,
        }
    }

    pub fn for_entities(mut self, ids: Vec<Uuid>) -> Self {
        self.entity_ids = Some(ids);
        self
    }
}

/// Budget health of one entity. `None` means not applicable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProjectionRow {
    pub allocated_total_budget: Option<Decimal>,
    pub allocated_media_budget: Option<Decimal>,
    pub ideal_daily_media_spend: Option<Decimal>,
    pub ideal_media_spend: Option<Decimal>,
    pub attributed_media_spend: Option<Decimal>,
    pub attributed_license_fee: Option<Decimal>,
    pub attributed_margin: Option<Decimal>,
    pub pacing: Option<Decimal>,
    pub media_spend_projection: Option<Decimal>,
    pub license_fee_projection: Option<Decimal>,
    pub flat_fee: Option<Decimal>,
    pub total_fee: Option<Decimal>,
    pub total_fee_projection: Option<Decimal>,
}

impl ProjectionRow {
    pub fn fields(&self) -> BTreeMap<&'static str, Option<Decimal>> {
        BTreeMap::from([
            ("allocated_total_budget", self.allocated_total_budget),
            ("allocated_media_budget", self.allocated_media_budget),
            ("ideal_daily_media_spend", self.ideal_daily_media_spend),
            ("ideal_media_spend", self.ideal_media_spend),
            ("attributed_media_spend", self.attributed_media_spend),
            ("attributed_license_fee", self.attributed_license_fee),
            ("attributed_margin", self.attributed_margin),
            ("pacing", self.pacing),
            ("media_spend_projection", self.media_spend_projection),
            ("license_fee_projection", self.license_fee_projection),
            ("flat_fee", self.flat_fee),
            ("total_fee", self.total_fee),
            ("total_fee_projection", self.total_fee_projection),
        ])
    }

    pub fn is_empty(&self) -> bool {
        self.fields().values().all(Option::is_none)
    }

    fn quantized(&self) -> Self {
        let q = |value: Option<Decimal>| value.map(quantize);
        Self {
            allocated_total_budget: q(self.allocated_total_budget),
            allocated_media_budget: q(self.allocated_media_budget),
            ideal_daily_media_spend: q(self.ideal_daily_media_spend),
            ideal_media_spend: q(self.ideal_media_spend),
            attributed_media_spend: q(self.attributed_media_spend),
            attributed_license_fee: q(self.attributed_license_fee),
            attributed_margin: q(self.attributed_margin),
            pacing: q(self.pacing),
            media_spend_projection: q(self.media_spend_projection),
            license_fee_projection: q(self.license_fee_projection),
            flat_fee: q(self.flat_fee),
            total_fee: q(self.total_fee),
            total_fee_projection: q(self.total_fee_projection),
        }
    }
}

/// Projection results for one window. Values are kept exact and only
/// quantized when read through [`BudgetProjections::row`] or [`BudgetProjections::totals`].
#[derive(Debug, Clone)]
pub struct BudgetProjections {
    window: DateRange,
    breakdown: ProjectionBreakdown,
    projection_date: NaiveDate,
    first_of_month: bool,
    past_days: i64,
    rows: BTreeMap<Uuid, ProjectionRow>,
    totals: ProjectionRow,
}

/// Calendar facts shared by every row of a run.
struct Timeline {
    window: DateRange,
    today: NaiveDate,
    projection_date: NaiveDate,
    first_of_month: bool,
    past_days: i64,
    forecast_days: i64,
    confidence_offset_days: i64,
}

impl Timeline {
    fn new(window: DateRange, today: NaiveDate, confidence_offset_days: i64) -> Self {
        let yesterday = today.pred_opt().unwrap_or(today);
        let (projection_date, first_of_month) = if window.start == today {
            (window.start, true)
        } else {
            (yesterday.min(window.end), false)
        };
        Self {
            window,
            today,
            projection_date,
            first_of_month,
            past_days: (projection_date - window.start).num_days() + 1,
            forecast_days: window.days(),
            confidence_offset_days,
        }
    }

    fn has_started(&self) -> bool {
        self.past_days > 0
    }

    /// Dates with confident actuals, `None` before the window starts.
    fn actuals(&self) -> Option<DateRange> {
        DateRange::new(self.window.start, self.projection_date).ok()
    }

    /// End-of-window estimate of `attributed`, never above `cap` unless
    /// `attributed` already is.
    fn project(&self, attributed: Decimal, cap: Decimal, managed: bool, spend_days: i64) -> Decimal {
        if self.window.end < self.today {
            return attributed;
        }
        if managed && (self.first_of_month || spend_days < self.confidence_offset_days) {
            return cap.max(attributed);
        }
        let daily_rate = if self.has_started() {
            attributed / Decimal::from(self.past_days)
        } else {
            Decimal::ZERO
        };
        (daily_rate * Decimal::from(self.forecast_days))
            .min(cap)
            .max(attributed)
    }
}

#[derive(Debug, Default)]
struct Attributed {
    spend_nano: i64,
    license_fee_nano: i64,
    margin_nano: i64,
    spend_days: i64,
}

impl BudgetProjections {
    pub fn compute(
        book: &Book,
        request: &ProjectionRequest,
        clock: &dyn Clock,
        settings: &EngineSettings,
    ) -> Result<Self, CoreError> {
        let window = DateRange::new(request.start_date, request.end_date)?;
        let timeline = Timeline::new(window, clock.today(), settings.confidence_offset_days);
        let entity_ids = match &request.entity_ids {
            Some(ids) => ids.clone(),
            None => match request.breakdown {
                ProjectionBreakdown::Account => book.accounts.iter().map(|a| a.id).collect(),
                ProjectionBreakdown::Campaign => book.campaigns.iter().map(|c| c.id).collect(),
            },
        };

        let mut rows = BTreeMap::new();
        for id in entity_ids {
            let row = match request.breakdown {
                ProjectionBreakdown::Account => {
                    let account = book.account(id).ok_or(CoreError::AccountNotFound(id))?;
                    let campaigns: Vec<Uuid> =
                        book.campaigns_of_account(id).map(|c| c.id).collect();
                    let mut row = entity_row(book, &campaigns, account, &timeline)?;
                    if !row.is_empty() {
                        apply_flat_fee(&mut row, book, account, &timeline);
                    }
                    row
                }
                ProjectionBreakdown::Campaign => {
                    let account = book
                        .account_of_campaign(id)
                        .ok_or(CoreError::CampaignNotFound(id))?;
                    let mut row = entity_row(book, &[id], account, &timeline)?;
                    if !row.is_empty() {
                        row.total_fee = row.attributed_license_fee;
                        row.total_fee_projection = row.license_fee_projection;
                    }
                    row
                }
            };
            rows.insert(id, row);
        }

        let totals = totals_row(rows.values(), timeline.has_started());
        debug!(
            window = %window,
            breakdown = %request.breakdown,
            projection_date = %timeline.projection_date,
            rows = rows.len(),
            "projections computed"
        );
        Ok(Self {
            window,
            breakdown: request.breakdown,
            projection_date: timeline.projection_date,
            first_of_month: timeline.first_of_month,
            past_days: timeline.past_days,
            rows,
            totals,
        })
    }

    pub fn window(&self) -> DateRange {
        self.window
    }

    pub fn breakdown(&self) -> ProjectionBreakdown {
        self.breakdown
    }

    pub fn projection_date(&self) -> NaiveDate {
        self.projection_date
    }

    pub fn is_first_of_month(&self) -> bool {
        self.first_of_month
    }

    pub fn has_started(&self) -> bool {
        self.past_days > 0
    }

    pub fn row(&self, id: Uuid) -> Option<ProjectionRow> {
        self.rows.get(&id).map(ProjectionRow::quantized)
    }

    pub fn rows(&self) -> impl Iterator<Item = (Uuid, ProjectionRow)> + '_ {
        self.rows.iter().map(|(id, row)| (*id, row.quantized()))
    }

    pub fn totals(&self) -> ProjectionRow {
        self.totals.quantized()
    }

    /// Entity id to field mapping, quantized.
    pub fn data(&self) -> BTreeMap<Uuid, BTreeMap<&'static str, Option<Decimal>>> {
        self.rows
            .iter()
            .map(|(id, row)| (*id, row.quantized().fields()))
            .collect()
    }
}

/// Row for the budgets of `campaigns`, without flat fee. All `None` when no
/// budget overlaps the window.
fn entity_row(
    book: &Book,
    campaigns: &[Uuid],
    account: &Account,
    timeline: &Timeline,
) -> Result<ProjectionRow, CoreError> {
    let budgets: Vec<&BudgetLineItem> = campaigns
        .iter()
        .flat_map(|id| book.budgets_overlapping(*id, &timeline.window))
        .collect();
    if budgets.is_empty() {
        return Ok(ProjectionRow::default());
    }

    let mut allocated_total = Decimal::ZERO;
    let mut allocated_media = Decimal::ZERO;
    for budget in &budgets {
        let credit = book
            .credit(budget.credit_id)
            .ok_or(CoreError::CreditNotFound(budget.credit_id))?;
        allocated_total += budget.allocated_total(&timeline.window);
        allocated_media += budget.allocated_media(credit, &timeline.window);
    }

    let attributed = attributed_in(book, &budgets, timeline.actuals());
    let attributed_spend = from_nano(attributed.spend_nano);
    let attributed_fee = from_nano(attributed.license_fee_nano);
    let ideal_daily = allocated_media / Decimal::from(timeline.forecast_days);
    let ideal = ideal_daily * Decimal::from(timeline.past_days.max(0));
    let managed = account.account_type.is_managed();

    Ok(ProjectionRow {
        allocated_total_budget: Some(allocated_total),
        allocated_media_budget: Some(allocated_media),
        ideal_daily_media_spend: Some(ideal_daily),
        ideal_media_spend: Some(ideal),
        attributed_media_spend: Some(attributed_spend),
        attributed_license_fee: Some(attributed_fee),
        attributed_margin: Some(from_nano(attributed.margin_nano)),
        pacing: pacing(attributed_spend, ideal),
        media_spend_projection: Some(timeline.project(
            attributed_spend,
            allocated_media,
            managed,
            attributed.spend_days,
        )),
        license_fee_projection: Some(timeline.project(
            attributed_fee,
            allocated_total - allocated_media,
            managed,
            attributed.spend_days,
        )),
        flat_fee: None,
        total_fee: None,
        total_fee_projection: None,
    })
}

fn attributed_in(book: &Book, budgets: &[&BudgetLineItem], actuals: Option<DateRange>) -> Attributed {
    let Some(actuals) = actuals else {
        return Attributed::default();
    };
    let mut totals = Attributed::default();
    let mut spend_dates = BTreeSet::new();
    for budget in budgets {
        for statement in book
            .budget_statements(budget.id)
            .filter(|s| actuals.contains(s.date))
        {
            totals.spend_nano += statement.spend_nano();
            totals.license_fee_nano += statement.license_fee_nano;
            totals.margin_nano += statement.margin_nano;
            if statement.spend_nano() > 0 {
                spend_dates.insert(statement.date);
            }
        }
    }
    totals.spend_days = spend_dates.len() as i64;
    totals
}

fn pacing(attributed: Decimal, ideal: Decimal) -> Option<Decimal> {
    if ideal.is_zero() {
        return None;
    }
    Some(attributed / ideal * Decimal::ONE_HUNDRED)
}

/// Own credits' flat fee plus an even share of agency credits' flat fee among
/// the agency accounts with spend in the window.
fn apply_flat_fee(row: &mut ProjectionRow, book: &Book, account: &Account, timeline: &Timeline) {
    let window = &timeline.window;
    let mut flat_fee: Decimal = book
        .credits
        .iter()
        .filter(|credit| credit.owner == CreditOwner::Account(account.id))
        .map(|credit| credit.flat_fee_in_range(window))
        .sum();

    if let Some(agency_id) = account.agency_id {
        let agency_fee: Decimal = book
            .credits
            .iter()
            .filter(|credit| credit.owner == CreditOwner::Agency(agency_id))
            .map(|credit| credit.flat_fee_in_range(window))
            .sum();
        if !agency_fee.is_zero() {
            let spending: Vec<Uuid> = book
                .accounts_of_agency(agency_id)
                .filter(|sibling| account_spend_nano(book, sibling.id, timeline) > 0)
                .map(|sibling| sibling.id)
                .collect();
            if spending.contains(&account.id) {
                flat_fee += agency_fee / Decimal::from(spending.len());
            }
        }
    }

    row.flat_fee = Some(flat_fee);
    row.total_fee = row.attributed_license_fee.map(|fee| fee + flat_fee);
    row.total_fee_projection = row.license_fee_projection.map(|fee| fee + flat_fee);
}

fn account_spend_nano(book: &Book, account_id: Uuid, timeline: &Timeline) -> i64 {
    let budgets: Vec<&BudgetLineItem> = book
        .campaigns_of_account(account_id)
        .flat_map(|campaign| book.budgets_overlapping(campaign.id, &timeline.window))
        .collect();
    attributed_in(book, &budgets, timeline.actuals()).spend_nano
}

fn totals_row<'a>(rows: impl Iterator<Item = &'a ProjectionRow>, started: bool) -> ProjectionRow {
    let sum = |acc: Option<Decimal>, value: Option<Decimal>| match (acc, value) {
        (Some(a), Some(b)) => Some(a + b),
        (a, b) => a.or(b),
    };
    let mut totals = ProjectionRow::default();
    for row in rows {
        totals.allocated_total_budget =
            sum(totals.allocated_total_budget, row.allocated_total_budget);
        totals.allocated_media_budget =
            sum(totals.allocated_media_budget, row.allocated_media_budget);
        if !started {
            continue;
        }
        totals.ideal_daily_media_spend =
            sum(totals.ideal_daily_media_spend, row.ideal_daily_media_spend);
        totals.ideal_media_spend = sum(totals.ideal_media_spend, row.ideal_media_spend);
        totals.attributed_media_spend =
            sum(totals.attributed_media_spend, row.attributed_media_spend);
        totals.attributed_license_fee =
            sum(totals.attributed_license_fee, row.attributed_license_fee);
        totals.attributed_margin = sum(totals.attributed_margin, row.attributed_margin);
        totals.media_spend_projection =
            sum(totals.media_spend_projection, row.media_spend_projection);
        totals.license_fee_projection =
            sum(totals.license_fee_projection, row.license_fee_projection);
        totals.flat_fee = sum(totals.flat_fee, row.flat_fee);
        totals.total_fee = sum(totals.total_fee, row.total_fee);
        totals.total_fee_projection = sum(totals.total_fee_projection, row.total_fee_projection);
    }
    if started {
        totals.pacing = match (totals.attributed_media_spend, totals.ideal_media_spend) {
            (Some(attributed), Some(ideal)) => pacing(attributed, ideal),
            _ => None,
        };
    }
    totals
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, m, d).unwrap()
    }

    fn november() -> DateRange {
        DateRange::new(date(11, 1), date(11, 30)).unwrap()
    }

    #[test]
    fn projection_date_is_yesterday_clamped_to_window_end() {
        let mid = Timeline::new(november(), date(11, 16), 7);
        assert_eq!(mid.projection_date, date(11, 15));
        assert_eq!(mid.past_days, 15);
        assert!(!mid.first_of_month);

        let after = Timeline::new(november(), date(12, 20), 7);
        assert_eq!(after.projection_date, date(11, 30));
        assert_eq!(after.past_days, 30);

        let before = Timeline::new(november(), date(10, 20), 7);
        assert!(!before.has_started());
        assert!(before.actuals().is_none());
    }

    #[test]
    fn first_day_of_window_uses_start_as_projection_date() {
        let first = Timeline::new(november(), date(11, 1), 7);
        assert!(first.first_of_month);
        assert_eq!(first.projection_date, date(11, 1));
        assert_eq!(first.past_days, 1);
        assert_eq!(first.project(Decimal::ZERO, dec!(2400), true, 0), dec!(2400));
    }

    #[test]
    fn projection_stays_between_attributed_and_cap() {
        let timeline = Timeline::new(november(), date(11, 11), 7);
        // 10 days elapsed at 100/day extrapolates to 3000.
        assert_eq!(timeline.project(dec!(1000), dec!(2500), false, 10), dec!(2500));
        assert_eq!(timeline.project(dec!(500), dec!(2500), false, 10), dec!(1500));
        assert_eq!(timeline.project(dec!(500), dec!(2500), true, 3), dec!(2500));
        assert_eq!(timeline.project(dec!(500), dec!(2500), false, 3), dec!(1500));
    }

    #[test]
    fn projection_never_drops_below_attributed() {
        let timeline = Timeline::new(november(), date(11, 16), 7);
        assert_eq!(timeline.project(dec!(3000), dec!(2400), false, 15), dec!(3000));
        assert_eq!(timeline.project(dec!(3000), dec!(2400), true, 3), dec!(3000));
        assert_eq!(timeline.project(dec!(300), dec!(240), false, 15), dec!(300));
    }

    #[test]
    fn finished_window_projects_actuals() {
        let timeline = Timeline::new(november(), date(12, 5), 7);
        assert_eq!(timeline.project(dec!(700), dec!(2500), true, 0), dec!(700));
    }

    #[test]
    fn pacing_is_undefined_without_ideal_spend() {
        assert_eq!(pacing(dec!(10), Decimal::ZERO), None);
        assert_eq!(pacing(dec!(50), dec!(40)), Some(dec!(125)));
    }

    #[test]
    fn totals_before_start_only_sum_allocations() {
        let row = ProjectionRow {
            allocated_total_budget: Some(dec!(100)),
            allocated_media_budget: Some(dec!(80)),
            attributed_media_spend: Some(Decimal::ZERO),
            ..ProjectionRow::default()
        };
        let totals = totals_row([row.clone(), row].iter(), false);
        assert_eq!(totals.allocated_total_budget, Some(dec!(200)));
        assert_eq!(totals.allocated_media_budget, Some(dec!(160)));
        assert_eq!(totals.attributed_media_spend, None);
        assert_eq!(totals.pacing, None);
    }

    #[test]
    fn breakdown_parses_case_insensitively() {
        assert_eq!("Account".parse::<ProjectionBreakdown>().unwrap(), ProjectionBreakdown::Account);
        assert!("agency".parse::<ProjectionBreakdown>().is_err());
    }
}
