//! In-memory snapshot of every entity the pacing engine reads and writes.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    account::{Account, Agency, Campaign},
    budget::{waterfall_order, BudgetLineItem},
    common::DateRange,
    credit::CreditLineItem,
    currency::FxTable,
    statement::BudgetDailyStatement,
};

type StatementKey = (Uuid, NaiveDate);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub name: String,
    #[serde(default)]
    pub agencies: Vec<Agency>,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub campaigns: Vec<Campaign>,
    #[serde(default)]
    pub credits: Vec<CreditLineItem>,
    #[serde(default)]
    pub budgets: Vec<BudgetLineItem>,
    /// At most one statement per (budget, date); the map key enforces it.
    #[serde(default, with = "statement_list")]
    statements: BTreeMap<StatementKey, BudgetDailyStatement>,
    #[serde(default)]
    pub fx: FxTable,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            agencies: Vec::new(),
            accounts: Vec::new(),
            campaigns: Vec::new(),
            credits: Vec::new(),
            budgets: Vec::new(),
            statements: BTreeMap::new(),
            fx: FxTable::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn add_agency(&mut self, agency: Agency) -> Uuid {
        let id = agency.id;
        self.agencies.push(agency);
        id
    }

    pub fn add_account(&mut self, account: Account) -> Uuid {
        let id = account.id;
        self.accounts.push(account);
        id
    }

    pub fn add_campaign(&mut self, campaign: Campaign) -> Uuid {
        let id = campaign.id;
        self.campaigns.push(campaign);
        id
    }

    pub fn add_credit(&mut self, credit: CreditLineItem) -> Uuid {
        let id = credit.id;
        self.credits.push(credit);
        id
    }

    pub fn add_budget(&mut self, budget: BudgetLineItem) -> Uuid {
        let id = budget.id;
        self.budgets.push(budget);
        id
    }

    pub fn agency(&self, id: Uuid) -> Option<&Agency> {
        self.agencies.iter().find(|agency| agency.id == id)
    }

    pub fn account(&self, id: Uuid) -> Option<&Account> {
        self.accounts.iter().find(|account| account.id == id)
    }

    pub fn campaign(&self, id: Uuid) -> Option<&Campaign> {
        self.campaigns.iter().find(|campaign| campaign.id == id)
    }

    pub fn campaign_mut(&mut self, id: Uuid) -> Option<&mut Campaign> {
        self.campaigns.iter_mut().find(|campaign| campaign.id == id)
    }

    pub fn credit(&self, id: Uuid) -> Option<&CreditLineItem> {
        self.credits.iter().find(|credit| credit.id == id)
    }

    pub fn budget(&self, id: Uuid) -> Option<&BudgetLineItem> {
        self.budgets.iter().find(|budget| budget.id == id)
    }

    pub fn account_of_campaign(&self, campaign_id: Uuid) -> Option<&Account> {
        self.campaign(campaign_id)
            .and_then(|campaign| self.account(campaign.account_id))
    }

    pub fn campaigns_of_account(&self, account_id: Uuid) -> impl Iterator<Item = &Campaign> {
        self.campaigns
            .iter()
            .filter(move |campaign| campaign.account_id == account_id)
    }

    pub fn accounts_of_agency(&self, agency_id: Uuid) -> impl Iterator<Item = &Account> {
        self.accounts
            .iter()
            .filter(move |account| account.agency_id == Some(agency_id))
    }

    /// Every budget of the campaign, in waterfall order.
    pub fn campaign_budgets(&self, campaign_id: Uuid) -> Vec<&BudgetLineItem> {
        let mut budgets: Vec<&BudgetLineItem> = self
            .budgets
            .iter()
            .filter(|budget| budget.campaign_id == campaign_id)
            .collect();
        budgets.sort_by(|a, b| waterfall_order(a, b));
        budgets
    }

    /// Budgets of the campaign active on `date`, in waterfall order.
    pub fn budgets_active_on(&self, campaign_id: Uuid, date: NaiveDate) -> Vec<&BudgetLineItem> {
        self.campaign_budgets(campaign_id)
            .into_iter()
            .filter(|budget| budget.is_active_on(date))
            .collect()
    }

    /// Budgets of the campaign intersecting `window`, in waterfall order.
    pub fn budgets_overlapping(
        &self,
        campaign_id: Uuid,
        window: &DateRange,
    ) -> Vec<&BudgetLineItem> {
        self.campaign_budgets(campaign_id)
            .into_iter()
            .filter(|budget| budget.overlap(window).is_some())
            .collect()
    }

    pub fn statement(&self, budget_id: Uuid, date: NaiveDate) -> Option<&BudgetDailyStatement> {
        self.statements.get(&(budget_id, date))
    }

    pub fn statements(&self) -> impl Iterator<Item = &BudgetDailyStatement> {
        self.statements.values()
    }

    /// Statements of one budget in date order.
    pub fn budget_statements(
        &self,
        budget_id: Uuid,
    ) -> impl Iterator<Item = &BudgetDailyStatement> {
        self.statements
            .range((budget_id, NaiveDate::MIN)..=(budget_id, NaiveDate::MAX))
            .map(|(_, statement)| statement)
    }

    /// Statements of one budget strictly before `date`.
    pub fn budget_statements_before(
        &self,
        budget_id: Uuid,
        date: NaiveDate,
    ) -> impl Iterator<Item = &BudgetDailyStatement> {
        self.statements
            .range((budget_id, NaiveDate::MIN)..(budget_id, date))
            .map(|(_, statement)| statement)
    }

    pub fn campaign_statements_on(
        &self,
        campaign_id: Uuid,
        date: NaiveDate,
    ) -> Vec<&BudgetDailyStatement> {
        self.campaign_budgets(campaign_id)
            .into_iter()
            .filter_map(|budget| self.statement(budget.id, date))
            .collect()
    }

    pub fn has_campaign_statement_on(&self, campaign_id: Uuid, date: NaiveDate) -> bool {
        self.budgets
            .iter()
            .filter(|budget| budget.campaign_id == campaign_id)
            .any(|budget| self.statements.contains_key(&(budget.id, date)))
    }

    /// Inserts or replaces the statement for its (budget, date).
    pub fn upsert_statement(&mut self, statement: BudgetDailyStatement) {
        self.statements
            .insert((statement.budget_id, statement.date), statement);
    }

    /// Deletes the statements of the given budgets on `date`, returning how many existed.
    pub fn remove_statements_on(&mut self, budget_ids: &[Uuid], date: NaiveDate) -> usize {
        budget_ids
            .iter()
            .filter(|id| self.statements.remove(&(**id, date)).is_some())
            .count()
    }

    /// Copies the campaign's budgets and statements so a failed run can be undone.
    pub fn snapshot_campaign(&self, campaign_id: Uuid) -> CampaignSnapshot {
        let budgets: Vec<BudgetLineItem> = self
            .budgets
            .iter()
            .filter(|budget| budget.campaign_id == campaign_id)
            .cloned()
            .collect();
        let statements = budgets
            .iter()
            .flat_map(|budget| self.budget_statements(budget.id).copied())
            .collect();
        CampaignSnapshot {
            campaign_id,
            budgets,
            statements,
        }
    }

    /// Puts the campaign's budgets and statements back exactly as snapshotted.
    pub fn restore_campaign(&mut self, snapshot: CampaignSnapshot) {
        let current: HashSet<Uuid> = self
            .budgets
            .iter()
            .filter(|budget| budget.campaign_id == snapshot.campaign_id)
            .map(|budget| budget.id)
            .collect();
        self.statements
            .retain(|(budget_id, _), _| !current.contains(budget_id));
        self.budgets
            .retain(|budget| budget.campaign_id != snapshot.campaign_id);
        self.budgets.extend(snapshot.budgets);
        for statement in snapshot.statements {
            self.upsert_statement(statement);
        }
    }
}

/// Campaign-scoped copy of budgets and statements taken before a reprocessing pass.
#[derive(Debug, Clone)]
pub struct CampaignSnapshot {
    pub campaign_id: Uuid,
    budgets: Vec<BudgetLineItem>,
    statements: Vec<BudgetDailyStatement>,
}

impl CampaignSnapshot {
    pub fn statement_count(&self) -> usize {
        self.statements.len()
    }
}

mod statement_list {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer, Serializer};

    use super::StatementKey;
    use crate::statement::BudgetDailyStatement;

    pub fn serialize<S>(
        statements: &BTreeMap<StatementKey, BudgetDailyStatement>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(statements.values())
    }

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<BTreeMap<StatementKey, BudgetDailyStatement>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let list = Vec::<BudgetDailyStatement>::deserialize(deserializer)?;
        Ok(list
            .into_iter()
            .map(|statement| ((statement.budget_id, statement.date), statement))
            .collect())
    }
}
