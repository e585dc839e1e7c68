//! External inputs of the engine: observed spend and exchange rates.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use pacing_domain::{CurrencyCode, FxTable};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

/// Observed spend of one campaign on one day, in reporting-currency nano-units.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CampaignSpend {
    #[serde(default)]
    pub media_nano: i64,
    #[serde(default)]
    pub data_nano: i64,
}

impl CampaignSpend {
    pub fn new(media_nano: i64, data_nano: i64) -> Self {
        Self {
            media_nano,
            data_nano,
        }
    }

    pub fn total_nano(&self) -> i64 {
        self.media_nano + self.data_nano
    }

    pub fn is_zero(&self) -> bool {
        self.media_nano == 0 && self.data_nano == 0
    }

    /// Negative amounts are malformed aggregates and count as zero.
    pub fn sanitized(self) -> Self {
        Self {
            media_nano: self.media_nano.max(0),
            data_nano: self.data_nano.max(0),
        }
    }
}

/// Aggregated spend per campaign for a date, e.g. a query against the analytics store.
pub trait SpendSource {
    /// Totals for `date` restricted to `campaign_ids`. Campaigns without spend may be absent.
    fn campaign_spend(
        &self,
        date: NaiveDate,
        campaign_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, CampaignSpend>, CoreError>;
}

/// Exchange rate as units of `currency` per one reporting-currency unit.
pub trait RateLookup {
    fn rate(&self, currency: &CurrencyCode, date: NaiveDate) -> Result<Decimal, CoreError>;
}

impl RateLookup for FxTable {
    fn rate(&self, currency: &CurrencyCode, date: NaiveDate) -> Result<Decimal, CoreError> {
        self.lookup(currency, date)
            .map(|lookup| lookup.rate)
            .filter(|rate| rate.is_sign_positive() && !rate.is_zero())
            .ok_or_else(|| CoreError::ExchangeRate {
                currency: currency.to_string(),
                date,
            })
    }
}

/// Spend held in memory, keyed by date then campaign. Loadable from JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticSpend {
    by_date: BTreeMap<NaiveDate, HashMap<Uuid, CampaignSpend>>,
}

impl StaticSpend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, date: NaiveDate, campaign_id: Uuid, spend: CampaignSpend) {
        self.by_date
            .entry(date)
            .or_default()
            .insert(campaign_id, spend);
    }

    pub fn dates(&self) -> impl Iterator<Item = &NaiveDate> {
        self.by_date.keys()
    }
}

impl SpendSource for StaticSpend {
    fn campaign_spend(
        &self,
        date: NaiveDate,
        campaign_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, CampaignSpend>, CoreError> {
        let Some(day) = self.by_date.get(&date) else {
            return Ok(HashMap::new());
        };
        Ok(campaign_ids
            .iter()
            .filter_map(|id| day.get(id).map(|spend| (*id, *spend)))
            .collect())
    }
}
