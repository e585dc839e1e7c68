//! Per-date spend lookups shared by every campaign of one reprocessing run.

use std::collections::HashMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    sources::{CampaignSpend, SpendSource},
    time::Clock,
};

struct CachedDay {
    fetched_at: DateTime<Utc>,
    spend: HashMap<Uuid, CampaignSpend>,
}

/// Fetches spend once per date for the whole campaign scope and keeps it
/// for `ttl`. A failed fetch is logged and treated as no spend; failures
/// are not cached.
pub struct SpendCache<'a> {
    source: &'a dyn SpendSource,
    clock: &'a dyn Clock,
    ttl: Duration,
    campaign_ids: Vec<Uuid>,
    days: HashMap<NaiveDate, CachedDay>,
    empty: HashMap<Uuid, CampaignSpend>,
    fetches: usize,
}

impl<'a> SpendCache<'a> {
    pub fn new(
        source: &'a dyn SpendSource,
        clock: &'a dyn Clock,
        ttl: Duration,
        campaign_ids: Vec<Uuid>,
    ) -> Self {
        Self {
            source,
            clock,
            ttl,
            campaign_ids,
            days: HashMap::new(),
            empty: HashMap::new(),
            fetches: 0,
        }
    }

    /// Spend of one campaign on `date`; zero when absent or the fetch failed.
    pub fn campaign(&mut self, date: NaiveDate, campaign_id: Uuid) -> CampaignSpend {
        self.get(date)
            .get(&campaign_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn get(&mut self, date: NaiveDate) -> &HashMap<Uuid, CampaignSpend> {
        let now = self.clock.now();
        let fresh = self
            .days
            .get(&date)
            .is_some_and(|day| now - day.fetched_at < self.ttl);
        if !fresh {
            self.fetches += 1;
            match self.source.campaign_spend(date, &self.campaign_ids) {
                Ok(spend) => {
                    debug!(%date, campaigns = spend.len(), "spend fetched");
                    self.days.insert(
                        date,
                        CachedDay {
                            fetched_at: now,
                            spend,
                        },
                    );
                }
                Err(err) => {
                    warn!(%date, error = %err, "spend fetch failed, treating as zero");
                    self.days.remove(&date);
                }
            }
        }
        match self.days.get(&date) {
            Some(day) => &day.spend,
            None => &self.empty,
        }
    }

    pub fn invalidate(&mut self, date: NaiveDate) {
        self.days.remove(&date);
    }

    pub fn clear(&mut self) {
        self.days.clear();
    }

    /// Number of calls made to the underlying source.
    pub fn fetches(&self) -> usize {
        self.fetches
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::{time::FixedClock, CoreError};

    struct CountingSource {
        calls: Cell<usize>,
        campaign: Uuid,
        fail: bool,
    }

    impl SpendSource for CountingSource {
        fn campaign_spend(
            &self,
            _date: NaiveDate,
            campaign_ids: &[Uuid],
        ) -> Result<HashMap<Uuid, CampaignSpend>, CoreError> {
            self.calls.set(self.calls.get() + 1);
            if self.fail {
                return Err(CoreError::SpendSource("warehouse offline".into()));
            }
            Ok(campaign_ids
                .iter()
                .filter(|id| **id == self.campaign)
                .map(|id| (*id, CampaignSpend::new(10, 2)))
                .collect())
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    #[test]
    fn fetches_each_date_once_within_ttl() {
        let campaign = Uuid::new_v4();
        let source = CountingSource {
            calls: Cell::new(0),
            campaign,
            fail: false,
        };
        let clock = FixedClock::on(day());
        let mut cache = SpendCache::new(&source, &clock, Duration::hours(1), vec![campaign]);

        assert_eq!(cache.campaign(day(), campaign), CampaignSpend::new(10, 2));
        assert_eq!(cache.campaign(day(), campaign).total_nano(), 12);
        assert!(cache.campaign(day(), Uuid::new_v4()).is_zero());
        assert_eq!(source.calls.get(), 1);

        cache.invalidate(day());
        cache.campaign(day(), campaign);
        assert_eq!(cache.fetches(), 2);
    }

    #[test]
    fn expired_entries_are_refetched() {
        let campaign = Uuid::new_v4();
        let source = CountingSource {
            calls: Cell::new(0),
            campaign,
            fail: false,
        };
        let clock = FixedClock::on(day());
        let mut cache = SpendCache::new(&source, &clock, Duration::zero(), vec![campaign]);
        cache.get(day());
        cache.get(day());
        assert_eq!(source.calls.get(), 2);
    }

    #[test]
    fn failed_fetch_reads_as_zero() {
        let campaign = Uuid::new_v4();
        let source = CountingSource {
            calls: Cell::new(0),
            campaign,
            fail: true,
        };
        let clock = FixedClock::on(day());
        let mut cache = SpendCache::new(&source, &clock, Duration::hours(1), vec![campaign]);
        assert!(cache.campaign(day(), campaign).is_zero());
        assert!(cache.get(day()).is_empty());
        assert_eq!(source.calls.get(), 2);
    }
}
