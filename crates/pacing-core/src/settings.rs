use chrono::{Duration, NaiveDate};
use pacing_domain::CurrencyCode;

/// Tunables shared by every pacing service.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Currency observed spend and statement amounts are reported in.
    pub reporting_currency: CurrencyCode,
    /// Most recent days treated as provisional when judging projection signal.
    pub confidence_offset_days: i64,
    /// Budgets starting on or after this date take margin inline during attribution.
    pub margin_cutover_date: NaiveDate,
    pub spend_cache_ttl: Duration,
}

impl EngineSettings {
    pub const DEFAULT_CONFIDENCE_OFFSET_DAYS: i64 = 7;

    pub fn default_margin_cutover_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2017, 6, 1).unwrap_or_default()
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            reporting_currency: CurrencyCode::default(),
            confidence_offset_days: Self::DEFAULT_CONFIDENCE_OFFSET_DAYS,
            margin_cutover_date: Self::default_margin_cutover_date(),
            spend_cache_ttl: Duration::hours(1),
        }
    }
}
