use std::{collections::BTreeMap, fmt};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// ISO 4217 currency representation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CurrencyCode(pub String);

impl CurrencyCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self::new("USD")
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FxTolerance {
    pub days: i64,
}

impl Default for FxTolerance {
    fn default() -> Self {
        Self { days: 5 }
    }
}

/// Daily exchange rates quoted as units of a currency per one unit of `base`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FxTable {
    #[serde(default)]
    pub base: CurrencyCode,
    #[serde(default)]
    rates: BTreeMap<String, BTreeMap<NaiveDate, Decimal>>,
    #[serde(default)]
    pub tolerance: FxTolerance,
}

impl FxTable {
    pub fn new(base: CurrencyCode) -> Self {
        Self {
            base,
            rates: BTreeMap::new(),
            tolerance: FxTolerance::default(),
        }
    }

    pub fn add_rate(&mut self, currency: &CurrencyCode, date: NaiveDate, rate: Decimal) {
        self.rates
            .entry(currency.0.clone())
            .or_default()
            .insert(date, rate);
    }

    /// Rate valid on `date`, falling back to the nearest prior quote within tolerance.
    pub fn lookup(&self, currency: &CurrencyCode, date: NaiveDate) -> Option<FxLookup> {
        if currency == &self.base {
            return Some(FxLookup {
                rate: Decimal::ONE,
                date,
                source: "parity",
            });
        }
        let series = self.rates.get(currency.as_str())?;
        if let Some(rate) = series.get(&date) {
            return Some(FxLookup {
                rate: *rate,
                date,
                source: "exact",
            });
        }
        if self.tolerance.days <= 0 {
            return None;
        }
        let (near_date, rate) = series.range(..=date).next_back()?;
        if (date - *near_date).num_days() <= self.tolerance.days {
            Some(FxLookup {
                rate: *rate,
                date: *near_date,
                source: "nearest_prior",
            })
        } else {
            None
        }
    }
}

impl Default for FxTable {
    fn default() -> Self {
        Self::new(CurrencyCode::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FxLookup {
    pub rate: Decimal,
    pub date: NaiveDate,
    pub source: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    #[test]
    fn base_currency_is_parity() {
        let table = FxTable::default();
        let lookup = table.lookup(&CurrencyCode::new("usd"), date(1)).unwrap();
        assert_eq!(lookup.rate, Decimal::ONE);
        assert_eq!(lookup.source, "parity");
    }

    #[test]
    fn falls_back_to_prior_rate_within_tolerance() {
        let mut table = FxTable::default();
        let eur = CurrencyCode::new("EUR");
        table.add_rate(&eur, date(1), dec!(0.9));

        let near = table.lookup(&eur, date(4)).unwrap();
        assert_eq!(near.rate, dec!(0.9));
        assert_eq!(near.date, date(1));

        assert!(table.lookup(&eur, date(20)).is_none());
        assert!(table.lookup(&CurrencyCode::new("GBP"), date(1)).is_none());
    }

    #[test]
    fn serializes_round_trip_as_json() {
        let mut table = FxTable::default();
        table.add_rate(&CurrencyCode::new("EUR"), date(2), dec!(0.91));
        let json = serde_json::to_string(&table).unwrap();
        let restored: FxTable = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, table);
    }
}
