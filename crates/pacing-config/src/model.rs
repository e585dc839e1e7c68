use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Persisted settings of the pacing engine and its CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "Config::default_reporting_currency")]
    pub reporting_currency: String,
    #[serde(default = "Config::default_confidence_offset_days")]
    pub confidence_offset_days: i64,
    /// Budgets starting on or after this date reserve margin during attribution.
    #[serde(default = "Config::default_margin_cutover_date")]
    pub margin_cutover_date: NaiveDate,
    #[serde(default = "Config::default_spend_cache_ttl_secs")]
    pub spend_cache_ttl_secs: u64,
    /// How many days back an exchange rate may be reused.
    #[serde(default = "Config::default_fx_tolerance_days")]
    pub fx_tolerance_days: i64,
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
    #[serde(default = "Config::default_ui_color_enabled")]
    pub ui_color_enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Optional custom root directory for books. Defaults to `~/Documents/PacingBooks`.
    pub default_book_root: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Optional custom root directory for book backups. Defaults to `~/Documents/PacingBooks/backups`.
    pub default_backup_root: Option<PathBuf>,

    #[serde(default = "Config::default_backup_retention")]
    pub backup_retention: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reporting_currency: Self::default_reporting_currency(),
            confidence_offset_days: Self::default_confidence_offset_days(),
            margin_cutover_date: Self::default_margin_cutover_date(),
            spend_cache_ttl_secs: Self::default_spend_cache_ttl_secs(),
            fx_tolerance_days: Self::default_fx_tolerance_days(),
            log_filter: None,
            ui_color_enabled: Self::default_ui_color_enabled(),
            default_book_root: None,
            default_backup_root: None,
            backup_retention: Self::default_backup_retention(),
        }
    }
}

impl Config {
    pub fn default_reporting_currency() -> String {
        "USD".into()
    }

    pub fn default_confidence_offset_days() -> i64 {
        7
    }

    pub fn default_margin_cutover_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2017, 6, 1).unwrap_or_default()
    }

    pub fn default_spend_cache_ttl_secs() -> u64 {
        3600
    }

    pub fn default_fx_tolerance_days() -> i64 {
        5
    }

    pub fn default_ui_color_enabled() -> bool {
        true
    }

    pub fn default_backup_retention() -> usize {
        5
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reporting_currency.trim().len() != 3 {
            return Err(ConfigError::Invalid(format!(
                "reporting_currency `{}` is not a three-letter code",
                self.reporting_currency
            )));
        }
        if self.confidence_offset_days < 0 {
            return Err(ConfigError::Invalid(
                "confidence_offset_days must not be negative".into(),
            ));
        }
        if self.fx_tolerance_days < 0 {
            return Err(ConfigError::Invalid(
                "fx_tolerance_days must not be negative".into(),
            ));
        }
        Ok(())
    }

    pub fn resolve_default_book_root(&self) -> PathBuf {
        if let Some(path) = &self.default_book_root {
            return path.clone();
        }

        let base = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        base.join("PacingBooks")
    }

    pub fn resolve_default_backup_root(&self) -> PathBuf {
        if let Some(path) = &self.default_backup_root {
            return path.clone();
        }
        self.resolve_default_book_root().join("backups")
    }
}
