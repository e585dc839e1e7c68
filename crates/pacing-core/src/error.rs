use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Campaign not found: {0}")]
    CampaignNotFound(Uuid),
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),
    #[error("Credit not found: {0}")]
    CreditNotFound(Uuid),
    #[error("No credit available to absorb overspend of campaign {campaign} on {date}")]
    NoCreditForOverspend { campaign: Uuid, date: NaiveDate },
    #[error("Exchange rate unavailable for {currency} on {date}")]
    ExchangeRate { currency: String, date: NaiveDate },
    #[error("Spend source failed: {0}")]
    SpendSource(String),
    #[error("Invalid date range: {0}")]
    InvalidRange(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serde(String),
    #[error("Validation failed: {0}")]
    Validation(String),
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serde(err.to_string())
    }
}

impl From<pacing_domain::DateRangeError> for CoreError {
    fn from(err: pacing_domain::DateRangeError) -> Self {
        CoreError::InvalidRange(err.to_string())
    }
}
