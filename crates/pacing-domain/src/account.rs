use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Groups accounts that may share agency-level credits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Agency {
    pub id: Uuid,
    pub name: String,
}

impl Agency {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
        }
    }
}

/// Service level of an account. Only managed accounts get capped projections.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum AccountType {
    #[default]
    Unknown,
    Test,
    Sandbox,
    Pilot,
    Activated,
    SelfManaged,
    Managed,
}

impl AccountType {
    pub fn is_managed(self) -> bool {
        matches!(self, AccountType::Managed)
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AccountType::Unknown => "Unknown",
            AccountType::Test => "Test",
            AccountType::Sandbox => "Sandbox",
            AccountType::Pilot => "Pilot",
            AccountType::Activated => "Activated",
            AccountType::SelfManaged => "Self-managed",
            AccountType::Managed => "Managed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agency_id: Option<Uuid>,
    #[serde(default)]
    pub account_type: AccountType,
}

impl Account {
    pub fn new(name: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            agency_id: None,
            account_type,
        }
    }

    pub fn with_agency(mut self, agency_id: Uuid) -> Self {
        self.agency_id = Some(agency_id);
        self
    }
}

/// Owner of budgets. Read-only to the pacing engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Campaign {
    pub id: Uuid,
    pub account_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub archived: bool,
    /// When set, a separate real-time stop keeps spend within budget and
    /// overspend is never absorbed into a catch-all statement.
    #[serde(default)]
    pub real_time_campaign_stop: bool,
}

impl Campaign {
    pub fn new(account_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            name: name.into(),
            archived: false,
            real_time_campaign_stop: false,
        }
    }
}
