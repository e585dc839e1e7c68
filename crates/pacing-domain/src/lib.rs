//! pacing-domain
//!
//! Entities and arithmetic for budget pacing: credits, budgets, daily
//! statements, date-range overlap and nano-unit money helpers.
//! No services, no logging, no storage.

pub mod account;
pub mod book;
pub mod budget;
pub mod common;
pub mod credit;
pub mod currency;
pub mod statement;

pub use account::{Account, AccountType, Agency, Campaign};
pub use book::{Book, CampaignSnapshot};
pub use budget::{get_overlap, waterfall_order, BudgetLineItem};
pub use common::{
    from_nano, quantize, to_nano, DateRange, DateRangeError, NANO_PER_UNIT, REPORT_DECIMALS,
};
pub use credit::{CreditLineItem, CreditOwner};
pub use currency::{CurrencyCode, FxLookup, FxTable, FxTolerance};
pub use statement::BudgetDailyStatement;
