#![allow(dead_code)]

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use pacing_config::Config;
use pacing_core::{CampaignSpend, StaticSpend};
use pacing_domain::{Account, AccountType, Book, BudgetLineItem, Campaign, CreditLineItem, CreditOwner};
use rust_decimal_macros::dec;
use uuid::Uuid;

pub const UNIT: i64 = 1_000_000_000;

pub fn november(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 11, day).unwrap()
}

pub struct NovemberBook {
    pub book: Book,
    pub account: Uuid,
    pub campaign: Uuid,
    pub budget: Uuid,
}

/// Managed account, one 3000 budget over November, 20% license fee.
pub fn november_book() -> NovemberBook {
    let mut book = Book::new("November");
    let account = book.add_account(Account::new("Acme", AccountType::Managed));
    let campaign = book.add_campaign(Campaign::new(account, "Holiday"));
    let credit = book.add_credit(CreditLineItem::new(
        CreditOwner::Account(account),
        dec!(10000),
        dec!(0.2),
        november(1),
        november(30),
    ));
    let budget = book.add_budget(BudgetLineItem::new(
        campaign,
        credit,
        dec!(3000),
        november(1),
        november(30),
    ));
    NovemberBook {
        book,
        account,
        campaign,
        budget,
    }
}

/// 50 media + 30 data per day for the first fortnight of November.
pub fn first_fortnight_spend(campaign: Uuid) -> StaticSpend {
    let mut spend = StaticSpend::new();
    for day in 1..=15 {
        spend.insert(november(day), campaign, CampaignSpend::new(50 * UNIT, 30 * UNIT));
    }
    spend
}

pub fn write_json<T: serde::Serialize>(path: &Path, value: &T) {
    std::fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

/// Config whose book and backup roots live under `root`.
pub fn sandboxed_config(root: &Path) -> Config {
    Config {
        default_book_root: Some(root.join("books")),
        default_backup_root: Some(root.join("backups")),
        ..Config::default()
    }
}

pub fn book_file(root: &Path) -> PathBuf {
    root.join("november.json")
}
