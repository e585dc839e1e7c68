use chrono::NaiveDate;
use pacing_core::storage::BookStorage;
use pacing_domain::{
    Account, AccountType, Book, BudgetDailyStatement, BudgetLineItem, Campaign, CreditLineItem,
    CreditOwner,
};
use pacing_storage_json::JsonBookStorage;
use rust_decimal_macros::dec;
use tempfile::tempdir;

fn sample_book(name: &str) -> Book {
    let day = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
    let mut book = Book::new(name);
    let account = book.add_account(Account::new("Acme", AccountType::Managed));
    let campaign = book.add_campaign(Campaign::new(account, "Spring"));
    let credit = book.add_credit(CreditLineItem::new(
        CreditOwner::Account(account),
        dec!(1000),
        dec!(0.1),
        day,
        NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
    ));
    let budget = book.add_budget(BudgetLineItem::new(
        campaign,
        credit,
        dec!(500),
        day,
        NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
    ));
    let mut statement = BudgetDailyStatement::zero(budget, day);
    statement.media_spend_nano = 12_500_000_000;
    book.upsert_statement(statement);
    book
}

#[test]
fn json_storage_can_save_and_load_book() {
    let dir = tempdir().expect("tempdir");
    let storage = JsonBookStorage::new(dir.path().join("books"), dir.path().join("backups"))
        .expect("create storage");
    let book = sample_book("StorageTest");

    storage.save_book("Storage Test", &book).expect("save book");
    let loaded = storage.load_book("Storage Test").expect("load book");

    assert_eq!(loaded.name, "StorageTest");
    assert_eq!(loaded.budgets, book.budgets);
    assert_eq!(loaded.statements().count(), 1);
    let path = storage.book_path("Storage Test");
    assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("storage_test.json"));
    assert_eq!(storage.list_books().unwrap(), vec!["storage_test".to_string()]);

    let metadata = storage.list_book_metadata().expect("metadata");
    assert_eq!(metadata[0].statement_count, 1);
    assert_eq!(
        metadata[0].last_statement_date,
        NaiveDate::from_ymd_opt(2024, 3, 1)
    );

    storage.delete_book("Storage Test").expect("delete");
    assert!(storage.list_books().unwrap().is_empty());
}

#[test]
fn json_storage_creates_and_restores_backups() {
    let dir = tempdir().expect("tempdir");
    let storage = JsonBookStorage::new(dir.path().join("books"), dir.path().join("backups"))
        .expect("create storage");
    let book = sample_book("BackupTest");
    storage.save_book("backup-book", &book).expect("save book");

    let info = storage
        .backup_book("backup-book", &book, Some("before reprocess"))
        .expect("create backup");
    assert!(info.id.ends_with("_before-reprocess.json"));

    let backups = storage.list_backups("backup-book").expect("list backups");
    assert!(
        backups.iter().any(|entry| entry.id == info.id),
        "backup list should include created backup"
    );

    storage.delete_book("backup-book").expect("delete");
    let restored = storage.restore_backup(&info).expect("restore backup");
    assert_eq!(restored.name, book.name);
    assert!(storage.book_path("backup-book").exists());
}

#[test]
fn backups_beyond_retention_are_pruned() {
    let dir = tempdir().expect("tempdir");
    let storage =
        JsonBookStorage::with_retention(dir.path().join("books"), dir.path().join("backups"), 2)
            .expect("create storage");
    let book = sample_book("Pruned");

    for note in ["one", "two", "three", "four"] {
        storage
            .backup_book("pruned", &book, Some(note))
            .expect("backup");
    }
    assert_eq!(storage.list_backups("pruned").unwrap().len(), 2);
}

#[test]
fn unremovable_backup_does_not_fail_new_backup() {
    let dir = tempdir().expect("tempdir");
    let backups = dir.path().join("backups");
    let storage = JsonBookStorage::with_retention(dir.path().join("books"), backups.clone(), 1)
        .expect("create storage");
    let stuck = backups.join("stuck").join("stuck_20000101_000000_old.json");
    std::fs::create_dir_all(&stuck).expect("stuck entry");

    let info = storage
        .backup_book("stuck", &sample_book("Stuck"), Some("fresh"))
        .expect("backup");

    assert!(stuck.is_dir());
    let listed = storage.list_backups("stuck").unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, info.id);
}

#[test]
fn loading_missing_book_fails() {
    let dir = tempdir().expect("tempdir");
    let storage = JsonBookStorage::new(dir.path().join("books"), dir.path().join("backups"))
        .expect("create storage");
    assert!(storage.load_book("nope").is_err());
}
