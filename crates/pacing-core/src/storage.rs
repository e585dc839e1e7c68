use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use pacing_domain::Book;

use crate::CoreError;

/// Describes a persisted backup artifact for a book.
#[derive(Debug, Clone)]
pub struct BookBackupInfo {
    pub book: String,
    pub id: String,
    pub created_at: String,
    pub path: PathBuf,
}

/// Persistence backend for book snapshots and their backups.
pub trait BookStorage: Send + Sync {
    fn save_book(&self, name: &str, book: &Book) -> Result<(), CoreError>;
    fn load_book(&self, name: &str) -> Result<Book, CoreError>;
    fn list_books(&self) -> Result<Vec<String>, CoreError>;
    fn delete_book(&self, name: &str) -> Result<(), CoreError>;
    fn save_book_to_path(&self, book: &Book, path: &Path) -> Result<(), CoreError>;
    fn load_book_from_path(&self, path: &Path) -> Result<Book, CoreError>;
    fn backup_book(
        &self,
        name: &str,
        book: &Book,
        note: Option<&str>,
    ) -> Result<BookBackupInfo, CoreError>;
    fn list_backups(&self, name: &str) -> Result<Vec<BookBackupInfo>, CoreError>;
    fn restore_backup(&self, backup: &BookBackupInfo) -> Result<Book, CoreError>;
}

/// Dangling references and inverted ranges found in a book snapshot.
pub fn book_warnings(book: &Book) -> Vec<String> {
    let account_ids: HashSet<_> = book.accounts.iter().map(|a| a.id).collect();
    let campaign_ids: HashSet<_> = book.campaigns.iter().map(|c| c.id).collect();
    let credit_ids: HashSet<_> = book.credits.iter().map(|c| c.id).collect();
    let budget_ids: HashSet<_> = book.budgets.iter().map(|b| b.id).collect();
    let mut warnings = Vec::new();

    for campaign in &book.campaigns {
        if !account_ids.contains(&campaign.account_id) {
            warnings.push(format!(
                "campaign {} references unknown account {}",
                campaign.id, campaign.account_id
            ));
        }
    }
    for budget in &book.budgets {
        if !campaign_ids.contains(&budget.campaign_id) {
            warnings.push(format!(
                "budget {} references unknown campaign {}",
                budget.id, budget.campaign_id
            ));
        }
        if !credit_ids.contains(&budget.credit_id) {
            warnings.push(format!(
                "budget {} references missing credit {}",
                budget.id, budget.credit_id
            ));
        }
        if budget.date_range().is_none() {
            warnings.push(format!(
                "budget {} ends {} before it starts {}",
                budget.id, budget.end_date, budget.start_date
            ));
        }
    }
    for statement in book.statements() {
        if !budget_ids.contains(&statement.budget_id) {
            warnings.push(format!(
                "statement on {} references unknown budget {}",
                statement.date, statement.budget_id
            ));
        }
    }
    warnings
}
