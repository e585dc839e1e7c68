//! Facade tying configuration, JSON books and the pacing services together.

use std::{fs, path::Path};

use chrono::{Duration, NaiveDate};
use pacing_config::Config;
use pacing_core::{
    book_warnings, BookStorage, BudgetProjections, CampaignSpend, Clock, CoreError,
    EngineSettings, GenerationOutcome, ProjectionRequest, ReprocessReport, ReprocessRequest,
    ReprocessingDriver, SpendSource, StatementGenerator, StaticSpend, SystemClock,
};
use pacing_domain::{Book, CurrencyCode, FxTable, FxTolerance};
use pacing_storage_json::{load_book_from_path, save_book_to_path, JsonBookStorage};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::PacingError;

const REPROCESS_BACKUP_NOTE: &str = "before reprocess";
const MAX_CACHE_TTL_SECS: i64 = 366 * 24 * 3600;

/// Runs the pacing services against books on disk using one [`Config`].
pub struct PacingEngine {
    config: Config,
    settings: EngineSettings,
    storage: JsonBookStorage,
    clock: Box<dyn Clock>,
}

impl PacingEngine {
    pub fn new(config: Config) -> Result<Self, PacingError> {
        Self::with_clock(config, Box::new(SystemClock))
    }

    pub fn with_clock(config: Config, clock: Box<dyn Clock>) -> Result<Self, PacingError> {
        config.validate()?;
        let settings = settings_from_config(&config);
        let storage = JsonBookStorage::with_retention(
            config.resolve_default_book_root(),
            config.resolve_default_backup_root(),
            config.backup_retention,
        )?;
        Ok(Self {
            config,
            settings,
            storage,
            clock,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn storage(&self) -> &JsonBookStorage {
        &self.storage
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Loads a book and logs every integrity warning found in it.
    pub fn load_book(&self, path: &Path) -> Result<Book, PacingError> {
        let book = load_book_from_path(path)?;
        for warning in book_warnings(&book) {
            warn!(book = %book.name, "{warning}");
        }
        Ok(book)
    }

    pub fn save_book(&self, book: &Book, path: &Path) -> Result<(), PacingError> {
        save_book_to_path(book, path)?;
        Ok(())
    }

    /// Attributes one campaign-day of spend.
    pub fn generate(
        &self,
        book: &mut Book,
        campaign_id: Uuid,
        date: NaiveDate,
        spend: CampaignSpend,
    ) -> Result<GenerationOutcome, PacingError> {
        let rates = self.rates_for(book)?;
        let generator = StatementGenerator::new(&rates, self.clock.as_ref(), &self.settings);
        let outcome = generator.generate(book, campaign_id, date, spend)?;
        book.touch();
        Ok(outcome)
    }

    pub fn reprocess(
        &self,
        book: &mut Book,
        spend: &dyn SpendSource,
        request: &ReprocessRequest,
    ) -> Result<ReprocessReport, PacingError> {
        let rates = self.rates_for(book)?;
        let driver = ReprocessingDriver::new(spend, &rates, self.clock.as_ref(), &self.settings);
        Ok(driver.run(book, request)?)
    }

    /// Backs the book up, reprocesses it and writes the result back to `book_path`.
    pub fn reprocess_file(
        &self,
        book_path: &Path,
        spend: &dyn SpendSource,
        request: &ReprocessRequest,
    ) -> Result<ReprocessReport, PacingError> {
        let mut book = self.load_book(book_path)?;
        let backup =
            self.storage
                .backup_book(&book_slug(book_path, &book), &book, Some(REPROCESS_BACKUP_NOTE))?;
        info!(backup = %backup.id, path = %backup.path.display(), "book backed up");

        let report = self.reprocess(&mut book, spend, request)?;
        self.save_book(&book, book_path)?;
        info!(
            campaigns = report.processed.len(),
            dates = report.dates_processed(),
            failures = report.failures.len(),
            "reprocessed book saved"
        );
        Ok(report)
    }

    pub fn projections(
        &self,
        book: &Book,
        request: &ProjectionRequest,
    ) -> Result<BudgetProjections, PacingError> {
        Ok(BudgetProjections::compute(
            book,
            request,
            self.clock.as_ref(),
            &self.settings,
        )?)
    }

    /// Book rates with the configured look-back tolerance.
    fn rates_for(&self, book: &Book) -> Result<FxTable, PacingError> {
        if book.fx.base != self.settings.reporting_currency {
            return Err(CoreError::Validation(format!(
                "book `{}` quotes rates against {} but the engine reports in {}",
                book.name, book.fx.base, self.settings.reporting_currency
            ))
            .into());
        }
        let mut rates = book.fx.clone();
        rates.tolerance = FxTolerance {
            days: self.config.fx_tolerance_days,
        };
        Ok(rates)
    }
}

pub fn settings_from_config(config: &Config) -> EngineSettings {
    EngineSettings {
        reporting_currency: CurrencyCode::new(config.reporting_currency.trim()),
        confidence_offset_days: config.confidence_offset_days,
        margin_cutover_date: config.margin_cutover_date,
        spend_cache_ttl: Duration::seconds(
            i64::try_from(config.spend_cache_ttl_secs)
                .unwrap_or(MAX_CACHE_TTL_SECS)
                .min(MAX_CACHE_TTL_SECS),
        ),
    }
}

/// Reads spend aggregates keyed by date then campaign id.
pub fn load_spend(path: &Path) -> Result<StaticSpend, PacingError> {
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

fn book_slug(path: &Path, book: &Book) -> String {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| book.name.clone())
}
