//! `pacing_cli`: reprocess a JSON book against spend aggregates, or print
//! budget projections for it.

pub mod style;
pub mod table;

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    str::FromStr,
};

use chrono::NaiveDate;
use pacing_config::{Config, ConfigManager};
use pacing_core::{
    BudgetProjections, Clock, FixedClock, ProjectionBreakdown, ProjectionRequest, ProjectionRow,
    ReprocessReport, ReprocessRequest, SystemClock,
};
use pacing_domain::Book;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::{
    cli::{
        style::UiStyle,
        table::{Table, TableColumn, TableRenderer},
    },
    engine::{load_spend, PacingEngine},
    errors::CliError,
    utils::build_info::BuildMetadata,
};

/// Overrides the directory holding `config/config.json`, books and backups.
pub const HOME_ENV: &str = "BUDGET_PACING_HOME";

const USAGE: &str = "\
Usage:
  pacing_cli reprocess --book <path> --spend <path> --from <YYYY-MM-DD>
                       [--account <uuid>] [--today <YYYY-MM-DD>] [--spend-pcts]
  pacing_cli projections --book <path> --start <YYYY-MM-DD> --end <YYYY-MM-DD>
                         [--breakdown account|campaign] [--today <YYYY-MM-DD>] [--json]
  pacing_cli version
  pacing_cli help";

/// Entry point used by the binary. `args` excludes the program name.
pub fn run_cli<I>(args: I) -> Result<(), CliError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let Some(command) = args.next() else {
        println!("{USAGE}");
        return Ok(());
    };
    let options = ParsedArgs::parse(args)?;

    match command.as_str() {
        "help" | "--help" | "-h" => {
            println!("{USAGE}");
            Ok(())
        }
        "version" | "--version" => {
            println!("{}", BuildMetadata::current().summary());
            Ok(())
        }
        "reprocess" => {
            let config = load_config()?;
            crate::init_with_filter(config.log_filter.as_deref());
            run_reprocess(config, &options)
        }
        "projections" => {
            let config = load_config()?;
            crate::init_with_filter(config.log_filter.as_deref());
            run_projections(config, &options)
        }
        other => Err(CliError::Input(format!(
            "unknown command `{other}`\n{USAGE}"
        ))),
    }
}

fn run_reprocess(config: Config, options: &ParsedArgs) -> Result<(), CliError> {
    let book_path = options.path("book")?;
    let spend_path = options.path("spend")?;
    let mut request = ReprocessRequest::from_date(options.date("from")?);
    if let Some(account) = options.optional::<Uuid>("account")? {
        request = request.for_account(account);
    }
    if options.flag("spend-pcts") {
        request = request.with_spend_pcts();
    }

    let style = UiStyle::detect(config.ui_color_enabled);
    let engine = PacingEngine::with_clock(config, clock_for(options)?)?;
    let spend = load_spend(&spend_path)?;
    let report = engine.reprocess_file(&book_path, &spend, &request)?;
    let book = engine.load_book(&book_path)?;

    println!("{}", render_reprocess(&report, &book, &style));
    if report.failures.is_empty() {
        Ok(())
    } else {
        Err(CliError::Command(format!(
            "{} campaign(s) failed to reprocess",
            report.failures.len()
        )))
    }
}

fn run_projections(config: Config, options: &ParsedArgs) -> Result<(), CliError> {
    let book_path = options.path("book")?;
    let breakdown = options
        .optional::<ProjectionBreakdown>("breakdown")?
        .unwrap_or(ProjectionBreakdown::Account);
    let request = ProjectionRequest::new(options.date("start")?, options.date("end")?, breakdown);

    let style = UiStyle::detect(config.ui_color_enabled);
    let engine = PacingEngine::with_clock(config, clock_for(options)?)?;
    let book = engine.load_book(&book_path)?;
    let projections = engine.projections(&book, &request)?;

    if options.flag("json") {
        let payload = json!({
            "breakdown": projections.breakdown().to_string(),
            "projection_date": projections.projection_date(),
            "data": projections.data(),
            "totals": projections.totals().fields(),
        });
        let text = serde_json::to_string_pretty(&payload).map_err(crate::PacingError::from)?;
        println!("{text}");
    } else {
        println!("{}", render_projections(&projections, &book, &style));
    }
    Ok(())
}

fn load_config() -> Result<Config, CliError> {
    let home = std::env::var_os(HOME_ENV).map(PathBuf::from);
    let base = home
        .clone()
        .unwrap_or_else(ConfigManager::default_base_dir);
    let manager = ConfigManager::with_base_dir(base)?;
    let mut config = manager.load()?;
    if let Some(home) = home {
        if config.default_book_root.is_none() {
            config.default_book_root = Some(home.join("books"));
        }
    }
    debug!(path = %manager.config_path().display(), "configuration loaded");
    Ok(config)
}

fn clock_for(options: &ParsedArgs) -> Result<Box<dyn Clock>, CliError> {
    Ok(match options.optional::<NaiveDate>("today")? {
        Some(today) => Box::new(FixedClock::on(today)),
        None => Box::new(SystemClock),
    })
}

pub fn render_reprocess(report: &ReprocessReport, book: &Book, style: &UiStyle) -> String {
    let mut table = Table::new(
        Some("Reprocessed campaigns"),
        vec![
            TableColumn::left("Campaign"),
            TableColumn::right("Days"),
            TableColumn::left("From"),
            TableColumn::left("To"),
        ],
    );
    for (campaign_id, dates) in &report.processed {
        let first = dates.first().map(NaiveDate::to_string).unwrap_or_default();
        let last = dates.last().map(NaiveDate::to_string).unwrap_or_default();
        table.add_row(vec![
            campaign_label(book, *campaign_id),
            dates.len().to_string(),
            first,
            last,
        ]);
    }

    let mut sections = vec![TableRenderer::render(&table, style)];
    if !report.effective_spend.is_empty() {
        let mut pcts = Table::new(
            Some("Effective spend"),
            vec![
                TableColumn::left("Date"),
                TableColumn::left("Campaign"),
                TableColumn::right("Actual %"),
                TableColumn::right("License fee %"),
                TableColumn::right("Margin %"),
            ],
        );
        for ((date, campaign_id), pct) in &report.effective_spend {
            pcts.add_row(vec![
                date.to_string(),
                campaign_label(book, *campaign_id),
                pct.pct_actual_spend.to_string(),
                pct.pct_license_fee.to_string(),
                pct.pct_margin.to_string(),
            ]);
        }
        sections.push(TableRenderer::render(&pcts, style));
    }
    for failure in &report.failures {
        sections.push(style.apply_warning_style(&format!(
            "failed: {} ({})",
            campaign_label(book, failure.campaign_id),
            failure.error
        )));
    }
    if report.overspend_errors > 0 {
        sections.push(style.apply_warning_style(&format!(
            "{} day(s) left overspend unabsorbed",
            report.overspend_errors
        )));
    }
    sections.push(format!(
        "{} campaign(s), {} day(s) reprocessed",
        report.processed.len(),
        report.dates_processed()
    ));
    sections.join("\n\n")
}

pub fn render_projections(projections: &BudgetProjections, book: &Book, style: &UiStyle) -> String {
    let window = projections.window();
    let title = format!(
        "Projections by {} {} to {} (as of {})",
        projections.breakdown(),
        window.start,
        window.end,
        projections.projection_date()
    );
    let mut table = Table::new(
        Some(title),
        vec![
            TableColumn::left("Name"),
            TableColumn::right("Allocated media"),
            TableColumn::right("Ideal media"),
            TableColumn::right("Attributed media"),
            TableColumn::right("Pacing %"),
            TableColumn::right("Media projection"),
            TableColumn::right("Fee projection"),
            TableColumn::right("Total fee projection"),
        ],
    );
    let mut rows: Vec<(String, ProjectionRow)> = projections
        .rows()
        .map(|(id, row)| (entity_label(book, projections.breakdown(), id), row))
        .collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    rows.push(("Total".to_string(), projections.totals()));

    for (name, row) in rows {
        table.add_row(vec![
            name,
            cell(row.allocated_media_budget),
            cell(row.ideal_media_spend),
            cell(row.attributed_media_spend),
            cell(row.pacing),
            cell(row.media_spend_projection),
            cell(row.license_fee_projection),
            cell(row.total_fee_projection),
        ]);
    }
    TableRenderer::render(&table, style)
}

fn cell(value: Option<Decimal>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".into())
}

fn campaign_label(book: &Book, id: Uuid) -> String {
    book.campaign(id)
        .map(|campaign| campaign.name.clone())
        .unwrap_or_else(|| id.to_string())
}

fn entity_label(book: &Book, breakdown: ProjectionBreakdown, id: Uuid) -> String {
    match breakdown {
        ProjectionBreakdown::Account => book
            .account(id)
            .map(|account| account.name.clone())
            .unwrap_or_else(|| id.to_string()),
        ProjectionBreakdown::Campaign => campaign_label(book, id),
    }
}

/// `--key value` options and bare `--flag`s.
#[derive(Debug, Default)]
struct ParsedArgs {
    values: BTreeMap<String, String>,
    flags: Vec<String>,
}

impl ParsedArgs {
    fn parse<I: Iterator<Item = String>>(args: I) -> Result<Self, CliError> {
        let mut parsed = Self::default();
        let mut args = args.peekable();
        while let Some(arg) = args.next() {
            let Some(key) = arg.strip_prefix("--") else {
                return Err(CliError::Input(format!("unexpected argument `{arg}`")));
            };
            match args.next_if(|next| !next.starts_with("--")) {
                Some(value) => {
                    parsed.values.insert(key.to_string(), value);
                }
                None => parsed.flags.push(key.to_string()),
            }
        }
        Ok(parsed)
    }

    fn flag(&self, name: &str) -> bool {
        self.flags.iter().any(|flag| flag == name)
    }

    fn required(&self, name: &str) -> Result<&str, CliError> {
        self.values
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| CliError::Input(format!("missing --{name}")))
    }

    fn path(&self, name: &str) -> Result<PathBuf, CliError> {
        let path = Path::new(self.required(name)?);
        Ok(path.to_path_buf())
    }

    fn date(&self, name: &str) -> Result<NaiveDate, CliError> {
        let raw = self.required(name)?;
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| CliError::Input(format!("--{name} expects YYYY-MM-DD, got `{raw}`")))
    }

    fn optional<T>(&self, name: &str) -> Result<Option<T>, CliError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.values
            .get(name)
            .map(|raw| {
                raw.parse::<T>()
                    .map_err(|err| CliError::Input(format!("--{name}: {err}")))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> ParsedArgs {
        ParsedArgs::parse(values.iter().map(|v| v.to_string())).unwrap()
    }

    #[test]
    fn options_and_flags_are_separated() {
        let parsed = args(&["--book", "acme.json", "--spend-pcts", "--from", "2024-01-03"]);
        assert_eq!(parsed.required("book").unwrap(), "acme.json");
        assert!(parsed.flag("spend-pcts"));
        assert_eq!(
            parsed.date("from").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
        );
    }

    #[test]
    fn bad_values_are_input_errors() {
        let parsed = args(&["--from", "03/01/2024", "--breakdown", "agency"]);
        assert!(matches!(parsed.date("from"), Err(CliError::Input(_))));
        assert!(matches!(
            parsed.optional::<ProjectionBreakdown>("breakdown"),
            Err(CliError::Input(_))
        ));
        assert!(matches!(parsed.required("book"), Err(CliError::Input(_))));
    }

    #[test]
    fn stray_positional_arguments_are_rejected() {
        let result = ParsedArgs::parse(["acme.json".to_string()].into_iter());
        assert!(matches!(result, Err(CliError::Input(_))));
    }
}
