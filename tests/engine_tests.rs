mod common;

use budget_pacing::{PacingEngine, PacingError};
use common::{
    book_file, first_fortnight_spend, november, november_book, sandboxed_config, write_json, UNIT,
};
use pacing_core::{
    BookStorage, CampaignSpend, CoreError, FixedClock, ProjectionBreakdown, ProjectionRequest,
    ReprocessRequest,
};
use pacing_domain::{CurrencyCode, FxTable};
use rust_decimal_macros::dec;
use tempfile::tempdir;

fn engine_on(root: &std::path::Path, day: u32) -> PacingEngine {
    PacingEngine::with_clock(sandboxed_config(root), Box::new(FixedClock::on(november(day))))
        .expect("engine")
}

#[test]
fn reprocessed_book_feeds_projections() {
    budget_pacing::init();
    let dir = tempdir().expect("tempdir");
    let fixture = november_book();
    let path = book_file(dir.path());
    write_json(&path, &fixture.book);

    let engine = engine_on(dir.path(), 16);
    let spend = first_fortnight_spend(fixture.campaign);
    let report = engine
        .reprocess_file(&path, &spend, &ReprocessRequest::from_date(november(1)))
        .expect("reprocess");

    assert!(report.failures.is_empty());
    assert_eq!(report.processed[&fixture.campaign].len(), 16);
    assert_eq!(report.processed[&fixture.campaign][0], november(1));

    let book = engine.load_book(&path).expect("reload");
    let first_day = book.statement(fixture.budget, november(1)).expect("statement");
    assert_eq!(first_day.media_spend_nano, 50 * UNIT);
    assert_eq!(first_day.data_spend_nano, 30 * UNIT);
    assert_eq!(first_day.license_fee_nano, 16 * UNIT);

    let projections = engine
        .projections(
            &book,
            &ProjectionRequest::new(november(1), november(30), ProjectionBreakdown::Account),
        )
        .expect("projections");
    let row = projections.row(fixture.account).expect("account row");
    assert_eq!(row.attributed_media_spend, Some(dec!(1200)));
    assert_eq!(row.pacing, Some(dec!(100)));
    assert_eq!(row.media_spend_projection, Some(dec!(2400)));
    assert_eq!(row.total_fee_projection, Some(dec!(480)));
}

#[test]
fn reprocessing_a_file_keeps_a_backup_of_the_previous_state() {
    let dir = tempdir().expect("tempdir");
    let fixture = november_book();
    let path = book_file(dir.path());
    write_json(&path, &fixture.book);

    let engine = engine_on(dir.path(), 3);
    engine
        .reprocess_file(
            &path,
            &first_fortnight_spend(fixture.campaign),
            &ReprocessRequest::from_date(november(1)),
        )
        .expect("reprocess");

    let backups = engine.storage().list_backups("november").expect("backups");
    assert_eq!(backups.len(), 1);
    assert!(backups[0].id.ends_with("_before-reprocess.json"));
    let previous = engine.storage().restore_backup(&backups[0]).expect("restore");
    assert_eq!(previous.statements().count(), 0);
    assert_eq!(engine.load_book(&path).unwrap().statements().count(), 3);
}

#[test]
fn single_day_generation_updates_the_book() {
    let dir = tempdir().expect("tempdir");
    let mut fixture = november_book();
    let engine = engine_on(dir.path(), 20);

    let outcome = engine
        .generate(
            &mut fixture.book,
            fixture.campaign,
            november(10),
            CampaignSpend::new(100 * UNIT, 0),
        )
        .expect("generate");

    assert_eq!(outcome.statements_written, 1);
    assert!(outcome.unattributed.is_zero());
    let statement = fixture
        .book
        .statement(fixture.budget, november(10))
        .expect("statement");
    assert_eq!(statement.media_spend_nano, 100 * UNIT);
}

#[test]
fn books_quoted_in_another_currency_are_rejected() {
    let dir = tempdir().expect("tempdir");
    let mut fixture = november_book();
    fixture.book.fx = FxTable::new(CurrencyCode::new("EUR"));
    let engine = engine_on(dir.path(), 20);

    let result = engine.generate(
        &mut fixture.book,
        fixture.campaign,
        november(10),
        CampaignSpend::new(UNIT, 0),
    );

    assert!(matches!(
        result,
        Err(PacingError::Core(CoreError::Validation(_)))
    ));
    assert_eq!(fixture.book.statements().count(), 0);
}

#[test]
fn invalid_config_is_refused() {
    let dir = tempdir().expect("tempdir");
    let mut config = sandboxed_config(dir.path());
    config.fx_tolerance_days = -2;

    assert!(matches!(
        PacingEngine::new(config),
        Err(PacingError::Config(_))
    ));
}

#[test]
fn spend_files_load_by_date_and_campaign() {
    let dir = tempdir().expect("tempdir");
    let fixture = november_book();
    let path = dir.path().join("spend.json");
    write_json(&path, &first_fortnight_spend(fixture.campaign));

    let spend = budget_pacing::load_spend(&path).expect("spend");
    assert_eq!(spend.dates().count(), 15);

    let engine = engine_on(dir.path(), 2);
    let mut book = fixture.book;
    let report = engine
        .reprocess(&mut book, &spend, &ReprocessRequest::from_date(november(1)))
        .expect("reprocess");
    assert_eq!(report.dates_processed(), 2);
    assert_eq!(
        book.statement(fixture.budget, november(2))
            .map(|s| s.margin_nano),
        Some(0)
    );
    assert_eq!(report.overspend_errors, 0);
}
