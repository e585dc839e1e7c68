#![doc(test(attr(deny(warnings))))]

//! Budget pacing engine: attributes campaign spend to budget line items
//! day by day, absorbs overspend, reprocesses history and projects pacing.
//!
//! The arithmetic lives in `pacing-domain` and the services in `pacing-core`;
//! this crate wires them to configuration, JSON books and the command line.

pub mod cli;
pub mod engine;
pub mod errors;
pub mod utils;

pub use engine::{load_spend, PacingEngine};
pub use errors::{CliError, PacingError};

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing with the default filter.
pub fn init() {
    init_with_filter(None);
}

/// Initializes global tracing; `directive` applies when `RUST_LOG` is unset.
pub fn init_with_filter(directive: Option<&str>) {
    INIT_TRACING.call_once(|| {
        utils::init_tracing(directive);
        tracing::debug!("budget pacing tracing initialized");
    });
}

#[cfg(test)]
mod tests {
    #[test]
    fn init_does_not_panic() {
        super::init();
        super::init_with_filter(Some("budget_pacing=debug"));
    }
}
