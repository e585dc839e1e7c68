pub mod build_info;

use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

static TRACING_INIT: Once = Once::new();

pub const DEFAULT_LOG_DIRECTIVE: &str = "budget_pacing=info";

/// Installs the global subscriber. `RUST_LOG` wins over `directive`.
pub fn init_tracing(directive: Option<&str>) {
    TRACING_INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::try_new(directive.unwrap_or(DEFAULT_LOG_DIRECTIVE))
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_DIRECTIVE))
        });

        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init();
    });
}
