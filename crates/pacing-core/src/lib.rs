//! pacing-core
//!
//! Budget pacing services: daily statement attribution, overspend handling,
//! reprocessing and projections.
//! Depends on pacing-domain. No CLI, no terminal I/O, no direct file access.

pub mod error;
pub mod fee_policy;
pub mod overspend_service;
pub mod projection_service;
pub mod reprocess_service;
pub mod settings;
pub mod sources;
pub mod spend_cache;
pub mod statement_service;
pub mod storage;
pub mod time;

pub use error::CoreError;
pub use fee_policy::{FeePolicy, FeeSchedule};
pub use overspend_service::{OverspendHandler, OverspendOutcome};
pub use projection_service::{
    BudgetProjections, ProjectionBreakdown, ProjectionRequest, ProjectionRow,
};
pub use reprocess_service::{
    CampaignFailure, EffectiveSpend, ReprocessReport, ReprocessRequest, ReprocessingDriver,
};
pub use settings::EngineSettings;
pub use sources::{CampaignSpend, RateLookup, SpendSource, StaticSpend};
pub use spend_cache::SpendCache;
pub use statement_service::{GenerationOutcome, StatementGenerator};
pub use storage::{book_warnings, BookBackupInfo, BookStorage};
pub use time::{Clock, FixedClock, SystemClock};
