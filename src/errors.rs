use pacing_config::ConfigError;
use pacing_core::CoreError;
use thiserror::Error;

/// Failures surfaced by [`crate::engine::PacingEngine`].
#[derive(Debug, Error)]
pub enum PacingError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Pacing(#[from] PacingError),
    #[error("Invalid input: {0}")]
    Input(String),
    #[error("Command failed: {0}")]
    Command(String),
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        CliError::Pacing(PacingError::Core(err))
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::Pacing(PacingError::Config(err))
    }
}
