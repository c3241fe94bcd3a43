use isbnmeta_core::{CoreError, ExitCode, SourceId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnrichError {
    #[error("invalid ISBN: {0}")]
    InvalidIsbn(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("{source_id} lookup failed: {message}")]
    Source { source_id: SourceId, message: String },

    #[error("source not configured: {0}")]
    SourceUnavailable(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("task failed: {0}")]
    Task(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl EnrichError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Http(_) => ExitCode::NetworkError,
            Self::InvalidIsbn(_) => ExitCode::InvalidArgs,
            Self::SourceUnavailable(_) => ExitCode::ConfigError,
            Self::Core(err) => err.exit_code(),
            Self::Parse(_) | Self::Source { .. } | Self::Sqlite(_) | Self::Task(_) => {
                ExitCode::GeneralError
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, EnrichError>;
