pub mod config;
pub mod error;
pub mod models;
pub mod storage;

pub use config::{
    AppConfig, CacheConfig, EnrichmentConfig, GoogleBooksConfig, IsbnDbConfig, LocalConfig,
    OpenLibraryConfig, Secrets, SourceErrorPolicy,
};
pub use error::{CoreError, ExitCode, Result};
pub use models::*;
pub use storage::{Record, Table};
