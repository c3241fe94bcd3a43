use std::sync::Arc;

use async_trait::async_trait;
use isbnmeta_core::{AppConfig, SourceId};
use serde_json::{Map, Value};

use crate::error::{EnrichError, Result};
use crate::http::HttpClient;

pub mod google_books;
pub mod isbndb;
pub mod local_csv;
pub mod openlibrary;
pub mod sqlite;

pub use google_books::GoogleBooksSource;
pub use isbndb::IsbnDbSource;
pub use local_csv::LocalCsvSource;
pub use openlibrary::OpenLibrarySource;
pub use sqlite::SqliteSource;

/// One provider's record for an ISBN, in that provider's own keys and shapes.
pub type ProviderResult = Map<String, Value>;

/// A single metadata provider.
///
/// `Ok(None)` means the provider has nothing for this ISBN (unknown ISBN,
/// non-success status, expected key missing). Every other failure is an `Err`
/// and is never turned into "no data" here.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    fn id(&self) -> SourceId;

    async fn lookup(&self, isbn: &str) -> Result<Option<ProviderResult>>;
}

/// Build the configured providers in configuration order, sharing one HTTP session.
pub fn build_providers(
    config: &AppConfig,
    http: &HttpClient,
) -> Result<Vec<Arc<dyn MetadataProvider>>> {
    config
        .enrichment
        .sources
        .iter()
        .map(|id| -> Result<Arc<dyn MetadataProvider>> {
            Ok(match id {
                SourceId::GoogleBooks => {
                    Arc::new(GoogleBooksSource::new(http.clone(), &config.google_books))
                }
                SourceId::OpenLibrary => {
                    Arc::new(OpenLibrarySource::new(http.clone(), &config.open_library))
                }
                SourceId::IsbnDb => Arc::new(IsbnDbSource::new(http.clone(), &config.isbndb)),
                SourceId::LocalCsv => {
                    let path = config.local.csv_path.as_deref().ok_or_else(|| {
                        EnrichError::SourceUnavailable("local.csv_path is not set".to_string())
                    })?;
                    Arc::new(LocalCsvSource::open(path)?)
                }
                SourceId::Sqlite => {
                    let path = config.local.sqlite_path.clone().ok_or_else(|| {
                        EnrichError::SourceUnavailable("local.sqlite_path is not set".to_string())
                    })?;
                    Arc::new(SqliteSource::new(path))
                }
            })
        })
        .collect()
}

/// Take `key` out of a response body as an object.
///
/// A missing key is "no data"; a key holding something other than an object
/// means the response is not shaped the way the provider documents it.
pub(crate) fn take_object(body: Value, key: &str, source: SourceId) -> Result<Option<ProviderResult>> {
    let Value::Object(mut map) = body else {
        return Err(EnrichError::Source {
            source_id: source,
            message: "response body is not a JSON object".to_string(),
        });
    };
    match map.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(inner)) => Ok(Some(inner)),
        Some(other) => Err(EnrichError::Source {
            source_id: source,
            message: format!("expected object at `{key}`, found {}", json_kind(&other)),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn take_object_distinguishes_missing_from_malformed() {
        let found = take_object(json!({"book": {"title": "T"}}), "book", SourceId::IsbnDb).unwrap();
        assert_eq!(found.unwrap()["title"], "T");

        assert!(take_object(json!({"errorMessage": "Not Found"}), "book", SourceId::IsbnDb)
            .unwrap()
            .is_none());

        let err = take_object(json!({"book": ["T"]}), "book", SourceId::IsbnDb).unwrap_err();
        assert!(matches!(err, EnrichError::Source { source_id: SourceId::IsbnDb, .. }));
    }

    #[test]
    fn build_providers_follows_config_order() {
        let mut config = AppConfig::default();
        config.enrichment.sources = vec![SourceId::IsbnDb, SourceId::OpenLibrary];
        let http = HttpClient::from_config(&config.enrichment).unwrap();

        let providers = build_providers(&config, &http).unwrap();
        let ids = providers.iter().map(|p| p.id()).collect::<Vec<_>>();
        assert_eq!(ids, vec![SourceId::IsbnDb, SourceId::OpenLibrary]);
    }

    #[test]
    fn build_providers_requires_local_paths() {
        let mut config = AppConfig::default();
        config.enrichment.sources = vec![SourceId::LocalCsv];
        let http = HttpClient::from_config(&config.enrichment).unwrap();
        assert!(matches!(
            build_providers(&config, &http),
            Err(EnrichError::SourceUnavailable(_))
        ));
    }
}
