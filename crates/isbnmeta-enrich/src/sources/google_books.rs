use async_trait::async_trait;
use isbnmeta_core::{GoogleBooksConfig, SourceId};
use reqwest::header::HeaderMap;
use reqwest::Url;
use serde_json::Value;

use crate::error::{EnrichError, Result};
use crate::http::{HttpClient, join_segments};
use crate::sources::{MetadataProvider, ProviderResult, take_object};

/// Volume-search provider. Needs two calls per ISBN: search for the volume id,
/// then fetch the volume and keep its `volumeInfo`.
pub struct GoogleBooksSource {
    http: HttpClient,
    base_url: String,
    api_key: String,
}

impl GoogleBooksSource {
    pub fn new(http: HttpClient, config: &GoogleBooksConfig) -> Self {
        Self::with_params(http, &config.base_url, &config.api_key)
    }

    pub fn with_params(http: HttpClient, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn with_key(&self, mut url: Url) -> Url {
        if !self.api_key.is_empty() {
            url.query_pairs_mut().append_pair("key", &self.api_key);
        }
        url
    }

    /// Resolve the provider's internal volume id for an ISBN.
    pub async fn volume_id(&self, isbn: &str) -> Result<Option<String>> {
        let mut url = join_segments(&self.base_url, &["volumes"])?;
        url.query_pairs_mut().append_pair("q", &format!("isbn:{isbn}"));
        let url = self.with_key(url);

        let Some(body) = self.http.get_json(url, HeaderMap::new()).await? else {
            return Ok(None);
        };

        // zero hits come back as `totalItems: 0` with no `items` key
        let Some(first) = body.get("items").and_then(Value::as_array).and_then(|items| items.first())
        else {
            return Ok(None);
        };

        match first.get("id") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(id)) => Ok(Some(id.clone())),
            Some(other) => Err(EnrichError::Source {
                source_id: SourceId::GoogleBooks,
                message: format!("volume id is not a string: {other}"),
            }),
        }
    }

    pub async fn volume_info(&self, volume_id: &str) -> Result<Option<ProviderResult>> {
        let url = self.with_key(join_segments(&self.base_url, &["volumes", volume_id])?);
        match self.http.get_json(url, HeaderMap::new()).await? {
            Some(body) => take_object(body, "volumeInfo", SourceId::GoogleBooks),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl MetadataProvider for GoogleBooksSource {
    fn id(&self) -> SourceId {
        SourceId::GoogleBooks
    }

    async fn lookup(&self, isbn: &str) -> Result<Option<ProviderResult>> {
        let Some(volume_id) = self.volume_id(isbn).await? else {
            tracing::debug!(isbn, "no Google Books volume");
            return Ok(None);
        };
        self.volume_info(&volume_id).await
    }
}
