use async_trait::async_trait;
use isbnmeta_core::{IsbnDbConfig, SourceId};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

use crate::error::{EnrichError, Result};
use crate::http::{HttpClient, join_segments};
use crate::sources::{MetadataProvider, ProviderResult, take_object};

/// Commercial book-database provider. Authenticates with the raw key in the
/// `Authorization` header.
pub struct IsbnDbSource {
    http: HttpClient,
    base_url: String,
    api_key: String,
}

impl IsbnDbSource {
    pub fn new(http: HttpClient, config: &IsbnDbConfig) -> Self {
        Self::with_params(http, &config.base_url, &config.api_key)
    }

    pub fn with_params(http: HttpClient, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if !self.api_key.is_empty() {
            let mut value = HeaderValue::from_str(&self.api_key).map_err(|_| {
                EnrichError::SourceUnavailable("ISBNdb API key is not a valid header value".to_string())
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl MetadataProvider for IsbnDbSource {
    fn id(&self) -> SourceId {
        SourceId::IsbnDb
    }

    async fn lookup(&self, isbn: &str) -> Result<Option<ProviderResult>> {
        let url = join_segments(&self.base_url, &["book", isbn])?;
        match self.http.get_json(url, self.headers()?).await? {
            Some(body) => take_object(body, "book", SourceId::IsbnDb),
            None => Ok(None),
        }
    }
}
