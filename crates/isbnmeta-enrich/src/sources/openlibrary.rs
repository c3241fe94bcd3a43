use async_trait::async_trait;
use isbnmeta_core::{OpenLibraryConfig, SourceId};
use reqwest::header::HeaderMap;

use crate::error::Result;
use crate::http::{HttpClient, join_segments};
use crate::sources::{MetadataProvider, ProviderResult, take_object};

/// Library-catalog provider: the Books API in `jscmd=data` mode.
pub struct OpenLibrarySource {
    http: HttpClient,
    base_url: String,
}

impl OpenLibrarySource {
    pub fn new(http: HttpClient, config: &OpenLibraryConfig) -> Self {
        Self::with_base_url(http, &config.base_url)
    }

    pub fn with_base_url(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
        }
    }
}

/// Cover image URL for an ISBN. Built from the ISBN alone, no request made.
pub fn cover_url(config: &OpenLibraryConfig, isbn: &str) -> String {
    format!(
        "{}{}{}",
        config.covers_url,
        urlencoding::encode(isbn),
        config.covers_suffix
    )
}

#[async_trait]
impl MetadataProvider for OpenLibrarySource {
    fn id(&self) -> SourceId {
        SourceId::OpenLibrary
    }

    async fn lookup(&self, isbn: &str) -> Result<Option<ProviderResult>> {
        let bibkey = format!("ISBN:{isbn}");
        let mut url = join_segments(&self.base_url, &["api", "books"])?;
        url.query_pairs_mut()
            .append_pair("bibkeys", &bibkey)
            .append_pair("format", "json")
            .append_pair("jscmd", "data");

        match self.http.get_json(url, HeaderMap::new()).await? {
            // unknown ISBNs come back as `{}`
            Some(body) => take_object(body, &bibkey, SourceId::OpenLibrary),
            None => Ok(None),
        }
    }
}
