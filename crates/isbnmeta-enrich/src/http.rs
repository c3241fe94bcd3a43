use std::time::Duration;

use isbnmeta_core::EnrichmentConfig;
use reqwest::header::HeaderMap;
use reqwest::Url;
use serde_json::Value;

use crate::error::{EnrichError, Result};

// ─── HttpClient ───────────────────────────────────────────────────────────────

/// Shared HTTP session for every provider in a run.
///
/// Cloning is cheap and shares the underlying connection pool. There is no
/// retry or rate limiting: one call, one request.
#[derive(Clone, Debug)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    pub fn new(
        user_agent: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client })
    }

    pub fn from_config(config: &EnrichmentConfig) -> Result<Self> {
        Self::new(
            &config.user_agent,
            Duration::from_secs(config.connect_timeout_secs),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// GET a JSON document.
    ///
    /// A non-success status is `Ok(None)`. Transport failures and bodies that
    /// are not JSON are errors.
    pub async fn get_json(&self, url: Url, headers: HeaderMap) -> Result<Option<Value>> {
        let resp = self.client.get(url.clone()).headers(headers).send().await?;
        let status = resp.status();
        if !status.is_success() {
            tracing::debug!(url = %redact(&url), status = status.as_u16(), "no data");
            return Ok(None);
        }

        let text = resp.text().await?;
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| EnrichError::Parse(format!("{}: {e}", redact(&url))))
    }
}

/// Strip query parameters so API keys never reach the logs.
fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    shown.set_query(None);
    shown.to_string()
}

pub(crate) fn parse_base_url(base_url: &str) -> Result<Url> {
    Url::parse(base_url).map_err(|e| EnrichError::Parse(format!("invalid URL {base_url}: {e}")))
}

/// `base` with `segments` appended as path segments (each percent-encoded).
pub(crate) fn join_segments(base_url: &str, segments: &[&str]) -> Result<Url> {
    let mut url = parse_base_url(base_url)?;
    {
        let mut segs = url
            .path_segments_mut()
            .map_err(|_| EnrichError::Parse(format!("cannot-be-a-base URL {base_url}")))?;
        segs.pop_if_empty();
        for segment in segments {
            segs.push(segment);
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn client() -> HttpClient {
        HttpClient::new("isbnmeta-test", Duration::from_secs(2), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn success_returns_json() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/book/9780306406157")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"book": {"title": "Example"}}"#)
            .create_async()
            .await;

        let url = join_segments(&server.url(), &["book", "9780306406157"]).unwrap();
        let body = client().get_json(url, HeaderMap::new()).await.unwrap().unwrap();
        assert_eq!(body["book"]["title"], "Example");
    }

    #[tokio::test]
    async fn non_success_status_is_no_data() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/book/9790000000000")
            .with_status(404)
            .with_body("Not Found")
            .create_async()
            .await;

        let url = join_segments(&server.url(), &["book", "9790000000000"]).unwrap();
        assert!(client().get_json(url, HeaderMap::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_body_is_an_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/book/1")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create_async()
            .await;

        let url = join_segments(&server.url(), &["book", "1"]).unwrap();
        let err = client().get_json(url, HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, EnrichError::Parse(_)));
    }

    #[tokio::test]
    async fn connection_failure_propagates() {
        let url = parse_base_url("http://127.0.0.1:9/unreachable").unwrap();
        let err = client().get_json(url, HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, EnrichError::Http(_)));
    }

    #[test]
    fn join_segments_encodes_and_appends() {
        let url = join_segments("https://example.org/books/v1/", &["volumes", "a b"]).unwrap();
        assert_eq!(url.as_str(), "https://example.org/books/v1/volumes/a%20b");
    }

    #[test]
    fn redact_drops_query() {
        let url = parse_base_url("https://example.org/volumes?q=isbn:1&key=secret").unwrap();
        assert_eq!(redact(&url), "https://example.org/volumes");
    }
}
