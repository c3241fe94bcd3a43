use std::sync::Arc;

use futures::{StreamExt, TryStreamExt, stream};
use indexmap::IndexMap;
use isbnmeta_core::{SourceErrorPolicy, SourceId};

use crate::cache::{CachePolicy, MetadataCache};
use crate::error::Result;
use crate::sources::{MetadataProvider, ProviderResult};

/// Every configured provider's result for one ISBN, in configuration order.
/// `None` marks a provider that had nothing.
pub type AggregatedMetadata = IndexMap<SourceId, Option<ProviderResult>>;

/// Fans one ISBN out to all providers and caches the combined result.
pub struct Aggregator {
    providers: Vec<Arc<dyn MetadataProvider>>,
    concurrency: usize,
    on_error: SourceErrorPolicy,
    cache: MetadataCache,
}

impl Aggregator {
    pub fn new(providers: Vec<Arc<dyn MetadataProvider>>) -> Self {
        let concurrency = providers.len().max(1);
        Self {
            providers,
            concurrency,
            on_error: SourceErrorPolicy::default(),
            cache: MetadataCache::default(),
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_error_policy(mut self, on_error: SourceErrorPolicy) -> Self {
        self.on_error = on_error;
        self
    }

    pub fn with_cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache = MetadataCache::new(policy);
        self
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    /// Aggregated metadata for `isbn`, from the cache when already fetched.
    pub async fn metadata(&self, isbn: &str) -> Result<Arc<AggregatedMetadata>> {
        self.cache.get_or_load(isbn, || self.fetch(isbn)).await
    }

    /// Query every provider for `isbn`, bypassing the cache.
    ///
    /// Under [`SourceErrorPolicy::Abort`] the first provider error fails the
    /// whole fetch and cancels the lookups still running.
    pub async fn fetch(&self, isbn: &str) -> Result<AggregatedMetadata> {
        let on_error = self.on_error;
        tracing::debug!(isbn, sources = self.providers.len(), "fetching metadata");

        let results = stream::iter(self.providers.iter().cloned())
            .map(|provider| async move {
                let id = provider.id();
                match provider.lookup(isbn).await {
                    Ok(result) => {
                        tracing::trace!(isbn, source = %id, found = result.is_some(), "lookup done");
                        Ok((id, result))
                    }
                    Err(err) if on_error == SourceErrorPolicy::Skip => {
                        tracing::warn!(isbn, source = %id, error = %err, "source failed, skipping");
                        Ok((id, None))
                    }
                    Err(err) => Err(err),
                }
            })
            .buffer_unordered(self.concurrency)
            .try_collect::<Vec<_>>()
            .await?;

        let mut aggregated = self
            .providers
            .iter()
            .map(|p| (p.id(), None))
            .collect::<AggregatedMetadata>();
        for (id, result) in results {
            aggregated.insert(id, result);
        }
        Ok(aggregated)
    }
}
