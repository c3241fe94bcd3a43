use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use isbnmeta_core::CacheConfig;
use tokio::sync::OnceCell;

use crate::aggregate::AggregatedMetadata;
use crate::error::{EnrichError, Result};

/// Bounds on the per-ISBN cache. The default keeps everything forever.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CachePolicy {
    /// Maximum number of ISBNs kept; least recently used entries go first.
    pub capacity: Option<usize>,
    pub ttl: Option<Duration>,
}

impl From<&CacheConfig> for CachePolicy {
    fn from(config: &CacheConfig) -> Self {
        Self {
            capacity: config.capacity,
            ttl: config.ttl_secs.map(Duration::from_secs),
        }
    }
}

type Loaded = (Instant, Arc<AggregatedMetadata>);

#[derive(Default)]
struct Slot {
    cell: OnceCell<Loaded>,
}

impl Slot {
    /// A caller outside the map still holds an uninitialized slot: its load
    /// is in flight.
    fn is_loading(self: &Arc<Self>) -> bool {
        !self.cell.initialized() && Arc::strong_count(self) > 1
    }

    fn is_expired(&self, ttl: Option<Duration>) -> bool {
        match (self.cell.get(), ttl) {
            (Some((loaded_at, _)), Some(ttl)) => loaded_at.elapsed() >= ttl,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Aggregated metadata keyed by ISBN, loaded at most once per ISBN.
///
/// Concurrent callers asking for the same ISBN share one in-flight load. A
/// failed load caches nothing, so the next caller retries it.
pub struct MetadataCache {
    policy: CachePolicy,
    // insertion order doubles as recency order: most recent at the back
    slots: Mutex<IndexMap<String, Arc<Slot>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MetadataCache {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            slots: Mutex::new(IndexMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    fn slot(&self, isbn: &str) -> Arc<Slot> {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);

        if slots.get(isbn).is_some_and(|slot| slot.is_expired(self.policy.ttl)) {
            tracing::debug!(isbn, "cache entry expired");
            slots.shift_remove(isbn);
        }

        let slot = match slots.get_index_of(isbn) {
            Some(idx) => {
                let last = slots.len() - 1;
                slots.move_index(idx, last);
                slots[last].clone()
            }
            None => {
                let slot = Arc::new(Slot::default());
                slots.insert(isbn.to_string(), slot.clone());
                slot
            }
        };

        if let Some(capacity) = self.policy.capacity {
            // Slots still loading stay put, so the map can run over capacity
            // until those loads settle. The most recent slot is never evicted.
            let mut idx = 0;
            while slots.len() > capacity.max(1) && idx + 1 < slots.len() {
                if slots[idx].is_loading() {
                    idx += 1;
                    continue;
                }
                if let Some((evicted, _)) = slots.shift_remove_index(idx) {
                    tracing::trace!(isbn = %evicted, "cache entry evicted");
                }
            }
        }
        slot
    }

    /// Return the cached metadata for `isbn`, running `load` if there is none.
    pub async fn get_or_load<F, Fut>(&self, isbn: &str, load: F) -> Result<Arc<AggregatedMetadata>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<AggregatedMetadata>>,
    {
        let slot = self.slot(isbn);
        if let Some((_, metadata)) = slot.cell.get() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(metadata.clone());
        }

        let mut ran = false;
        let (_, metadata) = slot
            .cell
            .get_or_try_init(|| {
                ran = true;
                async move {
                    let metadata = load().await?;
                    Ok::<_, EnrichError>((Instant::now(), Arc::new(metadata)))
                }
            })
            .await?;

        let counter = if ran { &self.misses } else { &self.hits };
        counter.fetch_add(1, Ordering::Relaxed);
        Ok(metadata.clone())
    }

    pub fn get(&self, isbn: &str) -> Option<Arc<AggregatedMetadata>> {
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = slots.get(isbn)?;
        if slot.is_expired(self.policy.ttl) {
            return None;
        }
        slot.cell.get().map(|(_, metadata)| metadata.clone())
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|slot| slot.cell.initialized())
            .count();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries,
        }
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new(CachePolicy::default())
    }
}
