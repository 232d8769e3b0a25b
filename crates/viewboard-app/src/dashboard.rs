use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use viewboard_core::config::Config;
use viewboard_core::filter::QueryKey;
use viewboard_core::store::FilterStore;
use viewboard_query::cache::FetchResult;
use viewboard_query::{
    AnalyticsFetcher, FetchError, HttpAnalyticsFetcher, QueryCache, QueryOptions, QuerySnapshot,
    QuerySubscription,
};

/// Composition root for one dashboard view.
///
/// Owns the filter store and the query cache. The cache only ever sees the
/// key of the applied filters, never the pending selection.
pub struct Dashboard {
    store: FilterStore,
    cache: QueryCache,
}

impl Dashboard {
    pub fn new(store: FilterStore, cache: QueryCache) -> Self {
        Self { store, cache }
    }

    /// Wire the HTTP fetcher, cache options and filter defaults from `cfg`.
    pub fn from_config(cfg: &Config) -> Result<Self, FetchError> {
        let fetcher = HttpAnalyticsFetcher::new(&cfg.analytics_url, cfg.request_timeout())?;
        Ok(Self::with_fetcher(cfg, Arc::new(fetcher)))
    }

    pub fn with_fetcher(cfg: &Config, fetcher: Arc<dyn AnalyticsFetcher>) -> Self {
        let cache = QueryCache::new(fetcher, QueryOptions::from(cfg));
        Self::new(FilterStore::new(cfg.defaults.clone()), cache)
    }

    pub fn store(&self) -> &FilterStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut FilterStore {
        &mut self.store
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn query_key(&self) -> QueryKey {
        self.store.applied().query_key()
    }

    /// Commit the pending selection and read the new key from the cache.
    ///
    /// Applying a key whose last fetch failed retries it immediately.
    pub fn apply(&mut self) -> QuerySnapshot {
        let key = self.store.apply().query_key();
        info!(key = %key, "filters applied");
        if self.cache.retry_failed(&key) {
            debug!(key = %key, "retrying failed analytics query");
        }
        self.cache.get(&key)
    }

    /// Snapshot for the applied filters.
    pub fn analytics(&self) -> QuerySnapshot {
        self.cache.get(&self.query_key())
    }

    /// Wait for data for the applied filters.
    pub async fn refresh(&self) -> FetchResult {
        self.cache.fetch(&self.query_key()).await
    }

    pub fn subscribe(&self) -> QuerySubscription {
        self.cache.subscribe(&self.query_key())
    }

    pub fn invalidate(&self) -> bool {
        self.cache.invalidate(&self.query_key())
    }

    /// Spawn the cache's garbage-collection loop on the current runtime.
    pub fn spawn_gc(&self, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(self.cache.clone().run_gc_loop(interval))
    }
}
