//! Analytics query cache.
//!
//! Maps a [`QueryKey`] to fetched analytics with stale-while-revalidate
//! reads, one in-flight fetch per key, retry with exponential backoff and
//! eviction of unobserved entries.
//!
//! The entry map sits behind a `parking_lot::Mutex` that is only held for
//! bookkeeping and never across an `.await`. An entry changes in two places:
//! when a fetch starts and when that fetch resolves.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

use viewboard_core::analytics::AnalyticsData;
use viewboard_core::filter::QueryKey;

use crate::error::FetchError;
use crate::fetcher::{AnalyticsFetcher, FetchedAnalytics};
use crate::options::QueryOptions;

/// Outcome shared by every waiter of one fetch.
pub type FetchResult = Result<Arc<AnalyticsData>, FetchError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryStatus {
    /// No result yet.
    Pending,
    Success,
    /// The last fetch failed. Earlier data, if any, is still served.
    Error,
}

#[derive(Debug, Clone)]
pub struct QueryCacheEntry {
    pub key: QueryKey,
    pub status: QueryStatus,
    pub data: Option<Arc<AnalyticsData>>,
    pub error: Option<FetchError>,
    /// When the current data was received (entry creation until then).
    pub created_at: Instant,
    pub expires_at: Instant,
}

/// What a view renders for one key.
#[derive(Debug, Clone)]
pub struct QuerySnapshot {
    pub status: QueryStatus,
    pub data: Option<Arc<AnalyticsData>>,
    pub error: Option<FetchError>,
    pub is_fetching: bool,
    pub is_stale: bool,
}

impl QuerySnapshot {
    /// Nothing to show yet and a fetch is running.
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && self.is_fetching
    }

    /// Previous data is shown while a newer fetch runs.
    pub fn is_refreshing(&self) -> bool {
        self.data.is_some() && self.is_fetching
    }

    /// No fetch is running for this key.
    pub fn is_settled(&self) -> bool {
        !self.is_fetching && self.status != QueryStatus::Pending
    }
}

struct Slot {
    entry: QueryCacheEntry,
    in_flight: Option<watch::Receiver<Option<FetchResult>>>,
    /// Bumped by `invalidate` so a fetch that started earlier lands stale.
    generation: u64,
    observers: usize,
    last_used: Instant,
    updates: watch::Sender<QuerySnapshot>,
}

impl Slot {
    fn new(key: QueryKey, now: Instant) -> Self {
        let entry = QueryCacheEntry {
            key,
            status: QueryStatus::Pending,
            data: None,
            error: None,
            created_at: now,
            expires_at: now,
        };
        let mut slot = Self {
            entry,
            in_flight: None,
            generation: 0,
            observers: 0,
            last_used: now,
            updates: watch::channel(empty_snapshot()).0,
        };
        slot.publish(now);
        slot
    }

    fn snapshot(&self, now: Instant) -> QuerySnapshot {
        QuerySnapshot {
            status: self.entry.status,
            data: self.entry.data.clone(),
            error: self.entry.error.clone(),
            is_fetching: self.in_flight.is_some(),
            is_stale: now >= self.entry.expires_at,
        }
    }

    fn publish(&mut self, now: Instant) {
        let snapshot = self.snapshot(now);
        self.updates.send_replace(snapshot);
    }

    /// Success within `stale_time`, or an error still cooling down.
    fn is_fresh(&self, now: Instant) -> bool {
        self.entry.status != QueryStatus::Pending && now < self.entry.expires_at
    }

    /// The stored outcome, if it may be served without fetching.
    fn cached_result(&self, now: Instant) -> Option<FetchResult> {
        if !self.is_fresh(now) {
            return None;
        }
        match self.entry.status {
            QueryStatus::Success => self.entry.data.clone().map(Ok),
            QueryStatus::Error => Some(Err(self
                .entry
                .error
                .clone()
                .unwrap_or(FetchError::Aborted))),
            QueryStatus::Pending => None,
        }
    }

    fn needs_fetch(&self, now: Instant) -> bool {
        self.in_flight.is_none() && !self.is_fresh(now)
    }
}

fn empty_snapshot() -> QuerySnapshot {
    QuerySnapshot {
        status: QueryStatus::Pending,
        data: None,
        error: None,
        is_fetching: false,
        is_stale: true,
    }
}

struct Inner {
    fetcher: Arc<dyn AnalyticsFetcher>,
    options: QueryOptions,
    slots: Mutex<HashMap<QueryKey, Slot>>,
}

/// Cheap to clone; clones share one cache.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Inner>,
}

impl QueryCache {
    pub fn new(fetcher: Arc<dyn AnalyticsFetcher>, options: QueryOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                fetcher,
                options,
                slots: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn options(&self) -> &QueryOptions {
        &self.inner.options
    }

    /// Current snapshot for `key`, scheduling a background fetch when the
    /// entry is missing, stale, or failed and past its error cooldown.
    ///
    /// Never waits for the network. Must be called within a Tokio runtime.
    pub fn get(&self, key: &QueryKey) -> QuerySnapshot {
        let now = Instant::now();
        let mut slots = self.inner.slots.lock();
        let slot = slots
            .entry(key.clone())
            .or_insert_with(|| Slot::new(key.clone(), now));
        slot.last_used = now;

        let scheduled = if slot.needs_fetch(now) {
            Some(start_fetch(&self.inner, key, slot))
        } else {
            if slot.in_flight.is_some() {
                debug!(key = %key, "attached to in-flight analytics fetch");
            } else {
                debug!(key = %key, "analytics cache hit");
            }
            None
        };
        let snapshot = slot.snapshot(now);
        drop(slots);

        if let Some(scheduled) = scheduled {
            scheduled.spawn();
        }
        snapshot
    }

    /// Resolve `key` to data, waiting for a fetch if the cached value is not
    /// fresh. Concurrent callers share one fetch and its outcome.
    ///
    /// An error still in its cooldown is returned without refetching.
    pub async fn fetch(&self, key: &QueryKey) -> FetchResult {
        let lookup = {
            let now = Instant::now();
            let mut slots = self.inner.slots.lock();
            let slot = slots
                .entry(key.clone())
                .or_insert_with(|| Slot::new(key.clone(), now));
            slot.last_used = now;

            if let Some(rx) = slot.in_flight.clone() {
                debug!(key = %key, "attached to in-flight analytics fetch");
                Lookup::Attached(rx)
            } else if let Some(result) = slot.cached_result(now) {
                Lookup::Cached(result)
            } else {
                Lookup::Scheduled(start_fetch(&self.inner, key, slot))
            }
        };

        let mut done = match lookup {
            Lookup::Cached(result) => return result,
            Lookup::Attached(rx) => rx,
            Lookup::Scheduled(scheduled) => scheduled.spawn(),
        };

        let outcome = done
            .wait_for(Option::is_some)
            .await
            .map_err(|_| FetchError::Aborted)?
            .clone();
        outcome.unwrap_or(Err(FetchError::Aborted))
    }

    /// Observe `key`. The subscription keeps the entry alive and receives
    /// every snapshot change until it is dropped.
    pub fn subscribe(&self, key: &QueryKey) -> QuerySubscription {
        let now = Instant::now();
        let mut slots = self.inner.slots.lock();
        let slot = slots
            .entry(key.clone())
            .or_insert_with(|| Slot::new(key.clone(), now));
        slot.observers += 1;
        slot.last_used = now;
        let scheduled = slot
            .needs_fetch(now)
            .then(|| start_fetch(&self.inner, key, slot));
        // Subscribed after scheduling, so the first change seen is the result.
        let updates = slot.updates.subscribe();
        drop(slots);

        if let Some(scheduled) = scheduled {
            scheduled.spawn();
        }

        QuerySubscription {
            inner: Arc::clone(&self.inner),
            key: key.clone(),
            updates,
        }
    }

    /// Mark `key` stale so the next read refetches. Returns `false` if the
    /// key was never requested.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        let now = Instant::now();
        let mut slots = self.inner.slots.lock();
        let Some(slot) = slots.get_mut(key) else {
            return false;
        };
        invalidate_slot(slot, now);
        debug!(key = %key, "analytics query invalidated");
        true
    }

    /// End the error cooldown of `key` so the next read refetches. Returns
    /// `false` unless the entry holds an error and no fetch is running.
    pub fn retry_failed(&self, key: &QueryKey) -> bool {
        let now = Instant::now();
        let mut slots = self.inner.slots.lock();
        match slots.get_mut(key) {
            Some(slot) if slot.entry.status == QueryStatus::Error && slot.in_flight.is_none() => {
                slot.entry.expires_at = now;
                slot.publish(now);
                true
            }
            _ => false,
        }
    }

    pub fn invalidate_all(&self) {
        let now = Instant::now();
        let mut slots = self.inner.slots.lock();
        for slot in slots.values_mut() {
            invalidate_slot(slot, now);
        }
    }

    pub fn entry(&self, key: &QueryKey) -> Option<QueryCacheEntry> {
        self.inner.slots.lock().get(key).map(|slot| slot.entry.clone())
    }

    pub fn observer_count(&self, key: &QueryKey) -> usize {
        self.inner
            .slots
            .lock()
            .get(key)
            .map_or(0, |slot| slot.observers)
    }

    pub fn len(&self) -> usize {
        self.inner.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict entries nobody observes, with no fetch running, unused for
    /// longer than `gc_time`. Returns the number evicted.
    pub fn collect_garbage(&self) -> usize {
        let now = Instant::now();
        let gc_time = self.inner.options.gc_time;
        let mut slots = self.inner.slots.lock();
        let before = slots.len();
        slots.retain(|_, slot| {
            slot.observers > 0
                || slot.in_flight.is_some()
                || now.duration_since(slot.last_used) < gc_time
        });
        let evicted = before - slots.len();
        if evicted > 0 {
            info!(evicted, remaining = slots.len(), "analytics cache entries evicted");
        }
        evicted
    }

    /// Background loop: run [`QueryCache::collect_garbage`] every `interval`.
    ///
    /// Spawned by the composition root; runs until the task is dropped.
    pub async fn run_gc_loop(self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            self.collect_garbage();
        }
    }
}

fn invalidate_slot(slot: &mut Slot, now: Instant) {
    slot.entry.expires_at = now;
    slot.generation += 1;
    slot.publish(now);
}

enum Lookup {
    Attached(watch::Receiver<Option<FetchResult>>),
    Cached(FetchResult),
    Scheduled(ScheduledFetch),
}

/// A fetch registered on its slot but not yet spawned.
///
/// Spawned only once the `slots` lock is released: if the task is dropped
/// inside `tokio::spawn`, its guard locks `slots` to record the abort.
#[must_use]
struct ScheduledFetch {
    guard: FetchGuard,
    done: watch::Receiver<Option<FetchResult>>,
}

impl ScheduledFetch {
    fn spawn(self) -> watch::Receiver<Option<FetchResult>> {
        let Self { guard, done } = self;
        let span = info_span!("analytics_fetch", key = %guard.key);
        debug!(key = %guard.key, "analytics fetch scheduled");
        tokio::spawn(
            async move {
                let result = guard.inner.fetch_with_retry(&guard.key).await;
                guard.finish(result);
            }
            .instrument(span),
        );
        done
    }
}

/// Register an in-flight fetch on `slot`. The caller spawns it after
/// unlocking.
fn start_fetch(inner: &Arc<Inner>, key: &QueryKey, slot: &mut Slot) -> ScheduledFetch {
    let (done_tx, done_rx) = watch::channel(None);
    slot.in_flight = Some(done_rx.clone());
    slot.publish(Instant::now());

    ScheduledFetch {
        guard: FetchGuard {
            inner: Arc::clone(inner),
            key: key.clone(),
            generation: slot.generation,
            done: Some(done_tx),
        },
        done: done_rx,
    }
}

impl Inner {
    async fn fetch_with_retry(&self, key: &QueryKey) -> Result<FetchedAnalytics, FetchError> {
        let policy = self.options.retry;
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let err = match self.fetcher.fetch(key).await {
                Ok(fetched) => return Ok(fetched),
                Err(err) => err,
            };

            let retryable =
                err.is_retryable() || (self.options.retry_client_errors && err.is_client_error());
            if !retryable {
                warn!(key = %key, error = %err, "analytics fetch failed, not retrying");
                return Err(err);
            }
            if attempt >= policy.max_attempts {
                error!(key = %key, attempts = attempt, error = %err, "analytics fetch retries exhausted");
                return Err(err);
            }

            let delay = policy.delay_for(attempt - 1);
            warn!(
                key = %key,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "analytics fetch failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Store the outcome of the fetch started at `generation` and notify
    /// subscribers.
    fn resolve(
        &self,
        key: &QueryKey,
        generation: u64,
        result: Result<FetchedAnalytics, FetchError>,
    ) -> FetchResult {
        let now = Instant::now();
        let (shared, stale_time): (FetchResult, Duration) = match result {
            Ok(fetched) => {
                let stale_time = match fetched.max_age {
                    Some(hint) if self.options.honor_cache_control => hint,
                    _ => self.options.stale_time,
                };
                info!(key = %key, total_views = fetched.data.total_views, "analytics fetched");
                (Ok(Arc::new(fetched.data)), stale_time)
            }
            Err(FetchError::Aborted) => (Err(FetchError::Aborted), Duration::ZERO),
            Err(err) => (Err(err), self.options.error_stale_time),
        };

        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(key) {
            match &shared {
                Ok(data) => {
                    slot.entry.status = QueryStatus::Success;
                    slot.entry.data = Some(Arc::clone(data));
                    slot.entry.error = None;
                    slot.entry.created_at = now;
                }
                Err(err) => {
                    slot.entry.status = QueryStatus::Error;
                    slot.entry.error = Some(err.clone());
                }
            }
            // Invalidated mid-flight: keep the outcome but refetch on next read.
            slot.entry.expires_at = if slot.generation == generation {
                now + stale_time
            } else {
                now
            };
            slot.in_flight = None;
            slot.last_used = now;
            slot.publish(now);
        }
        shared
    }
}

/// Resolves the in-flight fetch exactly once, even if the task is dropped
/// before the fetcher returns.
struct FetchGuard {
    inner: Arc<Inner>,
    key: QueryKey,
    generation: u64,
    done: Option<watch::Sender<Option<FetchResult>>>,
}

impl FetchGuard {
    fn finish(mut self, result: Result<FetchedAnalytics, FetchError>) {
        if let Some(done) = self.done.take() {
            let shared = self.inner.resolve(&self.key, self.generation, result);
            done.send_replace(Some(shared));
        }
    }
}

impl Drop for FetchGuard {
    fn drop(&mut self) {
        if let Some(done) = self.done.take() {
            let shared = self
                .inner
                .resolve(&self.key, self.generation, Err(FetchError::Aborted));
            done.send_replace(Some(shared));
        }
    }
}

/// A live view of one key. Dropping it detaches the observer; a running
/// fetch still completes and fills the cache.
pub struct QuerySubscription {
    inner: Arc<Inner>,
    key: QueryKey,
    updates: watch::Receiver<QuerySnapshot>,
}

impl QuerySubscription {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn current(&self) -> QuerySnapshot {
        self.updates.borrow().clone()
    }

    /// Wait for the next snapshot change. `None` once the entry is gone.
    pub async fn changed(&mut self) -> Option<QuerySnapshot> {
        self.updates.changed().await.ok()?;
        Some(self.updates.borrow_and_update().clone())
    }

    /// Wait until no fetch is running and a result (data or error) exists.
    pub async fn settled(&mut self) -> Option<QuerySnapshot> {
        let snapshot = self
            .updates
            .wait_for(QuerySnapshot::is_settled)
            .await
            .ok()?
            .clone();
        Some(snapshot)
    }
}

impl Drop for QuerySubscription {
    fn drop(&mut self) {
        let mut slots = self.inner.slots.lock();
        if let Some(slot) = slots.get_mut(&self.key) {
            slot.observers = slot.observers.saturating_sub(1);
            slot.last_used = Instant::now();
        }
    }
}
