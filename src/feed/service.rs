//! Cache-aside orchestration for the feed endpoint.
//!
//! One decision per request:
//!
//! - snapshot fresh: serve it
//! - stale or absent: fetch, parse, replace the snapshot, serve it
//! - fetch failed: serve the stale snapshot if there is one, otherwise fail
//!
//! Refreshes run on a spawned task so a caller going away does not cancel the
//! fetch; the result still lands in the cache. With single-flight enabled,
//! concurrent cache misses share one in-flight refresh.
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::cache::{Clock, FeedCache, MemoryCache, SystemClock, DEFAULT_TTL};
use super::fetcher::{FeedSource, FetchError};
use super::parser::parse_feed;
use super::types::Snapshot;

pub type RefreshResult = Result<Arc<Snapshot>, Arc<FetchError>>;
type RefreshFuture = Shared<BoxFuture<'static, RefreshResult>>;

/// How a request was satisfied.
#[derive(Debug, Clone)]
pub enum FeedOutcome {
    /// Snapshot was within its TTL; no upstream call was made.
    Fresh(Arc<Snapshot>),
    /// Snapshot was stale or absent and has just been replaced.
    Refreshed(Arc<Snapshot>),
    /// Upstream failed; the previous snapshot is served as-is.
    Stale {
        snapshot: Arc<Snapshot>,
        error: Arc<FetchError>,
    },
}

impl FeedOutcome {
    pub fn snapshot(&self) -> &Arc<Snapshot> {
        match self {
            FeedOutcome::Fresh(snapshot) | FeedOutcome::Refreshed(snapshot) => snapshot,
            FeedOutcome::Stale { snapshot, .. } => snapshot,
        }
    }

    /// Whether intermediaries may cache the response.
    pub fn is_cacheable(&self) -> bool {
        !matches!(self, FeedOutcome::Stale { .. })
    }
}

pub struct FeedService {
    source: Arc<dyn FeedSource>,
    cache: Arc<dyn FeedCache>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    single_flight: bool,
    in_flight: Mutex<Option<RefreshFuture>>,
}

impl FeedService {
    /// Creates a service with an in-memory cache, the system clock, a
    /// 5 minute TTL and single-flight refreshes.
    pub fn new(source: Arc<dyn FeedSource>) -> Self {
        Self {
            source,
            cache: Arc::new(MemoryCache::new()),
            clock: Arc::new(SystemClock),
            ttl: DEFAULT_TTL,
            single_flight: true,
            in_flight: Mutex::new(None),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn FeedCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled;
        self
    }

    /// Resolves the current article list, refreshing from upstream when needed.
    ///
    /// # Errors
    ///
    /// Returns the fetch error only when the upstream failed and no snapshot
    /// has ever been cached.
    pub async fn articles(self: &Arc<Self>) -> Result<FeedOutcome, Arc<FetchError>> {
        let now = self.clock.now();
        if self.cache.is_fresh(now, self.ttl) {
            if let Some(snapshot) = self.cache.get() {
                tracing::debug!(
                    age_secs = snapshot.age(now).as_secs(),
                    "Serving feed from cache"
                );
                return Ok(FeedOutcome::Fresh(snapshot));
            }
        }

        match self.refresh().await {
            Ok(snapshot) => Ok(FeedOutcome::Refreshed(snapshot)),
            Err(error) => match self.cache.get() {
                Some(snapshot) => {
                    tracing::warn!(
                        error = %error,
                        age_secs = snapshot.age(self.clock.now()).as_secs(),
                        "Feed refresh failed, serving stale snapshot"
                    );
                    Ok(FeedOutcome::Stale { snapshot, error })
                }
                None => {
                    tracing::error!(error = %error, "Feed refresh failed with no cached snapshot");
                    Err(error)
                }
            },
        }
    }

    /// Fetches, parses and stores a new snapshot, ignoring freshness.
    ///
    /// With single-flight enabled, a call made while another refresh is
    /// running joins that refresh instead of issuing a second upstream request.
    pub async fn refresh(self: &Arc<Self>) -> RefreshResult {
        if !self.single_flight {
            return self.spawn_refresh().await;
        }

        let refresh = {
            let mut slot = self.lock_in_flight();
            match slot.as_ref() {
                Some(refresh) => {
                    tracing::debug!("Joining in-flight feed refresh");
                    refresh.clone()
                }
                None => {
                    let refresh = self.spawn_refresh();
                    *slot = Some(refresh.clone());
                    refresh
                }
            }
        };

        refresh.await
    }

    fn spawn_refresh(self: &Arc<Self>) -> RefreshFuture {
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            // Clears the single-flight slot even if the fetch panics
            let _guard = this.single_flight.then(|| InFlightGuard(Arc::clone(&this)));
            this.fetch_and_store().await
        });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(Arc::new(FetchError::TaskFailed(e.to_string()))),
            }
        }
        .boxed()
        .shared()
    }

    async fn fetch_and_store(&self) -> RefreshResult {
        let xml = self.source.fetch().await.map_err(Arc::new)?;
        let articles = parse_feed(&xml);
        let snapshot = self.cache.set(articles, self.clock.now());

        tracing::info!(articles = snapshot.articles.len(), "Feed snapshot refreshed");
        Ok(snapshot)
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, Option<RefreshFuture>> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }
}

struct InFlightGuard(Arc<FeedService>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        *self.0.lock_in_flight() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    const ONE_ITEM: &str = "<rss><channel><item><title>One</title></item></channel></rss>";
    const TWO_ITEMS: &str =
        "<rss><channel><item><title>A</title></item><item><title>B</title></item></channel></rss>";

    /// Source returning a configurable body (or a 503 when `None`).
    struct StubSource {
        calls: AtomicUsize,
        body: Mutex<Option<String>>,
        delay: Duration,
    }

    impl StubSource {
        fn new(body: Option<&str>) -> Arc<Self> {
            Self::with_delay(body, Duration::ZERO)
        }

        fn with_delay(body: Option<&str>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                body: Mutex::new(body.map(str::to_string)),
                delay,
            })
        }

        fn set_body(&self, body: Option<&str>) {
            *self.body.lock().unwrap() = body.map(str::to_string);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FeedSource for StubSource {
        async fn fetch(&self) -> Result<String, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let body = self.body.lock().unwrap().clone();
            body.ok_or(FetchError::Upstream(503))
        }
    }

    struct ManualClock {
        base: Instant,
        offset: Mutex<Duration>,
    }

    impl ManualClock {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                base: Instant::now(),
                offset: Mutex::new(Duration::ZERO),
            })
        }

        fn set(&self, offset: Duration) {
            *self.offset.lock().unwrap() = offset;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.base + *self.offset.lock().unwrap()
        }
    }

    fn service(source: Arc<StubSource>, clock: Arc<ManualClock>) -> Arc<FeedService> {
        Arc::new(FeedService::new(source).with_clock(clock))
    }

    #[tokio::test]
    async fn test_cold_start_fetches() {
        let source = StubSource::new(Some(TWO_ITEMS));
        let svc = service(source.clone(), ManualClock::new());

        let outcome = svc.articles().await.unwrap();
        assert!(matches!(outcome, FeedOutcome::Refreshed(_)));
        assert!(outcome.is_cacheable());
        assert_eq!(outcome.snapshot().articles.len(), 2);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_freshness_boundary() {
        let source = StubSource::new(Some(ONE_ITEM));
        let clock = ManualClock::new();
        let svc = service(source.clone(), clock.clone());

        svc.articles().await.unwrap();
        assert_eq!(source.calls(), 1);

        clock.set(Duration::from_secs(299));
        let outcome = svc.articles().await.unwrap();
        assert!(matches!(outcome, FeedOutcome::Fresh(_)));
        assert_eq!(source.calls(), 1);

        clock.set(Duration::from_secs(301));
        let outcome = svc.articles().await.unwrap();
        assert!(matches!(outcome, FeedOutcome::Refreshed(_)));
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_refresh_stamps_snapshot_with_clock() {
        let source = StubSource::new(Some(ONE_ITEM));
        let clock = ManualClock::new();
        let svc = service(source, clock.clone());

        clock.set(Duration::from_secs(10));
        let outcome = svc.articles().await.unwrap();
        assert_eq!(outcome.snapshot().fetched_at, clock.now());
    }

    #[tokio::test]
    async fn test_custom_ttl() {
        let source = StubSource::new(Some(ONE_ITEM));
        let clock = ManualClock::new();
        let svc = Arc::new(
            FeedService::new(source.clone())
                .with_clock(clock.clone())
                .with_ttl(Duration::from_secs(10)),
        );

        svc.articles().await.unwrap();
        clock.set(Duration::from_secs(11));
        svc.articles().await.unwrap();
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_stale_fallback_on_failure() {
        let source = StubSource::new(Some(TWO_ITEMS));
        let clock = ManualClock::new();
        let svc = service(source.clone(), clock.clone());

        svc.articles().await.unwrap();

        source.set_body(None);
        clock.set(Duration::from_secs(600));
        let outcome = svc.articles().await.unwrap();
        match &outcome {
            FeedOutcome::Stale { snapshot, error } => {
                assert_eq!(snapshot.articles.len(), 2);
                assert!(matches!(**error, FetchError::Upstream(503)));
            }
            other => panic!("Expected Stale, got {:?}", other),
        }
        assert!(!outcome.is_cacheable());
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_retried_on_next_request() {
        let source = StubSource::new(Some(ONE_ITEM));
        let clock = ManualClock::new();
        let svc = service(source.clone(), clock.clone());

        svc.articles().await.unwrap();
        source.set_body(None);
        clock.set(Duration::from_secs(400));
        svc.articles().await.unwrap();
        svc.articles().await.unwrap();

        // Failed refreshes do not bump the snapshot timestamp
        assert_eq!(source.calls(), 3);
    }

    #[tokio::test]
    async fn test_cold_failure() {
        let source = StubSource::new(None);
        let svc = service(source.clone(), ManualClock::new());

        let err = svc.articles().await.unwrap_err();
        assert!(matches!(*err, FetchError::Upstream(503)));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_injected_cache_is_used() {
        let cache = Arc::new(MemoryCache::new());
        let clock = ManualClock::new();
        cache.set(
            vec![crate::feed::Article {
                title: "seeded".into(),
                ..Default::default()
            }],
            clock.now(),
        );

        let source = StubSource::new(Some(ONE_ITEM));
        let svc = Arc::new(
            FeedService::new(source.clone())
                .with_cache(cache)
                .with_clock(clock),
        );

        let outcome = svc.articles().await.unwrap();
        assert!(matches!(outcome, FeedOutcome::Fresh(_)));
        assert_eq!(outcome.snapshot().articles[0].title, "seeded");
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_single_flight_deduplicates_concurrent_misses() {
        let source = StubSource::with_delay(Some(ONE_ITEM), Duration::from_millis(50));
        let svc = service(source.clone(), ManualClock::new());

        let results = futures::future::join_all((0..5).map(|_| svc.articles())).await;
        for result in results {
            assert!(matches!(result, Ok(FeedOutcome::Refreshed(_))));
        }
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_without_single_flight_every_miss_fetches() {
        let source = StubSource::with_delay(Some(ONE_ITEM), Duration::from_millis(50));
        let svc = Arc::new(
            FeedService::new(source.clone())
                .with_clock(ManualClock::new())
                .with_single_flight(false),
        );

        let results = futures::future::join_all((0..5).map(|_| svc.articles())).await;
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(source.calls(), 5);
    }

    #[tokio::test]
    async fn test_single_flight_slot_cleared_after_refresh() {
        let source = StubSource::new(Some(ONE_ITEM));
        let svc = service(source.clone(), ManualClock::new());

        svc.refresh().await.unwrap();
        // Give the spawned task a chance to drop its guard
        tokio::task::yield_now().await;
        svc.refresh().await.unwrap();

        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_abandoned_request_still_populates_cache() {
        let source = StubSource::with_delay(Some(TWO_ITEMS), Duration::from_millis(50));
        let cache = Arc::new(MemoryCache::new());
        let svc = Arc::new(
            FeedService::new(source.clone())
                .with_cache(cache.clone())
                .with_clock(ManualClock::new()),
        );

        // The caller gives up long before the fetch finishes
        let abandoned = tokio::time::timeout(Duration::from_millis(5), svc.articles()).await;
        assert!(abandoned.is_err());
        assert!(cache.get().is_none());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(cache.get().unwrap().articles.len(), 2);
        assert_eq!(source.calls(), 1);
    }
}
