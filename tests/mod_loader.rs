use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use serde_json::{Value, json};
use slotcache::cache::{CacheConfig, CalendarCache};
use slotcache::errors::CalendarError;
use slotcache::loader::{CalendarSource, LazyLoadManager, LoaderConfig};
use slotcache::request::{CalendarDataRequest, CalendarView, Direction};
use slotcache::types::Priority;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Source that answers with the requested range after `delay`, failing the
/// first `failures` calls with `error`.
struct MockSource {
    delay: Duration,
    failures: AtomicUsize,
    error: CalendarError,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    order: Mutex<Vec<NaiveDate>>,
}

impl MockSource {
    fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            failures: AtomicUsize::new(0),
            error: CalendarError::Network("connection reset".into()),
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            order: Mutex::new(Vec::new()),
        }
    }

    fn failing(mut self, times: usize, error: CalendarError) -> Self {
        self.failures = AtomicUsize::new(times);
        self.error = error;
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CalendarSource for MockSource {
    async fn load(&self, request: &CalendarDataRequest) -> Result<Value, CalendarError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.order.lock().push(request.start_date);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(self.error.clone());
        }
        Ok(json!({
            "start": request.start_date.to_string(),
            "end": request.end_date.to_string(),
            "view": request.view.as_str(),
            "appointments": [],
        }))
    }
}

fn date(m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, m, d).unwrap()
}

fn day(m: u32, d: u32) -> CalendarDataRequest {
    CalendarDataRequest::new(date(m, d), date(m, d), CalendarView::Day)
}

fn quick_config() -> LoaderConfig {
    LoaderConfig { retry_base_delay_ms: 10, prefetch: false, ..Default::default() }
}

fn manager(source: Arc<MockSource>, config: LoaderConfig) -> LazyLoadManager {
    let cache = CalendarCache::new(CacheConfig::default()).unwrap();
    LazyLoadManager::new(source, cache, config).unwrap()
}

#[tokio::test]
async fn test_loads_and_caches() {
    let source = Arc::new(MockSource::new(5));
    let mgr = manager(source.clone(), quick_config());

    let v = mgr.queue_request(&day(5, 6), Priority::Normal).await.unwrap();
    assert_eq!(v["start"], "2024-05-06");
    assert!(mgr.cache().contains(&day(5, 6)));

    // Served from cache the second time.
    let again = mgr.queue_request(&day(5, 6), Priority::Normal).await.unwrap();
    assert_eq!(again, v);
    assert_eq!(source.calls(), 1);
    assert_eq!(mgr.stats().completed, 1);
}

#[tokio::test]
async fn test_identical_requests_share_one_call() {
    let source = Arc::new(MockSource::new(50));
    let mgr = manager(source.clone(), quick_config());
    let req = day(5, 7);

    let (a, b, c) = tokio::join!(
        mgr.queue_request(&req, Priority::Normal),
        mgr.queue_request(&req, Priority::High),
        mgr.queue_request(&req, Priority::Low),
    );
    assert_eq!(a.unwrap(), b.clone().unwrap());
    assert_eq!(b.unwrap(), c.unwrap());
    assert_eq!(source.calls(), 1);
    assert_eq!(mgr.stats().deduplicated, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_is_bounded() {
    let source = Arc::new(MockSource::new(30));
    let mgr = manager(source.clone(), LoaderConfig { max_concurrency: 2, ..quick_config() });

    let mut handles = Vec::new();
    for d in 1..=6 {
        let m = mgr.clone();
        handles.push(tokio::spawn(async move { m.queue_request(&day(5, d), Priority::Normal).await }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }
    assert_eq!(source.calls(), 6);
    assert!(source.max_in_flight.load(Ordering::SeqCst) <= 2);
    assert!(mgr.is_idle());
}

#[tokio::test]
async fn test_retries_transient_failures() {
    let source = Arc::new(MockSource::new(1).failing(2, CalendarError::Network("timeout".into())));
    let mgr = manager(source.clone(), quick_config());

    let v = mgr.queue_request(&day(5, 8), Priority::Normal).await.unwrap();
    assert_eq!(v["view"], "day");
    assert_eq!(source.calls(), 3);
    assert_eq!(mgr.stats().retries, 2);
}

#[tokio::test]
async fn test_gives_up_after_retry_attempts() {
    let source = Arc::new(MockSource::new(1).failing(10, CalendarError::Network("down".into())));
    let mgr = manager(source.clone(), quick_config());

    let err = mgr.queue_request(&day(5, 8), Priority::Normal).await.unwrap_err();
    assert_eq!(err, CalendarError::Network("down".into()));
    assert_eq!(source.calls(), 3);
    assert_eq!(mgr.stats().failed, 1);
    assert!(!mgr.cache().contains(&day(5, 8)));
}

#[tokio::test]
async fn test_client_errors_fail_fast() {
    let not_found = CalendarError::Http { status: 404, message: "Not Found".into() };
    let source = Arc::new(MockSource::new(1).failing(10, not_found.clone()));
    let mgr = manager(source.clone(), quick_config());

    let err = mgr.queue_request(&day(5, 8), Priority::Normal).await.unwrap_err();
    assert_eq!(err, not_found);
    assert_eq!(source.calls(), 1);
    assert_eq!(mgr.stats().retries, 0);
}

#[tokio::test]
async fn test_backoff_doubles_between_attempts() {
    let source = Arc::new(MockSource::new(0).failing(2, CalendarError::Network("flaky".into())));
    let mgr = manager(source.clone(), LoaderConfig { retry_base_delay_ms: 40, ..quick_config() });

    let started = tokio::time::Instant::now();
    mgr.execute_with_retry(&day(5, 9)).await.unwrap();
    // 40ms after the first failure, 80ms after the second.
    assert!(started.elapsed() >= Duration::from_millis(120));
}

#[tokio::test]
async fn test_inverted_range_never_reaches_source() {
    let source = Arc::new(MockSource::new(1));
    let mgr = manager(source.clone(), quick_config());
    let req = CalendarDataRequest::new(date(5, 9), date(5, 2), CalendarView::Week);
    assert!(matches!(
        mgr.queue_request(&req, Priority::Normal).await,
        Err(CalendarError::InvalidRequest(_))
    ));
    assert_eq!(source.calls(), 0);
}

#[tokio::test]
async fn test_load_prefetches_neighbours() {
    let source = Arc::new(MockSource::new(5));
    let mgr = manager(source.clone(), LoaderConfig { prefetch: true, ..quick_config() });
    let week = CalendarDataRequest::new(date(5, 6), date(5, 12), CalendarView::Week);

    mgr.load(&week).await.unwrap();
    mgr.wait_idle().await;

    let next = week.adjacent(Direction::Forward).unwrap();
    let prev = week.adjacent(Direction::Backward).unwrap();
    assert!(mgr.cache().contains(&next));
    assert!(mgr.cache().contains(&prev));
    assert_eq!(source.calls(), 3);
    assert_eq!(mgr.stats().prefetched, 2);
    assert_eq!(mgr.cache().stats().low_priority_entries, 2);

    // Everything around is cached now.
    assert_eq!(mgr.prefetch(&week), 0);
}

#[tokio::test]
async fn test_prefetch_skips_pending_ranges() {
    let source = Arc::new(MockSource::new(20));
    let mgr = manager(source.clone(), quick_config());
    let req = day(5, 15);

    assert_eq!(mgr.prefetch(&req), 2);
    assert_eq!(mgr.prefetch(&req), 0);
    mgr.wait_idle().await;
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn test_higher_priority_runs_first() {
    let source = Arc::new(MockSource::new(30));
    let mgr = manager(source.clone(), LoaderConfig { max_concurrency: 1, ..quick_config() });

    let m = mgr.clone();
    let first = tokio::spawn(async move { m.queue_request(&day(5, 1), Priority::Normal).await });
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Queued behind the active job: two low-priority neighbours, then a
    // high-priority request that must overtake them.
    assert_eq!(mgr.prefetch(&day(6, 10)), 2);
    mgr.queue_request(&day(7, 1), Priority::High).await.unwrap();
    first.await.unwrap().unwrap();
    mgr.wait_idle().await;

    let order = source.order.lock().clone();
    assert_eq!(order[0], date(5, 1));
    assert_eq!(order[1], date(7, 1));
    assert_eq!(order.len(), 4);
}

#[tokio::test]
async fn test_duplicate_raises_queued_priority() {
    let source = Arc::new(MockSource::new(30));
    let mgr = manager(source.clone(), LoaderConfig { max_concurrency: 1, ..quick_config() });

    let m = mgr.clone();
    let first = tokio::spawn(async move { m.queue_request(&day(5, 1), Priority::Normal).await });
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Forward (6/11) is queued before backward (6/9); asking for the backward
    // one at high priority moves it ahead.
    assert_eq!(mgr.prefetch(&day(6, 10)), 2);
    mgr.queue_request(&day(6, 9), Priority::High).await.unwrap();
    first.await.unwrap().unwrap();
    mgr.wait_idle().await;

    let order = source.order.lock().clone();
    assert_eq!(order, vec![date(5, 1), date(6, 9), date(6, 11)]);
    assert_eq!(mgr.stats().deduplicated, 1);
}

#[tokio::test]
async fn test_wait_idle_returns_immediately_when_idle() {
    let source = Arc::new(MockSource::new(1));
    let mgr = manager(source, quick_config());
    tokio::time::timeout(Duration::from_millis(100), mgr.wait_idle()).await.unwrap();
    assert!(mgr.is_idle());
}

#[tokio::test]
async fn test_invalid_loader_config() {
    let cache = CalendarCache::new(CacheConfig::default()).unwrap();
    let source = Arc::new(MockSource::new(1));
    let cfg = LoaderConfig { max_concurrency: 0, ..Default::default() };
    assert!(matches!(LazyLoadManager::new(source, cache, cfg), Err(CalendarError::Config(_))));
}

/// Panics on its first call, answers normally afterwards.
struct PanicOnceSource {
    calls: AtomicUsize,
}

#[async_trait]
impl CalendarSource for PanicOnceSource {
    async fn load(&self, request: &CalendarDataRequest) -> Result<Value, CalendarError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("calendar backend blew up");
        }
        Ok(json!({ "start": request.start_date.to_string() }))
    }
}

#[tokio::test]
async fn test_panicking_source_frees_its_worker() {
    let source = Arc::new(PanicOnceSource { calls: AtomicUsize::new(0) });
    let cache = CalendarCache::new(CacheConfig::default()).unwrap();
    let cfg = LoaderConfig { max_concurrency: 1, ..quick_config() };
    let mgr = LazyLoadManager::new(source.clone(), cache, cfg).unwrap();
    let limit = Duration::from_secs(2);

    let first = tokio::time::timeout(limit, mgr.queue_request(&day(5, 6), Priority::Normal))
        .await
        .expect("waiter must be woken");
    assert_eq!(first, Err(CalendarError::Cancelled));
    tokio::time::timeout(limit, mgr.wait_idle()).await.expect("loader must go idle");

    let stats = mgr.stats();
    assert_eq!((stats.active, stats.pending, stats.failed), (0, 0, 1));

    let second = tokio::time::timeout(limit, mgr.queue_request(&day(5, 6), Priority::Normal))
        .await
        .expect("retry must not hang")
        .unwrap();
    assert_eq!(second["start"], "2024-05-06");
    assert_eq!(source.calls.load(Ordering::SeqCst), 2);
}
