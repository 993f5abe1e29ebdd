use crate::cache::CalendarCache;
use crate::errors::CalendarError;
use crate::loader::config::LoaderConfig;
use crate::loader::source::CalendarSource;
use crate::request::{CalendarDataRequest, Direction};
use crate::types::{CacheKey, Priority};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Notify, oneshot};

const REQUESTS: &str = "slotcache::requests";

type LoadResult = Result<Value, CalendarError>;

struct QueuedRequest {
    priority: Priority,
    seq: u64,
    key: CacheKey,
    request: CalendarDataRequest,
}

// Max-heap order: higher priority first, then FIFO by sequence number.
impl Ord for QueuedRequest {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.priority.cmp(&other.priority).then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedRequest {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedRequest {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedRequest {}

#[derive(Default)]
struct QueueState {
    queue: BinaryHeap<QueuedRequest>,
    /// Keys queued or in flight, with everyone waiting on them.
    pending: HashMap<CacheKey, Vec<oneshot::Sender<LoadResult>>>,
    active: usize,
    next_seq: u64,
}

#[derive(Default)]
struct LoaderMetrics {
    completed: AtomicU64,
    failed: AtomicU64,
    retries: AtomicU64,
    deduplicated: AtomicU64,
    prefetched: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoaderStats {
    pub queued: usize,
    pub active: usize,
    pub pending: usize,
    pub completed: u64,
    pub failed: u64,
    pub retries: u64,
    pub deduplicated: u64,
    pub prefetched: u64,
}

struct Inner {
    source: Arc<dyn CalendarSource>,
    cache: CalendarCache,
    config: LoaderConfig,
    state: Mutex<QueueState>,
    metrics: LoaderMetrics,
    idle: Notify,
}

/// Bounded-concurrency loader in front of a [`CalendarSource`].
///
/// Requests are answered from the cache when possible, deduplicated by cache
/// key while queued or in flight, and run at most `max_concurrency` at a time
/// in priority order. Queued work cannot be cancelled; dropping a caller's
/// future only stops that caller from waiting.
///
/// All methods that start work spawn Tokio tasks and must run inside a runtime.
#[derive(Clone)]
pub struct LazyLoadManager {
    inner: Arc<Inner>,
}

impl LazyLoadManager {
    /// # Errors
    /// Returns `Config` if the loader configuration is invalid.
    pub fn new(
        source: Arc<dyn CalendarSource>,
        cache: CalendarCache,
        config: LoaderConfig,
    ) -> Result<Self, CalendarError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                source,
                cache,
                config,
                state: Mutex::new(QueueState::default()),
                metrics: LoaderMetrics::default(),
                idle: Notify::new(),
            }),
        })
    }

    pub fn cache(&self) -> &CalendarCache {
        &self.inner.cache
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    /// Loads `request` at normal priority, then prefetches the neighbouring
    /// ranges when prefetching is enabled.
    ///
    /// # Errors
    /// See [`LazyLoadManager::queue_request`].
    pub async fn load(&self, request: &CalendarDataRequest) -> Result<Value, CalendarError> {
        let value = self.queue_request(request, Priority::Normal).await?;
        if self.inner.config.prefetch {
            self.prefetch(request);
        }
        Ok(value)
    }

    /// Returns cached data or queues a load and waits for it.
    ///
    /// A request identical to one already queued or in flight shares its
    /// result instead of calling the source again; if the shared job sits in
    /// the queue at a lower priority it is raised to `priority`.
    ///
    /// # Errors
    /// Returns `InvalidRequest` for an inverted range, the source's last error
    /// once retries are exhausted, or `Cancelled` if the worker went away.
    pub async fn queue_request(
        &self,
        request: &CalendarDataRequest,
        priority: Priority,
    ) -> Result<Value, CalendarError> {
        request.validate()?;
        if let Some(value) = self.inner.cache.get::<Value>(request) {
            return Ok(value);
        }
        let (tx, rx) = oneshot::channel();
        self.enqueue(request, priority, Some(tx));
        self.pump();
        rx.await.map_err(|_| CalendarError::Cancelled)?
    }

    /// Calls the source up to `retry_attempts` times with exponential backoff.
    /// Non-retryable errors return immediately.
    ///
    /// # Errors
    /// Returns the last error from the source.
    pub async fn execute_with_retry(&self, request: &CalendarDataRequest) -> LoadResult {
        let attempts = self.inner.config.retry_attempts.max(1);
        let mut attempt = 1u32;
        loop {
            match self.inner.source.load(request).await {
                Ok(value) => {
                    log::debug!(
                        target: REQUESTS,
                        "loaded {}..{} view={} attempt={attempt}",
                        request.start_date,
                        request.end_date,
                        request.view
                    );
                    return Ok(value);
                }
                Err(e) if attempt < attempts && e.is_retryable() => {
                    let delay = self.inner.config.backoff(attempt);
                    log::warn!(
                        target: REQUESTS,
                        "attempt {attempt}/{attempts} for {}..{} failed: {e}; retrying in {delay:?}",
                        request.start_date,
                        request.end_date
                    );
                    self.inner.metrics.retries.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Queues low-priority loads for the ranges before and after `request`
    /// unless they are cached or already pending. Does not wait for them.
    /// Returns how many loads were scheduled.
    pub fn prefetch(&self, request: &CalendarDataRequest) -> usize {
        let mut scheduled = 0usize;
        for direction in [Direction::Forward, Direction::Backward] {
            let Some(next) = request.adjacent(direction) else { continue };
            if self.inner.cache.contains(&next) {
                continue;
            }
            if self.enqueue(&next, Priority::Low, None) {
                scheduled += 1;
            }
        }
        if scheduled > 0 {
            self.inner.metrics.prefetched.fetch_add(scheduled as u64, Ordering::Relaxed);
            log::debug!(target: REQUESTS, "prefetch scheduled={scheduled} around {}", request.start_date);
            self.pump();
        }
        scheduled
    }

    /// Resolves once nothing is queued or in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    pub fn is_idle(&self) -> bool {
        let state = self.inner.state.lock();
        state.queue.is_empty() && state.active == 0
    }

    pub fn stats(&self) -> LoaderStats {
        let state = self.inner.state.lock();
        let m = &self.inner.metrics;
        LoaderStats {
            queued: state.queue.len(),
            active: state.active,
            pending: state.pending.len(),
            completed: m.completed.load(Ordering::Relaxed),
            failed: m.failed.load(Ordering::Relaxed),
            retries: m.retries.load(Ordering::Relaxed),
            deduplicated: m.deduplicated.load(Ordering::Relaxed),
            prefetched: m.prefetched.load(Ordering::Relaxed),
        }
    }

    /// Registers interest in `request`. Returns true if a new job was queued,
    /// false if an identical one was already pending.
    fn enqueue(
        &self,
        request: &CalendarDataRequest,
        priority: Priority,
        waiter: Option<oneshot::Sender<LoadResult>>,
    ) -> bool {
        let key = request.cache_key();
        let mut state = self.inner.state.lock();
        if let Some(waiters) = state.pending.get_mut(&key) {
            if let Some(tx) = waiter {
                waiters.push(tx);
                self.inner.metrics.deduplicated.fetch_add(1, Ordering::Relaxed);
            }
            raise_priority(&mut state.queue, &key, priority);
            return false;
        }
        state.pending.insert(key.clone(), waiter.into_iter().collect());
        let seq = state.next_seq;
        state.next_seq += 1;
        state.queue.push(QueuedRequest { priority, seq, key, request: request.clone() });
        true
    }

    /// Starts queued jobs until the concurrency limit is reached.
    fn pump(&self) {
        loop {
            let job = {
                let mut state = self.inner.state.lock();
                if state.active >= self.inner.config.max_concurrency {
                    return;
                }
                let Some(job) = state.queue.pop() else { return };
                state.active += 1;
                job
            };
            let this = self.clone();
            tokio::spawn(async move { this.run(job).await });
        }
    }

    async fn run(&self, job: QueuedRequest) {
        let mut slot = ActiveSlot { loader: self.clone(), key: job.key.clone(), settled: false };
        let result = self.execute_with_retry(&job.request).await;
        match &result {
            Ok(value) => {
                if let Err(e) =
                    self.inner.cache.set_with_priority(&job.request, value, None, job.priority)
                {
                    log::warn!(target: REQUESTS, "loaded but not cached: {e}");
                }
                self.inner.metrics.completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                self.inner.metrics.failed.fetch_add(1, Ordering::Relaxed);
                log::error!(
                    target: REQUESTS,
                    "load {}..{} view={} failed: {e}",
                    job.request.start_date,
                    job.request.end_date,
                    job.request.view
                );
            }
        }
        for tx in slot.settle() {
            let _ = tx.send(result.clone());
        }
    }

    /// Frees a worker slot and takes the job's waiters out of `pending`.
    fn release(&self, key: &str) -> Vec<oneshot::Sender<LoadResult>> {
        let mut state = self.inner.state.lock();
        state.active = state.active.saturating_sub(1);
        state.pending.remove(key).unwrap_or_default()
    }

    fn after_release(&self) {
        if tokio::runtime::Handle::try_current().is_ok() {
            self.pump();
        }
        if self.is_idle() {
            self.inner.idle.notify_waiters();
        }
    }
}

/// Holds a worker slot for one running job. Dropping it without `settle`
/// (a panicking source, or an aborted task) still frees the slot; the
/// job's waiters then see `Cancelled`.
struct ActiveSlot {
    loader: LazyLoadManager,
    key: CacheKey,
    settled: bool,
}

impl ActiveSlot {
    /// Releases the slot and hands back the job's waiters. Queued work is
    /// started when the slot is dropped.
    fn settle(&mut self) -> Vec<oneshot::Sender<LoadResult>> {
        self.settled = true;
        self.loader.release(&self.key)
    }
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        if !self.settled {
            self.loader.inner.metrics.failed.fetch_add(1, Ordering::Relaxed);
            log::error!(target: REQUESTS, "load for {} aborted before completing", self.key);
            drop(self.loader.release(&self.key));
        }
        self.loader.after_release();
    }
}

fn raise_priority(queue: &mut BinaryHeap<QueuedRequest>, key: &str, priority: Priority) {
    if !queue.iter().any(|q| q.key == key && q.priority < priority) {
        return;
    }
    let mut jobs = std::mem::take(queue).into_vec();
    for job in jobs.iter_mut().filter(|q| q.key == key) {
        job.priority = priority;
    }
    *queue = BinaryHeap::from(jobs);
}
