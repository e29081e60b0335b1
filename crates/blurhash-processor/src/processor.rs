//! The processing engine: LRU cache, concurrency limit and request
//! deduplication around a [`PixelDecoder`].

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use blurhash_decoder::{
    validate_dimensions, validate_hash, validate_punch, BlurHashDecoder, PixelBuffer,
};
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::ProcessorConfig;
use crate::decoder::PixelDecoder;
use crate::error::{BlurHashResult, ProcessError, ProcessResult};
use crate::in_flight::{
    self, FinishGuard, Finished, InFlight, Outcome, OutcomeReceiver, OutcomeSender,
};
use crate::key::{CacheKey, DecodeRequest};
use crate::lru::LruCache;
use crate::stats::{ProcessorStats, StatsSnapshot};

/// Decodes BlurHashes on a background pool with caching and deduplication.
///
/// The handle is cheap to clone; clones share one cache, one concurrency
/// limit and one set of statistics.
///
/// * Cache hits return immediately without taking a concurrency slot.
/// * Concurrent requests for the same key share a single decode and all
///   observe its outcome.
/// * At most `max_concurrent_jobs` decodes run at once.
///
/// Dropping a `process` future detaches that caller only. [`cancel`] works on
/// the whole operation: every caller waiting on the key receives
/// [`ProcessError::Cancelled`].
///
/// Cancelling also stops the decode itself: its concurrency slot is
/// released as soon as the decoder notices, and a new request for the same
/// key waits for the cancelled decode to return before starting its own.
///
/// [`cancel`]: BlurHashProcessor::cancel
///
/// ```
/// use blurhash_processor::{BlurHashProcessor, DecodeRequest, ProcessorConfig};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let processor = BlurHashProcessor::new(ProcessorConfig::default()).unwrap();
/// let request = DecodeRequest::new("LGFFaXYk^6#M@-5c,1J5@[or[Q6.", 32, 32);
///
/// let image = processor.process(&request).await.unwrap();
/// assert_eq!(image.as_bytes().len(), 32 * 32 * 3);
///
/// let again = processor.process(&request).await.unwrap();
/// assert_eq!(image, again);
/// assert_eq!(processor.stats().hit_count, 1);
///
/// processor.cleanup();
/// # }
/// ```
#[derive(Clone)]
pub struct BlurHashProcessor {
    inner: Arc<Inner>,
}

struct Inner {
    config: ProcessorConfig,
    decoder: Arc<dyn PixelDecoder>,
    runtime: Handle,
    permits: Arc<Semaphore>,
    state: Mutex<State>,
    stats: ProcessorStats,
    next_id: AtomicU64,
    shut_down: AtomicBool,
}

/// Cache and in-flight map share one lock so that publishing a result and
/// retiring its in-flight entry is atomic with respect to lookups.
struct State {
    cache: LruCache<CacheKey, Arc<PixelBuffer>>,
    in_flight: HashMap<CacheKey, InFlight>,
    /// Cancelled decodes that may still be running, per key.
    draining: HashMap<CacheKey, Vec<Finished>>,
}

impl State {
    /// Retire `entry` as cancelled. The caller aborts its task after
    /// releasing the lock.
    fn cancel(&mut self, key: CacheKey, entry: &InFlight) {
        let finished = entry.cancel();
        self.draining.retain(|_, pending| {
            pending.retain(|f| !in_flight::is_finished(f));
            !pending.is_empty()
        });
        self.draining.entry(key).or_default().push(finished);
    }

    /// Decodes of `key` that a new operation must wait out.
    fn predecessors(&mut self, key: &CacheKey) -> Vec<Finished> {
        let Some(pending) = self.draining.get_mut(key) else {
            return Vec::new();
        };
        pending.retain(|f| !in_flight::is_finished(f));
        if pending.is_empty() {
            self.draining.remove(key);
            return Vec::new();
        }
        pending.clone()
    }
}

/// Everything the task running one operation needs.
struct Job {
    key: CacheKey,
    request: DecodeRequest,
    id: u64,
    cancelled: Arc<AtomicBool>,
    finish: FinishGuard,
    predecessors: Vec<Finished>,
}

enum Lookup {
    Hit(Arc<PixelBuffer>),
    Pending(OutcomeReceiver),
}

impl BlurHashProcessor {
    /// Create a processor with the default [`BlurHashDecoder`] on the current
    /// Tokio runtime.
    ///
    /// # Errors
    ///
    /// [`ProcessError::NoRuntime`] outside a runtime,
    /// [`ProcessError::InvalidConfig`] for an out-of-range configuration.
    pub fn new(config: ProcessorConfig) -> ProcessResult<Self> {
        Self::with_decoder(config, Arc::new(BlurHashDecoder::new()))
    }

    /// Create a processor around a custom decoder on the current runtime.
    pub fn with_decoder(
        config: ProcessorConfig,
        decoder: Arc<dyn PixelDecoder>,
    ) -> ProcessResult<Self> {
        let runtime = Handle::try_current().map_err(|_| ProcessError::NoRuntime)?;
        Self::with_runtime(config, decoder, runtime)
    }

    /// Create a processor that schedules its work on `runtime`.
    pub fn with_runtime(
        config: ProcessorConfig,
        decoder: Arc<dyn PixelDecoder>,
        runtime: Handle,
    ) -> ProcessResult<Self> {
        let config = config.build()?;
        debug!(
            cache_size = config.cache_size,
            max_concurrent_jobs = config.max_concurrent_jobs,
            "creating BlurHash processor"
        );
        Ok(Self {
            inner: Arc::new(Inner {
                permits: Arc::new(Semaphore::new(config.max_concurrent_jobs)),
                state: Mutex::new(State {
                    cache: LruCache::new(config.cache_size),
                    in_flight: HashMap::new(),
                    draining: HashMap::new(),
                }),
                config,
                decoder,
                runtime,
                stats: ProcessorStats::default(),
                next_id: AtomicU64::new(0),
                shut_down: AtomicBool::new(false),
            }),
        })
    }

    /// Decode `request`, waiting at most the configured default timeout.
    ///
    /// Invalid input fails immediately without touching the cache, the
    /// statistics or the concurrency limit.
    pub async fn process(&self, request: &DecodeRequest) -> ProcessResult<Arc<PixelBuffer>> {
        match self.inner.config.default_timeout {
            Some(timeout) => self.process_with_timeout(request, timeout).await,
            None => self.process_inner(request).await,
        }
    }

    /// Decode `request`, giving up with [`ProcessError::Timeout`] after
    /// `timeout`. The underlying operation keeps running for any other
    /// waiters and cleans up after itself.
    pub async fn process_with_timeout(
        &self,
        request: &DecodeRequest,
        timeout: Duration,
    ) -> ProcessResult<Arc<PixelBuffer>> {
        match tokio::time::timeout(timeout, self.process_inner(request)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                self.inner.stats.record_timeout();
                warn!(key = %request.key(), ?timeout, "BlurHash decode timed out");
                Err(ProcessError::Timeout(timeout))
            }
        }
    }

    /// Run `request` in the background and hand the outcome to `on_result`
    /// exactly once.
    pub fn process_with_callback<F>(
        &self,
        request: DecodeRequest,
        on_result: F,
    ) -> tokio::task::JoinHandle<()>
    where
        F: FnOnce(BlurHashResult) + Send + 'static,
    {
        let processor = self.clone();
        self.inner.runtime.spawn(async move {
            let outcome = processor.process(&request).await;
            on_result(outcome.into());
        })
    }

    async fn process_inner(&self, request: &DecodeRequest) -> ProcessResult<Arc<PixelBuffer>> {
        if self.is_shut_down() {
            return Err(ProcessError::ShutDown);
        }
        self.inner.validate(request)?;

        match self.inner.lookup(request)? {
            Lookup::Hit(image) => Ok(image),
            Lookup::Pending(receiver) => in_flight::wait(receiver).await,
        }
    }

    /// Cancel the in-flight operation for `request`'s key. Returns whether
    /// one was pending.
    ///
    /// Every waiter receives [`ProcessError::Cancelled`] and the running
    /// decode is asked to stop, which frees its concurrency slot.
    pub fn cancel(&self, request: &DecodeRequest) -> bool {
        let key = request.key();
        let entry = {
            let mut state = self.inner.lock_state();
            let entry = state.in_flight.remove(&key);
            if let Some(entry) = &entry {
                state.cancel(key.clone(), entry);
            }
            entry
        };
        match entry {
            Some(entry) => {
                entry.abort();
                debug!(key = %key, "cancelled BlurHash decode");
                true
            }
            None => false,
        }
    }

    /// Cancel every in-flight operation. Returns how many were pending.
    pub fn cancel_all(&self) -> usize {
        let entries: Vec<InFlight> = {
            let mut state = self.inner.lock_state();
            let drained: Vec<_> = state.in_flight.drain().collect();
            drained
                .into_iter()
                .map(|(key, entry)| {
                    state.cancel(key, &entry);
                    entry
                })
                .collect()
        };
        let count = entries.len();
        entries.into_iter().for_each(InFlight::abort);
        if count > 0 {
            debug!(count, "cancelled all BlurHash decodes");
        }
        count
    }

    /// Evict every cached buffer, reset the counters and drop the decoder's
    /// memoized tables. In-flight work is left running.
    pub fn clear_cache(&self) {
        self.inner.lock_state().cache.clear();
        self.inner.stats.reset();
        self.inner.decoder.clear_cache();
    }

    pub fn stats(&self) -> StatsSnapshot {
        let state = self.inner.lock_state();
        self.inner.stats.snapshot(
            state.cache.len(),
            state.cache.capacity(),
            state.in_flight.len(),
        )
    }

    /// Whether a decoded buffer for `request` is cached. Does not affect
    /// recency or statistics.
    pub fn contains(&self, request: &DecodeRequest) -> bool {
        self.inner.lock_state().cache.contains(&request.key())
    }

    pub fn cached_len(&self) -> usize {
        self.inner.lock_state().cache.len()
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.inner.config
    }

    /// Stop accepting work, cancel everything in flight and clear the cache.
    /// Safe to call more than once.
    pub fn cleanup(&self) {
        if self.inner.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let cancelled = self.cancel_all();
        self.inner.permits.close();
        self.clear_cache();
        info!(cancelled, "BlurHash processor shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shut_down.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for BlurHashProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlurHashProcessor")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .field("shut_down", &self.is_shut_down())
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn validate(&self, request: &DecodeRequest) -> ProcessResult<()> {
        validate_hash(&request.hash)?;
        let max = self.config.max_dimension;
        if validate_dimensions(request.width, request.height, max).is_err() {
            return Err(ProcessError::InvalidDimensions {
                width: request.width,
                height: request.height,
                max,
            });
        }
        validate_punch(request.punch)?;
        Ok(())
    }

    /// Serve from the cache, attach to a pending decode, or start one.
    fn lookup(self: &Arc<Self>, request: &DecodeRequest) -> ProcessResult<Lookup> {
        let key = request.key();
        let mut state = self.lock_state();
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(ProcessError::ShutDown);
        }

        if let Some(image) = state.cache.get(&key) {
            self.stats.record_hit();
            debug!(key = %key, "BlurHash cache hit");
            return Ok(Lookup::Hit(Arc::clone(image)));
        }
        self.stats.record_miss();

        match state.in_flight.get(&key) {
            Some(entry) if !entry.is_abandoned() => {
                debug!(key = %key, "attaching to in-flight BlurHash decode");
                return Ok(Lookup::Pending(entry.subscribe()));
            }
            _ => {}
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = in_flight::channel();
        let (finish, finished) = in_flight::finish_signal();
        let cancelled = Arc::new(AtomicBool::new(false));
        let job = Job {
            key: key.clone(),
            request: request.clone(),
            id,
            cancelled: Arc::clone(&cancelled),
            finish,
            predecessors: state.predecessors(&key),
        };
        let task = self.runtime.spawn(Arc::clone(self).run(job, sender));
        debug!(key = %key, id, "starting BlurHash decode");
        let entry = InFlight::new(id, receiver.clone(), task, cancelled, finished);
        state.in_flight.insert(key, entry);
        Ok(Lookup::Pending(receiver))
    }

    async fn run(self: Arc<Self>, job: Job, sender: OutcomeSender) {
        let Job {
            key,
            request,
            id,
            cancelled,
            finish,
            predecessors,
        } = job;
        let completion = Completion {
            inner: &*self,
            key,
            id,
            sender: Some(sender),
        };
        let outcome = self.execute(request, cancelled, finish, predecessors).await;
        if let Err(err) = &outcome {
            if !matches!(err, ProcessError::ShutDown | ProcessError::Cancelled) {
                self.stats.record_error();
                warn!(key = %completion.key, error = %err, "BlurHash decode failed");
            }
        }
        completion.publish(outcome);
    }

    async fn execute(
        &self,
        request: DecodeRequest,
        cancelled: Arc<AtomicBool>,
        finish: FinishGuard,
        predecessors: Vec<Finished>,
    ) -> Outcome {
        // At most one decode per key: wait out cancelled ones still running.
        for previous in predecessors {
            in_flight::until_finished(previous).await;
        }
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| ProcessError::ShutDown)?;

        let decoder = Arc::clone(&self.decoder);
        let joined = self
            .runtime
            .spawn_blocking(move || {
                // Held until the decode returns, even if the awaiting task is aborted.
                let _held = (permit, finish);
                decoder.decode(
                    &request.hash,
                    request.width,
                    request.height,
                    request.punch,
                    &cancelled,
                )
            })
            .await;

        match joined {
            Ok(Ok(image)) => Ok(Arc::new(image)),
            Ok(Err(err)) => Err(err.into()),
            Err(err) if err.is_panic() => {
                let payload = err.into_panic();
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "decoder panicked".to_string());
                Err(ProcessError::Processing(message))
            }
            Err(err) => Err(ProcessError::Processing(err.to_string())),
        }
    }

    /// Store a successful outcome and retire the in-flight entry `id`.
    fn retire(&self, key: &CacheKey, id: u64, outcome: Option<&Outcome>) {
        let mut state = self.lock_state();
        if let Some(Ok(image)) = outcome {
            if !self.shut_down.load(Ordering::SeqCst) {
                let evicted = state.cache.insert(key.clone(), Arc::clone(image));
                self.stats.record_evictions(evicted);
            }
        }
        if state.in_flight.get(key).is_some_and(|entry| entry.id == id) {
            state.in_flight.remove(key);
        }
    }
}

/// Retires an in-flight entry on every exit path of its task. If the task is
/// dropped before publishing, the sender goes with it and waiters observe
/// cancellation.
struct Completion<'a> {
    inner: &'a Inner,
    key: CacheKey,
    id: u64,
    sender: Option<OutcomeSender>,
}

impl Completion<'_> {
    fn publish(mut self, outcome: Outcome) {
        self.inner.retire(&self.key, self.id, Some(&outcome));
        if let Some(sender) = self.sender.take() {
            sender.send_replace(Some(outcome));
        }
    }
}

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        if self.sender.is_some() {
            self.inner.retire(&self.key, self.id, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AVATAR_HASH: &str = "LGFFaXYk^6#M@-5c,1J5@[or[Q6.";

    fn processor(cache_size: usize) -> BlurHashProcessor {
        let config = ProcessorConfig::new().cache_size(cache_size);
        BlurHashProcessor::new(config).unwrap()
    }

    #[test]
    fn test_requires_runtime() {
        let err = BlurHashProcessor::new(ProcessorConfig::default()).unwrap_err();
        assert_eq!(err, ProcessError::NoRuntime);
    }

    #[tokio::test]
    async fn test_rejects_invalid_config() {
        let config = ProcessorConfig::new().max_concurrent_jobs(0);
        assert!(matches!(
            BlurHashProcessor::new(config),
            Err(ProcessError::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_cache_hit_semantics() {
        let processor = processor(10);
        let request = DecodeRequest::new(AVATAR_HASH, 20, 20);

        let first = processor.process(&request).await.unwrap();
        let stats = processor.stats();
        assert_eq!((stats.hit_count, stats.miss_count), (0, 1));

        let second = processor.process(&request).await.unwrap();
        let stats = processor.stats();
        assert_eq!((stats.hit_count, stats.miss_count), (1, 1));
        assert_eq!(first.as_bytes(), second.as_bytes());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(stats.size, 1);
        assert_eq!(stats.active_jobs, 0);
    }

    #[tokio::test]
    async fn test_validation_leaves_state_untouched() {
        let processor = processor(10);
        let cases = [
            DecodeRequest::new("", 10, 10),
            DecodeRequest::new("short", 10, 10),
            DecodeRequest::new(AVATAR_HASH, 0, 10),
            DecodeRequest::new(AVATAR_HASH, 10, 1001),
            DecodeRequest::new(AVATAR_HASH, 10, 10).with_punch(12.0),
        ];
        for request in &cases {
            let err = processor.process(request).await.unwrap_err();
            assert!(err.is_validation(), "{err}");
        }
        assert_eq!(processor.stats(), StatsSnapshot { max_size: 10, ..Default::default() });
    }

    #[tokio::test]
    async fn test_clear_cache_resets_counters() {
        let processor = processor(10);
        let request = DecodeRequest::new(AVATAR_HASH, 8, 8);
        processor.process(&request).await.unwrap();
        processor.process(&request).await.unwrap();
        assert!(processor.contains(&request));

        processor.clear_cache();
        let stats = processor.stats();
        assert_eq!(stats.size, 0);
        assert_eq!(stats.hit_count + stats.miss_count, 0);
        assert_eq!(stats.hit_rate(), 0.0);

        processor.process(&request).await.unwrap();
        assert_eq!(processor.stats().miss_count, 1);
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent_and_final() {
        let processor = processor(10);
        let request = DecodeRequest::new(AVATAR_HASH, 8, 8);
        processor.process(&request).await.unwrap();

        processor.cleanup();
        processor.cleanup();
        assert!(processor.is_shut_down());
        assert_eq!(processor.cached_len(), 0);
        assert_eq!(
            processor.process(&request).await.unwrap_err(),
            ProcessError::ShutDown
        );
    }

    #[tokio::test]
    async fn test_cancel_unknown_key() {
        let processor = processor(10);
        assert!(!processor.cancel(&DecodeRequest::new(AVATAR_HASH, 8, 8)));
        assert_eq!(processor.cancel_all(), 0);
    }
}
