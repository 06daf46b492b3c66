use std::collections::{HashMap, VecDeque};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::assets::pool::{PixelBuffer, PoolImage};
use crate::foundation::core::ImageId;
use crate::foundation::error::{RecolorError, TrailError, TrailResult};
use crate::recolor::transform::{TransformParams, transform_image};

/// Unit of background work.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Where pixel jobs run. The cache never runs a job inline on the caller's stack.
pub trait RecolorExecutor: Send + Sync {
    /// Schedule `job` to run later, possibly on another thread.
    fn spawn(&self, job: Job);
}

/// Runs jobs on a dedicated rayon thread pool.
pub struct RayonExecutor {
    pool: rayon::ThreadPool,
}

impl RayonExecutor {
    /// Build a pool; `threads = None` uses rayon defaults.
    pub fn new(threads: Option<usize>) -> TrailResult<Self> {
        if let Some(n) = threads
            && n == 0
        {
            return Err(TrailError::validation(
                "recolor 'threads' must be >= 1 when set",
            ));
        }
        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("recolor-{i}"));
        if let Some(n) = threads {
            builder = builder.num_threads(n);
        }
        let pool = builder.build().map_err(|e| {
            TrailError::Other(anyhow::anyhow!("failed to build recolor thread pool: {e}"))
        })?;
        Ok(Self { pool })
    }
}

impl RecolorExecutor for RayonExecutor {
    fn spawn(&self, job: Job) {
        self.pool.spawn(job);
    }
}

/// Queues jobs until [`DeferredExecutor::run_pending`] is called.
///
/// Used where no worker threads are wanted (single-threaded hosts, tests): work still happens
/// outside the frame callback, at a point the host chooses.
#[derive(Default)]
pub struct DeferredExecutor {
    queue: Mutex<VecDeque<Job>>,
}

impl DeferredExecutor {
    /// Empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued jobs.
    pub fn pending(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Run queued jobs in FIFO order, including any queued while draining. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while self.run_one() {
            ran += 1;
        }
        ran
    }

    /// Run the oldest queued job, if any.
    pub fn run_one(&self) -> bool {
        let job = lock(&self.queue).pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }
}

impl RecolorExecutor for DeferredExecutor {
    fn spawn(&self, job: Job) {
        lock(&self.queue).push_back(job);
    }
}

/// Cache key: one image under one parameter set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RecolorKey {
    /// Pool image.
    pub image: ImageId,
    /// Transform parameters.
    pub params: TransformParams,
}

/// A finished duotone rendition, immutable once published.
#[derive(Clone, Debug)]
pub struct RecoloredVisual {
    /// Pool image the visual was derived from.
    pub source: ImageId,
    /// Digest of the parameters used.
    pub params_hash: u64,
    /// Displayable recolored pixels.
    pub image: Arc<PixelBuffer>,
}

/// Result shared by every requester of one key.
pub type RecolorOutcome = Result<Arc<RecoloredVisual>, RecolorError>;

#[derive(Default)]
struct Entry {
    outcome: Mutex<Option<RecolorOutcome>>,
    ready: Condvar,
}

impl Entry {
    fn publish(&self, outcome: RecolorOutcome) {
        let mut slot = lock(&self.outcome);
        // First writer wins.
        if slot.is_none() {
            *slot = Some(outcome);
            self.ready.notify_all();
        }
    }
}

// Publishes `Abandoned` if a job is dropped without running to completion.
struct Completion {
    entry: Arc<Entry>,
}

impl Drop for Completion {
    fn drop(&mut self) {
        self.entry.publish(Err(RecolorError::Abandoned));
    }
}

/// Handle to a (possibly still running) recolor computation.
///
/// Cheap to clone; all tickets for one key observe the same outcome.
#[derive(Clone)]
pub struct RecolorTicket {
    key: RecolorKey,
    entry: Arc<Entry>,
}

impl std::fmt::Debug for RecolorTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecolorTicket")
            .field("key", &self.key)
            .field("ready", &self.is_ready())
            .finish()
    }
}

impl RecolorTicket {
    /// Key this ticket resolves.
    pub fn key(&self) -> RecolorKey {
        self.key
    }

    /// Whether the outcome has been published.
    pub fn is_ready(&self) -> bool {
        lock(&self.entry.outcome).is_some()
    }

    /// Non-blocking poll.
    pub fn try_get(&self) -> Option<RecolorOutcome> {
        lock(&self.entry.outcome).clone()
    }

    /// Block until the outcome is published.
    pub fn wait(&self) -> RecolorOutcome {
        let mut guard = lock(&self.entry.outcome);
        loop {
            if let Some(outcome) = guard.as_ref() {
                return outcome.clone();
            }
            guard = self
                .entry
                .ready
                .wait(guard)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Block for at most `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<RecolorOutcome> {
        let guard = lock(&self.entry.outcome);
        let (guard, _) = self
            .entry
            .ready
            .wait_timeout_while(guard, timeout, |o| o.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        guard.clone()
    }

    /// `true` when both tickets wait on the same underlying computation.
    pub fn shares_computation_with(&self, other: &RecolorTicket) -> bool {
        Arc::ptr_eq(&self.entry, &other.entry)
    }
}

/// Lazily computes and memoizes duotone renditions per `(image, params)`.
///
/// At most one computation ever runs per key; later requests join it. Results, including failures,
/// stay cached for the lifetime of the cache and are never retried.
pub struct RecolorCache {
    executor: Arc<dyn RecolorExecutor>,
    entries: Mutex<HashMap<RecolorKey, Arc<Entry>>>,
    computations: AtomicU64,
}

impl RecolorCache {
    /// Cache scheduling its work on `executor`.
    pub fn new(executor: Arc<dyn RecolorExecutor>) -> Self {
        Self {
            executor,
            entries: Mutex::new(HashMap::new()),
            computations: AtomicU64::new(0),
        }
    }

    /// Request the rendition of `image` under `params`. Never blocks on pixel work.
    #[tracing::instrument(skip(self, image, params), fields(image = %image.id()))]
    pub fn request(&self, image: &Arc<PoolImage>, params: &TransformParams) -> RecolorTicket {
        let key = RecolorKey {
            image: image.id(),
            params: *params,
        };

        let entry = {
            let mut entries = lock(&self.entries);
            if let Some(existing) = entries.get(&key) {
                return RecolorTicket {
                    key,
                    entry: Arc::clone(existing),
                };
            }
            let entry = Arc::new(Entry::default());
            entries.insert(key, Arc::clone(&entry));
            entry
        };

        let Some(pixels) = image.pixels().cloned() else {
            let reason = image.load_error().unwrap_or("image unavailable").to_owned();
            entry.publish(Err(RecolorError::ResourceLoad {
                image: key.image,
                reason,
            }));
            return RecolorTicket { key, entry };
        };

        self.computations.fetch_add(1, Ordering::Relaxed);
        let params = *params;
        let completion = Completion {
            entry: Arc::clone(&entry),
        };
        self.executor.spawn(Box::new(move || {
            let outcome = run_transform(key.image, &pixels, &params);
            completion.entry.publish(outcome);
            drop(completion);
        }));

        RecolorTicket { key, entry }
    }

    /// Ticket for `key` if it was requested before; never starts work.
    pub fn lookup(&self, key: &RecolorKey) -> Option<RecolorTicket> {
        lock(&self.entries).get(key).map(|entry| RecolorTicket {
            key: *key,
            entry: Arc::clone(entry),
        })
    }

    /// Number of pixel computations started so far.
    pub fn computations(&self) -> u64 {
        self.computations.load(Ordering::Relaxed)
    }

    /// Number of cached keys (pending, resolved or failed).
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// `true` before the first request.
    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }
}

fn run_transform(image: ImageId, pixels: &PixelBuffer, params: &TransformParams) -> RecolorOutcome {
    let result = catch_unwind(AssertUnwindSafe(|| transform_image(pixels, params)));
    match result {
        Ok(Ok(out)) => {
            tracing::debug!(%image, params_hash = params.params_hash(), "recolor finished");
            Ok(Arc::new(RecoloredVisual {
                source: image,
                params_hash: params.params_hash(),
                image: Arc::new(out),
            }))
        }
        Ok(Err(e)) => Err(RecolorError::Transform {
            image,
            reason: e.to_string(),
        }),
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| (*s).to_owned())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "pixel job panicked".to_owned());
            Err(RecolorError::Transform { image, reason })
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[path = "../../tests/unit/recolor/cache.rs"]
mod tests;
