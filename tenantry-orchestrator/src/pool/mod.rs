//! Backend connection pool
//!
//! Holds at most `capacity` open tenant handles plus one master handle.
//! Handles are constructed lazily and at most once per key at a time: every
//! caller asking for a key that is already being constructed waits on the
//! same construction and receives the same handle or the same error.
//!
//! Capacity is a semaphore. Each open or in-flight tenant handle owns one
//! permit; the master handle owns none and is never evicted. When no permit
//! is free, the least recently used open tenant handle is closed and its
//! permit handed to the newcomer.
//!
//! Recency is a pool-wide counter bumped on every insert and touch, so two
//! handles never share a position in the LRU order even when their
//! wall-clock timestamps are equal.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tenantry_core::{Error, Result};
use tokio::sync::{OwnedSemaphorePermit, Semaphore, watch};
use tracing::{debug, info, warn};

/// A resource the pool can own and close
#[async_trait]
pub trait PooledHandle: Send + Sync + 'static {
    /// Releases the underlying connection
    async fn close(&self) -> Result<()>;
}

/// Identity of a pooled handle
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PoolKey {
    /// The coordination backend
    Master,
    Tenant(String),
}

impl PoolKey {
    pub fn tenant(id: impl Into<String>) -> Self {
        Self::Tenant(id.into())
    }

    pub fn is_master(&self) -> bool {
        matches!(self, PoolKey::Master)
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolKey::Master => f.write_str("master"),
            PoolKey::Tenant(id) => f.write_str(id),
        }
    }
}

/// Point-in-time description of an open handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub key: PoolKey,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

type Settled<H> = Option<Result<Arc<H>>>;

struct Entry<H> {
    handle: Arc<H>,
    created_at: DateTime<Utc>,
    last_used_at: DateTime<Utc>,
    /// Position in the LRU order; larger is more recent
    last_used_seq: u64,
    /// Capacity slot, `None` for the master handle
    permit: Option<OwnedSemaphorePermit>,
}

struct State<H> {
    open: HashMap<PoolKey, Entry<H>>,
    pending: HashMap<PoolKey, watch::Receiver<Settled<H>>>,
    next_seq: u64,
}

impl<H> State<H> {
    fn bump(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn touch(&mut self, key: &PoolKey) -> Option<Arc<H>> {
        let seq = self.bump();
        let entry = self.open.get_mut(key)?;
        entry.last_used_seq = seq;
        entry.last_used_at = Utc::now();
        Some(Arc::clone(&entry.handle))
    }

    /// Removes the open tenant handle with the smallest recency mark
    fn take_lru_tenant(&mut self) -> Option<(PoolKey, Entry<H>)> {
        let key = self
            .open
            .iter()
            .filter(|(key, _)| !key.is_master())
            .min_by_key(|(_, entry)| entry.last_used_seq)
            .map(|(key, _)| key.clone())?;
        self.open.remove_entry(&key)
    }
}

struct Inner<H> {
    state: Mutex<State<H>>,
    permits: Arc<Semaphore>,
    capacity: usize,
    construct_timeout: Duration,
}

impl<H> Inner<H> {
    fn lock(&self) -> MutexGuard<'_, State<H>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// What a caller does after inspecting the pool under the lock
enum Step<H> {
    Wait(watch::Receiver<Settled<H>>),
    Lead {
        tx: watch::Sender<Settled<H>>,
        rx: watch::Receiver<Settled<H>>,
        permit: Option<OwnedSemaphorePermit>,
        victim: Option<(PoolKey, Entry<H>)>,
    },
    /// No free slot and nothing evictable; carries an in-flight tenant
    /// construction to wait on, if any
    Full(Option<watch::Receiver<Settled<H>>>),
}

/// Capacity-bounded, single-flight pool of backend handles
pub struct ConnectionPool<H: PooledHandle> {
    inner: Arc<Inner<H>>,
}

impl<H: PooledHandle> Clone for ConnectionPool<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: PooledHandle> ConnectionPool<H> {
    /// Creates an empty pool
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of open tenant handles (at least 1)
    /// * `construct_timeout` - Bound on a single handle construction
    pub fn new(capacity: usize, construct_timeout: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    open: HashMap::new(),
                    pending: HashMap::new(),
                    next_seq: 0,
                }),
                permits: Arc::new(Semaphore::new(capacity)),
                capacity,
                construct_timeout,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Returns the open handle for `key`, constructing it if needed
    ///
    /// A cache hit refreshes the handle's recency. If the key is being
    /// constructed, this waits for that construction. Otherwise `constructor`
    /// runs, bounded by the construction timeout, after evicting the least
    /// recently used tenant handle when the pool is full.
    ///
    /// Dropping the returned future never leaves the pool inconsistent: the
    /// construction itself runs on a background task.
    pub async fn acquire<F, Fut>(&self, key: PoolKey, constructor: F) -> Result<Arc<H>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<H>> + Send + 'static,
    {
        let mut held: Option<OwnedSemaphorePermit> = None;

        let step = loop {
            let step = {
                let mut state = self.inner.lock();
                if let Some(handle) = state.touch(&key) {
                    debug!("Pool hit for {}", key);
                    return Ok(handle);
                }
                match state.pending.get(&key) {
                    Some(rx) => Step::Wait(rx.clone()),
                    None => self.reserve(&mut state, &key, &mut held),
                }
            };

            let in_flight = match step {
                Step::Full(in_flight) => in_flight,
                step => break step,
            };

            // Every slot belongs to a construction in flight: wait for a
            // permit to free up or for one construction to settle, whichever
            // comes first, then look again.
            debug!("Pool full with constructions in flight, waiting for a slot for {}", key);
            let permits = Arc::clone(&self.inner.permits);
            match in_flight {
                Some(mut rx) => {
                    tokio::select! {
                        permit = permits.acquire_owned() => {
                            held = Some(permit.map_err(|_| pool_closed())?);
                        }
                        _ = async {
                            let _ = rx.wait_for(Option::is_some).await;
                        } => {}
                    }
                }
                None => {
                    held = Some(permits.acquire_owned().await.map_err(|_| pool_closed())?);
                }
            }
        };

        let rx = match step {
            Step::Lead {
                tx,
                rx,
                permit,
                victim,
            } => {
                let inner = Arc::clone(&self.inner);
                tokio::spawn(drive_construction(inner, key.clone(), victim, permit, constructor, tx));
                rx
            }
            Step::Wait(rx) => {
                debug!("Waiting for in-flight construction of {}", key);
                rx
            }
            Step::Full(_) => return Err(pool_closed()),
        };

        wait_settled(rx, &key).await
    }

    /// Claims a capacity slot and registers a pending construction
    fn reserve(
        &self,
        state: &mut State<H>,
        key: &PoolKey,
        held: &mut Option<OwnedSemaphorePermit>,
    ) -> Step<H> {
        let (permit, victim) = if key.is_master() {
            (None, None)
        } else if let Some(permit) = held.take() {
            (Some(permit), None)
        } else if let Ok(permit) = Arc::clone(&self.inner.permits).try_acquire_owned() {
            (Some(permit), None)
        } else if let Some((victim_key, mut victim)) = state.take_lru_tenant() {
            info!("Pool at capacity, evicting least recently used handle {}", victim_key);
            let permit = victim.permit.take();
            (permit, Some((victim_key, victim)))
        } else {
            let in_flight = state
                .pending
                .iter()
                .find(|(key, _)| !key.is_master())
                .map(|(_, rx)| rx.clone());
            return Step::Full(in_flight);
        };

        let (tx, rx) = watch::channel(None);
        state.pending.insert(key.clone(), rx.clone());
        Step::Lead {
            tx,
            rx,
            permit,
            victim,
        }
    }

    /// Refreshes the recency of an open handle
    ///
    /// # Returns
    /// `false` if no handle is open for `key`
    pub fn touch(&self, key: &PoolKey) -> bool {
        self.inner.lock().touch(key).is_some()
    }

    /// Closes the handle for `key`; closing a missing handle is a no-op
    pub async fn close(&self, key: &PoolKey) -> Result<()> {
        let entry = self.inner.lock().open.remove(key);
        match entry {
            Some(entry) => {
                info!("Closing pooled handle {}", key);
                // The permit is released only after the handle is closed
                entry.handle.close().await
            }
            None => Ok(()),
        }
    }

    /// Closes every open handle, master included
    ///
    /// All handles are closed even if some fail; the first failure is
    /// returned.
    pub async fn close_all(&self) -> Result<()> {
        let entries: Vec<(PoolKey, Entry<H>)> = self.inner.lock().open.drain().collect();
        if !entries.is_empty() {
            info!("Closing {} pooled handle(s)", entries.len());
        }

        let mut first_error = None;
        for (key, entry) in entries {
            if let Err(e) = entry.handle.close().await {
                warn!("Failed to close pooled handle {}: {}", key, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Number of open handles, master included
    pub fn open_count(&self) -> usize {
        self.inner.lock().open.len()
    }

    /// Number of open tenant handles
    pub fn tenant_count(&self) -> usize {
        self.inner
            .lock()
            .open
            .keys()
            .filter(|key| !key.is_master())
            .count()
    }

    pub fn contains(&self, key: &PoolKey) -> bool {
        self.inner.lock().open.contains_key(key)
    }

    pub fn is_pending(&self, key: &PoolKey) -> bool {
        self.inner.lock().pending.contains_key(key)
    }

    /// Open handles from least to most recently used
    pub fn entries(&self) -> Vec<EntryInfo> {
        let state = self.inner.lock();
        let mut entries: Vec<(&PoolKey, &Entry<H>)> = state.open.iter().collect();
        entries.sort_by_key(|(_, entry)| entry.last_used_seq);
        entries
            .into_iter()
            .map(|(key, entry)| EntryInfo {
                key: key.clone(),
                created_at: entry.created_at,
                last_used_at: entry.last_used_at,
            })
            .collect()
    }
}

/// Closes the eviction victim, runs the constructor and publishes the result
async fn drive_construction<H, F, Fut>(
    inner: Arc<Inner<H>>,
    key: PoolKey,
    victim: Option<(PoolKey, Entry<H>)>,
    permit: Option<OwnedSemaphorePermit>,
    constructor: F,
    tx: watch::Sender<Settled<H>>,
) where
    H: PooledHandle,
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<H>> + Send + 'static,
{
    if let Some((victim_key, victim)) = victim {
        if let Err(e) = victim.handle.close().await {
            warn!("Failed to close evicted handle {}: {}", victim_key, e);
        }
    }

    debug!("Constructing pooled handle {}", key);
    let mut task = tokio::spawn(constructor());

    let result = match tokio::time::timeout(inner.construct_timeout, &mut task).await {
        Ok(Ok(Ok(handle))) => Ok(Arc::new(handle)),
        Ok(Ok(Err(e))) => Err(e),
        Ok(Err(join_error)) => Err(Error::Backend(format!(
            "Construction of {} aborted: {}",
            key, join_error
        ))),
        Err(_) => {
            warn!(
                "Construction of {} exceeded {:?}, abandoning it",
                key, inner.construct_timeout
            );
            let late_key = key.clone();
            tokio::spawn(async move {
                if let Ok(Ok(handle)) = task.await {
                    debug!("Closing late handle {}", late_key);
                    if let Err(e) = handle.close().await {
                        warn!("Failed to close late handle {}: {}", late_key, e);
                    }
                }
            });
            Err(Error::ResourceTimeout {
                resource: format!("backend handle '{}'", key),
                timeout: inner.construct_timeout,
            })
        }
    };

    {
        let mut state = inner.lock();
        state.pending.remove(&key);
        if let Ok(handle) = &result {
            let seq = state.bump();
            let now = Utc::now();
            state.open.insert(
                key.clone(),
                Entry {
                    handle: Arc::clone(handle),
                    created_at: now,
                    last_used_at: now,
                    last_used_seq: seq,
                    permit,
                },
            );
            info!("Opened pooled handle {}", key);
        }
        // On failure the permit drops here, freeing the slot
    }

    let _ = tx.send(Some(result));
}

fn pool_closed() -> Error {
    Error::Backend("connection pool is shut down".to_string())
}

async fn wait_settled<H>(mut rx: watch::Receiver<Settled<H>>, key: &PoolKey) -> Result<Arc<H>> {
    let settled = rx
        .wait_for(Option::is_some)
        .await
        .map_err(|_| Error::Backend(format!("Construction of {} was abandoned", key)))?;

    match settled.as_ref() {
        Some(Ok(handle)) => Ok(Arc::clone(handle)),
        Some(Err(e)) => Err(e.clone()),
        None => Err(Error::Backend(format!("Construction of {} was abandoned", key))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Handle that tracks how many instances are live at once
    #[derive(Debug)]
    struct CountedHandle {
        name: String,
        closed: AtomicBool,
        live: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PooledHandle for CountedHandle {
        async fn close(&self) -> Result<()> {
            if !self.closed.swap(true, Ordering::SeqCst) {
                self.live.fetch_sub(1, Ordering::SeqCst);
            }
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct Tracker {
        constructed: Arc<AtomicUsize>,
        live: Arc<AtomicUsize>,
        max_live: Arc<AtomicUsize>,
    }

    impl Tracker {
        fn ctor(
            &self,
            name: &str,
            delay: Duration,
        ) -> impl FnOnce() -> std::pin::Pin<Box<dyn Future<Output = Result<CountedHandle>> + Send>>
        + Send
        + 'static {
            let tracker = self.clone();
            let name = name.to_string();
            move || {
                Box::pin(async move {
                    tracker.constructed.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(delay).await;
                    let live = tracker.live.fetch_add(1, Ordering::SeqCst) + 1;
                    tracker.max_live.fetch_max(live, Ordering::SeqCst);
                    Ok(CountedHandle {
                        name,
                        closed: AtomicBool::new(false),
                        live: Arc::clone(&tracker.live),
                    })
                })
            }
        }
    }

    fn pool(capacity: usize) -> ConnectionPool<CountedHandle> {
        ConnectionPool::new(capacity, Duration::from_secs(5))
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_acquires_construct_once() {
        let pool = pool(3);
        let tracker = Tracker::default();

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let pool = pool.clone();
            let ctor = tracker.ctor("tenantX", Duration::from_millis(50));
            tasks.push(tokio::spawn(async move {
                pool.acquire(PoolKey::tenant("tenantX"), ctor).await
            }));
        }

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap().unwrap());
        }

        assert_eq!(tracker.constructed.load(Ordering::SeqCst), 1);
        assert!(handles.iter().all(|h| Arc::ptr_eq(h, &handles[0])));
        assert_eq!(handles[0].name, "tenantX");
        assert!(!pool.is_pending(&PoolKey::tenant("tenantX")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failure_is_shared_and_leaves_no_trace() {
        let pool = pool(1);
        let calls = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let pool = pool.clone();
            let calls = Arc::clone(&calls);
            tasks.push(tokio::spawn(async move {
                pool.acquire(PoolKey::tenant("broken"), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    Err::<CountedHandle, _>(Error::Backend("invalid credentials".to_string()))
                })
                .await
            }));
        }

        let mut errors = Vec::new();
        for task in tasks {
            errors.push(task.await.unwrap().unwrap_err());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(errors.iter().all(|e| *e == errors[0]));
        assert_eq!(pool.open_count(), 0);
        assert!(!pool.is_pending(&PoolKey::tenant("broken")));

        // The slot was released: capacity 1 still admits a new handle
        let tracker = Tracker::default();
        let handle = pool
            .acquire(PoolKey::tenant("broken"), tracker.ctor("broken", Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(handle.name, "broken");
    }

    #[tokio::test]
    async fn test_timeout_leaves_pool_clean_and_closes_late_handle() {
        let pool: ConnectionPool<CountedHandle> =
            ConnectionPool::new(1, Duration::from_millis(20));
        let tracker = Tracker::default();

        let err = pool
            .acquire(
                PoolKey::tenant("slow"),
                tracker.ctor("slow", Duration::from_millis(150)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ResourceTimeout { .. }));
        assert_eq!(pool.open_count(), 0);
        assert!(!pool.is_pending(&PoolKey::tenant("slow")));

        // Capacity is free again
        let fast = pool
            .acquire(PoolKey::tenant("fast"), tracker.ctor("fast", Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(fast.name, "fast");

        // The abandoned construction finishes and is closed, not leaked
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(tracker.constructed.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.live.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_capacity_two_evicts_least_recently_used() {
        let pool = pool(2);
        let tracker = Tracker::default();

        let a = pool
            .acquire(PoolKey::tenant("A"), tracker.ctor("A", Duration::ZERO))
            .await
            .unwrap();
        pool.acquire(PoolKey::tenant("B"), tracker.ctor("B", Duration::ZERO))
            .await
            .unwrap();
        pool.acquire(PoolKey::tenant("C"), tracker.ctor("C", Duration::ZERO))
            .await
            .unwrap();

        assert!(!pool.contains(&PoolKey::tenant("A")));
        assert!(pool.contains(&PoolKey::tenant("B")));
        assert!(pool.contains(&PoolKey::tenant("C")));
        assert!(a.closed.load(Ordering::SeqCst));
        assert_eq!(tracker.max_live.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_touched_handle_is_not_next_victim() {
        let pool = pool(2);
        let tracker = Tracker::default();

        pool.acquire(PoolKey::tenant("A"), tracker.ctor("A", Duration::ZERO))
            .await
            .unwrap();
        let b = pool
            .acquire(PoolKey::tenant("B"), tracker.ctor("B", Duration::ZERO))
            .await
            .unwrap();

        assert!(pool.touch(&PoolKey::tenant("A")));
        pool.acquire(PoolKey::tenant("C"), tracker.ctor("C", Duration::ZERO))
            .await
            .unwrap();

        assert!(pool.contains(&PoolKey::tenant("A")));
        assert!(!pool.contains(&PoolKey::tenant("B")));
        assert!(b.closed.load(Ordering::SeqCst));

        let order: Vec<PoolKey> = pool.entries().into_iter().map(|e| e.key).collect();
        assert_eq!(order, vec![PoolKey::tenant("A"), PoolKey::tenant("C")]);
    }

    #[tokio::test]
    async fn test_cache_hit_counts_as_use() {
        let pool = pool(2);
        let tracker = Tracker::default();

        pool.acquire(PoolKey::tenant("A"), tracker.ctor("A", Duration::ZERO))
            .await
            .unwrap();
        pool.acquire(PoolKey::tenant("B"), tracker.ctor("B", Duration::ZERO))
            .await
            .unwrap();
        pool.acquire(PoolKey::tenant("A"), tracker.ctor("A", Duration::ZERO))
            .await
            .unwrap();
        pool.acquire(PoolKey::tenant("C"), tracker.ctor("C", Duration::ZERO))
            .await
            .unwrap();

        assert_eq!(tracker.constructed.load(Ordering::SeqCst), 3);
        assert!(pool.contains(&PoolKey::tenant("A")));
        assert!(!pool.contains(&PoolKey::tenant("B")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_never_more_than_capacity_live_under_contention() {
        let pool = pool(2);
        let tracker = Tracker::default();

        let mut tasks = Vec::new();
        for i in 0..12 {
            let pool = pool.clone();
            let name = format!("tenant{}", i % 5);
            let ctor = tracker.ctor(&name, Duration::from_millis(10));
            tasks.push(tokio::spawn(async move {
                pool.acquire(PoolKey::Tenant(name), ctor).await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert!(tracker.max_live.load(Ordering::SeqCst) <= 2);
        assert!(pool.tenant_count() <= 2);
    }

    #[tokio::test]
    async fn test_master_is_never_evicted() {
        let pool = pool(1);
        let tracker = Tracker::default();

        pool.acquire(PoolKey::Master, tracker.ctor("master", Duration::ZERO))
            .await
            .unwrap();
        pool.acquire(PoolKey::tenant("A"), tracker.ctor("A", Duration::ZERO))
            .await
            .unwrap();
        pool.acquire(PoolKey::tenant("B"), tracker.ctor("B", Duration::ZERO))
            .await
            .unwrap();

        assert!(pool.contains(&PoolKey::Master));
        assert!(!pool.contains(&PoolKey::tenant("A")));
        assert_eq!(pool.tenant_count(), 1);
        assert_eq!(pool.open_count(), 2);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_close_all_includes_master() {
        let pool = pool(2);
        let tracker = Tracker::default();

        let master = pool
            .acquire(PoolKey::Master, tracker.ctor("master", Duration::ZERO))
            .await
            .unwrap();
        pool.acquire(PoolKey::tenant("A"), tracker.ctor("A", Duration::ZERO))
            .await
            .unwrap();

        pool.close(&PoolKey::tenant("A")).await.unwrap();
        pool.close(&PoolKey::tenant("A")).await.unwrap();
        pool.close(&PoolKey::tenant("missing")).await.unwrap();
        assert!(!pool.touch(&PoolKey::tenant("A")));

        pool.close_all().await.unwrap();
        pool.close_all().await.unwrap();
        assert_eq!(pool.open_count(), 0);
        assert!(master.closed.load(Ordering::SeqCst));
        assert_eq!(tracker.live.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_leader_does_not_strand_waiters() {
        let pool = pool(1);
        let tracker = Tracker::default();

        let leader = {
            let pool = pool.clone();
            let ctor = tracker.ctor("A", Duration::from_millis(50));
            tokio::spawn(async move { pool.acquire(PoolKey::tenant("A"), ctor).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        leader.abort();

        let handle = pool
            .acquire(PoolKey::tenant("A"), tracker.ctor("A", Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(handle.name, "A");
        assert_eq!(tracker.constructed.load(Ordering::SeqCst), 1);
    }
}
