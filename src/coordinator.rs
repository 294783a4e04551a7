use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::logger::MessageLogger;
use crate::{Error, Result};

/// Immutable per-kind view of the gateway: device id to state record.
/// Replaced wholesale on each successful refresh, never patched in place,
/// so readers always see a self-consistent cross-field view.
pub type Snapshot<T> = HashMap<String, T>;

pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(30);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

type FetchFuture<T> = Pin<Box<dyn Future<Output = Result<Snapshot<T>>> + Send>>;
type FetchFn<T> = Box<dyn Fn() -> FetchFuture<T> + Send + Sync>;
type ListenerFn = Arc<dyn Fn() + Send + Sync>;

/// Proof of a subscription; pass it back to [`RefreshCoordinator::unsubscribe`].
#[derive(Debug)]
pub struct SubscriptionHandle {
    id: Uuid,
}

pub struct RefreshCoordinatorBuilder<T> {
    name: String,
    interval: Duration,
    fetch_timeout: Duration,
    logger: Option<Arc<Mutex<MessageLogger>>>,
    fetch: FetchFn<T>,
}

impl<T> RefreshCoordinatorBuilder<T>
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(name: impl Into<String>, fetch: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Snapshot<T>>> + Send + 'static,
    {
        Self {
            name: name.into(),
            interval: DEFAULT_SCAN_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            logger: None,
            fetch: Box::new(move || Box::pin(fetch()) as FetchFuture<T>),
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn message_log(mut self, logger: Arc<Mutex<MessageLogger>>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn build(self) -> RefreshCoordinator<T> {
        RefreshCoordinator {
            inner: Arc::new(Inner {
                name: self.name,
                interval: self.interval,
                fetch_timeout: self.fetch_timeout,
                logger: self.logger,
                fetch: self.fetch,
                state: Mutex::new(RefreshState {
                    snapshot: Arc::new(Snapshot::new()),
                    in_flight: None,
                    listeners: Vec::new(),
                    last_error: None,
                    last_refresh_at: None,
                    poll_running: false,
                }),
            }),
        }
    }
}

/// Shared, periodically refreshed device-state cache for one device kind.
///
/// All refresh requests are coalesced into a single in-flight fetch; the
/// periodic poll only runs while at least one subscriber is registered, and
/// a failed fetch keeps the previous snapshot readable (stale data beats no
/// data). Cloning yields another handle to the same cache.
pub struct RefreshCoordinator<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for RefreshCoordinator<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<T> {
    name: String,
    interval: Duration,
    fetch_timeout: Duration,
    logger: Option<Arc<Mutex<MessageLogger>>>,
    fetch: FetchFn<T>,
    state: Mutex<RefreshState<T>>,
}

struct RefreshState<T> {
    snapshot: Arc<Snapshot<T>>,
    in_flight: Option<InFlight>,
    listeners: Vec<(Uuid, ListenerFn)>,
    last_error: Option<Error>,
    last_refresh_at: Option<Instant>,
    poll_running: bool,
}

struct InFlight {
    started_at: Instant,
    tx: broadcast::Sender<Result<()>>,
}

impl<T> Inner<T> {
    fn lock_state(&self) -> MutexGuard<'_, RefreshState<T>> {
        self.state.lock().expect("coordinator state poisoned")
    }
}

impl<T> RefreshCoordinator<T>
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    pub fn builder<F, Fut>(name: impl Into<String>, fetch: F) -> RefreshCoordinatorBuilder<T>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Snapshot<T>>> + Send + 'static,
    {
        RefreshCoordinatorBuilder::new(name, fetch)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Current cached snapshot, without blocking. Empty until the first
    /// successful refresh.
    pub fn read(&self) -> Arc<Snapshot<T>> {
        Arc::clone(&self.inner.lock_state().snapshot)
    }

    /// Error of the most recent failed fetch; cleared by the next success.
    pub fn last_error(&self) -> Option<Error> {
        self.inner.lock_state().last_error.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.lock_state().listeners.len()
    }

    /// Register a callback invoked once per successful refresh. The first
    /// subscriber starts the periodic poll.
    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> SubscriptionHandle {
        let handle = SubscriptionHandle { id: Uuid::new_v4() };
        let mut state = self.inner.lock_state();
        state.listeners.push((handle.id, Arc::new(callback)));
        if !state.poll_running {
            state.poll_running = true;
            debug!(coordinator = %self.inner.name, "starting periodic refresh");
            tokio::spawn(poll_loop(Arc::downgrade(&self.inner)));
        }
        handle
    }

    /// Remove a subscription. Does not cancel an in-flight fetch; the fetch
    /// still completes and updates the cache, but the removed handle is no
    /// longer notified. When the last subscriber leaves, periodic polling
    /// stops (the retained snapshot stays readable).
    pub fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut state = self.inner.lock_state();
        state.listeners.retain(|(id, _)| *id != handle.id);
        if state.listeners.is_empty() {
            debug!(coordinator = %self.inner.name, "last subscriber gone, periodic refresh will stop");
        }
    }

    /// Fetch now and wait for the result. If a fetch is already in flight,
    /// join it instead of starting a second one.
    pub async fn request_refresh(&self) -> Result<()> {
        let (rx, _) = join_or_start(&self.inner);
        await_outcome(rx).await
    }

    /// Like [`request_refresh`](Self::request_refresh), but only accepts a
    /// fetch that started at or after `not_before`. Joining an older
    /// in-flight fetch would let a post-command resync observe pre-command
    /// state, so such a fetch is awaited and a fresh one issued.
    pub(crate) async fn refresh_completed_after(&self, not_before: Instant) -> Result<()> {
        loop {
            let (rx, started_at) = join_or_start(&self.inner);
            let outcome = await_outcome(rx).await;
            if started_at >= not_before {
                return outcome;
            }
        }
    }

    pub(crate) fn log_command(&self, action: &str, device_id: &str, body: &Value) {
        if let Some(logger) = &self.inner.logger {
            logger
                .lock()
                .expect("message logger poisoned")
                .log_command(action, device_id, body);
        }
    }
}

/// Join the in-flight fetch or become the one that starts it. The fetch
/// itself runs on a spawned task so neither caller cancellation nor
/// unsubscription can abandon it mid-flight.
fn join_or_start<T>(inner: &Arc<Inner<T>>) -> (broadcast::Receiver<Result<()>>, Instant)
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    let mut state = inner.lock_state();
    if let Some(in_flight) = &state.in_flight {
        return (in_flight.tx.subscribe(), in_flight.started_at);
    }
    let (tx, rx) = broadcast::channel(1);
    let started_at = Instant::now();
    state.in_flight = Some(InFlight { started_at, tx });
    drop(state);
    let task_inner = Arc::clone(inner);
    tokio::spawn(run_fetch(task_inner));
    (rx, started_at)
}

async fn await_outcome(mut rx: broadcast::Receiver<Result<()>>) -> Result<()> {
    match rx.recv().await {
        Ok(outcome) => outcome,
        Err(_) => Err(Error::Connection("refresh task abandoned".to_string())),
    }
}

async fn run_fetch<T>(inner: Arc<Inner<T>>)
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    let fetched = match tokio::time::timeout(inner.fetch_timeout, (inner.fetch)()).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout),
    };

    let (outcome, listeners, tx, body) = {
        let mut state = inner.lock_state();
        let tx = state.in_flight.take().map(|f| f.tx);
        state.last_refresh_at = Some(Instant::now());
        match fetched {
            Ok(snapshot) => {
                debug!(coordinator = %inner.name, devices = snapshot.len(), "refresh succeeded");
                let body = inner
                    .logger
                    .is_some()
                    .then(|| serde_json::to_value(&snapshot).unwrap_or(Value::Null));
                state.snapshot = Arc::new(snapshot);
                state.last_error = None;
                let listeners: Vec<ListenerFn> = state
                    .listeners
                    .iter()
                    .map(|(_, callback)| Arc::clone(callback))
                    .collect();
                (Ok(()), listeners, tx, body)
            }
            Err(e) => {
                warn!(coordinator = %inner.name, error = %e, "refresh failed, keeping stale snapshot");
                state.last_error = Some(e.clone());
                (Err(e), Vec::new(), tx, None)
            }
        }
    };

    if let Some(logger) = &inner.logger {
        let mut logger = logger.lock().expect("message logger poisoned");
        match (&outcome, &body) {
            (Ok(()), Some(body)) => logger.log_refresh(&inner.name, body),
            (Err(e), _) => logger.log_refresh_error(&inner.name, &e.to_string()),
            _ => {}
        }
    }

    if let Some(tx) = tx {
        let _ = tx.send(outcome);
    }
    // Exactly once per refresh, not once per waiter.
    for listener in listeners {
        listener();
    }
}

/// Periodic refresh driver, spawned by the first subscription. Holds only a
/// weak reference so a dropped coordinator tears it down; exits on its own
/// once the last subscriber is gone.
async fn poll_loop<T>(weak: Weak<Inner<T>>)
where
    T: Serialize + Clone + Send + Sync + 'static,
{
    loop {
        let deadline = {
            let Some(inner) = weak.upgrade() else { return };
            let state = inner.lock_state();
            state.last_refresh_at.unwrap_or_else(Instant::now) + inner.interval
        };
        tokio::time::sleep_until(deadline).await;

        let Some(inner) = weak.upgrade() else { return };
        {
            let mut state = inner.lock_state();
            if state.listeners.is_empty() {
                debug!(coordinator = %inner.name, "no subscribers, stopping periodic refresh");
                state.poll_running = false;
                return;
            }
            // A manual refresh during the sleep resets the phase of the
            // next tick; skip this one instead of refreshing back-to-back.
            let recently_refreshed = state
                .last_refresh_at
                .is_some_and(|at| at + inner.interval > Instant::now());
            if recently_refreshed {
                continue;
            }
        }
        let (rx, _) = join_or_start(&inner);
        if let Err(e) = await_outcome(rx).await {
            debug!(coordinator = %inner.name, error = %e, "periodic refresh failed");
        }
    }
}
