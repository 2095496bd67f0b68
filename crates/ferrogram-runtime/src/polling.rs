//! Long-polling update source.
//!
//! [`Polling`] drives the fetch/dispatch loop against `getUpdates`:
//!
//! ```text
//! Stopped ──start──▶ Starting ──identity──▶ Running ◀──────────┐
//!    ▲                   │                    │  fetch failed   │ delay elapsed
//!    │                   └── identity failed  ▼                 │
//!    └──── stop / retry ceiling reached ◀── Backoff ────────────┘
//! ```
//!
//! Every successful batch moves the offset watermark to `max(update_id) + 1`
//! before any record of the batch is dispatched. Records are dispatched on
//! their own tasks, so a slow or failing handler never holds up the loop or
//! its siblings. Whatever ends the loop, the state ends up `Stopped`.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, Ordering};

use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{OnceCell, Semaphore, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::{PollingConfig, RetryLimit};
use crate::error::PollingError;
use ferrogram_core::{ApiError, ApiExt, ApiResult, GetUpdatesParams, UPDATE_ID, UpdateKind, User};
use ferrogram_framework::Dispatcher;

/// Lifecycle state of a [`Polling`] loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum PollerState {
    #[default]
    Stopped,
    /// Fetching the bot identity.
    Starting,
    /// Fetching and dispatching batches.
    Running,
    /// Waiting out the retry delay after a failed fetch.
    Backoff,
}

impl PollerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Backoff => "backoff",
        }
    }
}

impl fmt::Display for PollerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-`start` overrides of the configured polling settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollingOptions {
    /// Seeds the watermark once at start.
    pub offset: Option<i64>,
    /// Long-poll timeout in seconds.
    pub timeout: Option<u64>,
    /// Kinds the server should deliver.
    pub allowed_updates: Option<Vec<UpdateKind>>,
}

impl PollingOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn timeout(mut self, secs: u64) -> Self {
        self.timeout = Some(secs);
        self
    }

    pub fn allowed_updates(mut self, kinds: impl IntoIterator<Item = UpdateKind>) -> Self {
        self.allowed_updates = Some(kinds.into_iter().collect());
        self
    }
}

/// The long-polling loop of one bot.
pub struct Polling {
    dispatcher: Arc<Dispatcher>,
    config: PollingConfig,
    state: watch::Sender<PollerState>,
    offset: AtomicI64,
    retries: AtomicU32,
    gave_up: AtomicBool,
    identity: OnceCell<User>,
    cancel: Mutex<CancellationToken>,
    task: Mutex<Option<JoinHandle<()>>>,
    in_flight: Option<Arc<Semaphore>>,
}

impl Polling {
    /// Creates a stopped poller feeding `dispatcher`.
    pub fn new(dispatcher: Arc<Dispatcher>, config: PollingConfig) -> Self {
        let in_flight = config
            .max_in_flight
            .map(|permits| Arc::new(Semaphore::new(permits.get())));
        let (state, _) = watch::channel(PollerState::Stopped);

        Self {
            dispatcher,
            config,
            state,
            offset: AtomicI64::new(0),
            retries: AtomicU32::new(0),
            gave_up: AtomicBool::new(false),
            identity: OnceCell::new(),
            cancel: Mutex::new(CancellationToken::new()),
            task: Mutex::new(None),
            in_flight,
        }
    }

    /// Starts polling.
    ///
    /// Fails if polling is not stopped, if the transport has no token, or if
    /// the identity fetch fails. The identity is fetched only once per
    /// `Polling` value. Returns as soon as the loop is spawned.
    pub async fn start(self: &Arc<Self>, options: PollingOptions) -> Result<(), PollingError> {
        if self.is_running() {
            return Err(PollingError::AlreadyRunning);
        }
        if !self.dispatcher.transport().has_token() {
            return Err(PollingError::MissingToken);
        }

        let claimed = self.state.send_if_modified(|state| {
            let stopped = *state == PollerState::Stopped;
            if stopped {
                *state = PollerState::Starting;
            }
            stopped
        });
        if !claimed {
            return Err(PollingError::AlreadyRunning);
        }

        // A loop stopped a moment ago may still be winding down.
        let previous = self.task.lock().take();
        if let Some(previous) = previous {
            previous.await.ok();
        }

        let me = match self.fetch_identity().await {
            Ok(me) => me,
            Err(err) => {
                error!(error = %err, "Unable to fetch bot identity, polling not started");
                self.state.send_replace(PollerState::Stopped);
                return Err(PollingError::Identity(err));
            }
        };

        if let Some(offset) = options.offset {
            self.offset.store(offset, Ordering::SeqCst);
        }
        self.retries.store(0, Ordering::SeqCst);
        self.gave_up.store(false, Ordering::SeqCst);

        let cancel = CancellationToken::new();
        *self.cancel.lock() = cancel.clone();

        if !self.transition(PollerState::Starting, PollerState::Running) {
            debug!("Polling stopped during startup");
            return Ok(());
        }

        info!(
            bot_id = me.id,
            username = me.username.as_deref().unwrap_or_default(),
            offset = self.offset(),
            "Polling started"
        );

        let task = tokio::spawn(Arc::clone(self).run(options, cancel));
        *self.task.lock() = Some(task);
        Ok(())
    }

    /// Stops polling.
    ///
    /// A pending retry delay is cancelled; a fetch already in flight is not,
    /// and its records are still dispatched. A following [`start`](Self::start)
    /// waits for that fetch, so no batch is requested twice.
    pub fn stop(&self) {
        self.retries.store(0, Ordering::SeqCst);
        self.cancel.lock().cancel();
        let previous = self.state.send_replace(PollerState::Stopped);
        if previous != PollerState::Stopped {
            info!("Polling stopped");
        }
    }

    /// Returns whether the loop is starting, running or backing off.
    pub fn is_running(&self) -> bool {
        *self.state.borrow() != PollerState::Stopped
    }

    pub fn state(&self) -> PollerState {
        *self.state.borrow()
    }

    /// Subscribes to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<PollerState> {
        self.state.subscribe()
    }

    /// Returns the offset watermark: the next `update_id` to request.
    pub fn offset(&self) -> i64 {
        self.offset.load(Ordering::SeqCst)
    }

    /// Returns the number of consecutive failed fetches being retried.
    pub fn retries(&self) -> u32 {
        self.retries.load(Ordering::SeqCst)
    }

    /// Returns `true` once the loop has stopped itself after failed fetches.
    ///
    /// Cleared by the next [`start`](Self::start).
    pub fn gave_up(&self) -> bool {
        self.gave_up.load(Ordering::SeqCst)
    }

    /// Returns the bot identity, once fetched.
    pub fn identity(&self) -> Option<&User> {
        self.identity.get()
    }

    pub fn config(&self) -> &PollingConfig {
        &self.config
    }

    async fn fetch_identity(&self) -> ApiResult<&User> {
        self.identity
            .get_or_try_init(|| async {
                debug!("Fetching bot identity");
                self.dispatcher.transport().get_me().await
            })
            .await
    }

    async fn run(self: Arc<Self>, options: PollingOptions, cancel: CancellationToken) {
        let _exit = LoopExit {
            polling: &*self,
            cancel: &cancel,
        };

        while !cancel.is_cancelled() {
            match self.fetch_batch(&options).await {
                Ok(records) => {
                    self.retries.store(0, Ordering::SeqCst);
                    for record in records {
                        self.spawn_dispatch(record).await;
                    }
                }
                Err(err) => {
                    if cancel.is_cancelled() || !self.backoff(&err, &cancel).await {
                        break;
                    }
                }
            }
        }
    }

    /// Issues one `getUpdates` call and advances the watermark past it.
    ///
    /// Returns the records to dispatch.
    async fn fetch_batch(&self, options: &PollingOptions) -> ApiResult<Vec<Value>> {
        let offset = self.offset();
        let params = GetUpdatesParams {
            offset: (offset != 0).then_some(offset),
            limit: None,
            timeout: Some(options.timeout.unwrap_or(self.config.timeout_secs)),
            allowed_updates: options.allowed_updates.clone().or_else(|| {
                (!self.config.allowed_updates.is_empty())
                    .then(|| self.config.allowed_updates.clone())
            }),
        };

        trace!(offset, "Fetching updates");
        let records = self.dispatcher.transport().get_updates(&params).await?;
        if records.is_empty() {
            return Ok(records);
        }

        let mut next = None;
        let mut batch = Vec::with_capacity(records.len());
        for record in records {
            if let Some(update_id) = record.get(UPDATE_ID).and_then(Value::as_i64) {
                match update_id.checked_add(1) {
                    Some(after) => next = next.max(Some(after)),
                    None => {
                        warn!(update_id, "Skipping update whose id leaves no room for an offset");
                        continue;
                    }
                }
            }
            batch.push(record);
        }
        if let Some(next) = next {
            self.offset.fetch_max(next, Ordering::SeqCst);
        }

        debug!(count = batch.len(), offset = self.offset(), "Fetched updates");
        Ok(batch)
    }

    async fn spawn_dispatch(&self, record: Value) {
        let permit = match &self.in_flight {
            Some(semaphore) => Arc::clone(semaphore).acquire_owned().await.ok(),
            None => None,
        };
        let dispatcher = Arc::clone(&self.dispatcher);

        tokio::spawn(async move {
            let _permit = permit;
            let update_id = record.get(UPDATE_ID).and_then(Value::as_i64);
            let dispatch = AssertUnwindSafe(dispatcher.handle_update(record));
            if dispatch.catch_unwind().await.is_err() {
                error!(?update_id, "Dispatch panicked");
            }
        });
    }

    /// Applies the retry policy after a failed fetch.
    ///
    /// Returns `false` when the loop must exit.
    async fn backoff(&self, err: &ApiError, cancel: &CancellationToken) -> bool {
        match self.config.retry_limit {
            RetryLimit::Unlimited => {
                warn!(error = %err, "Fetching updates failed, trying to reconnect");
            }
            RetryLimit::Limited(0) => {
                error!(error = %err, "Fetching updates failed, retry limit is 0, not trying to reconnect");
                self.give_up();
                return false;
            }
            RetryLimit::Limited(limit) => {
                let retries = self.retries();
                if retries >= limit {
                    error!(
                        error = %err,
                        retries,
                        "Tried to reconnect {retries} times without success, polling stopped"
                    );
                    self.give_up();
                    return false;
                }
                let attempt = retries + 1;
                self.retries.store(attempt, Ordering::SeqCst);
                warn!(error = %err, retries = attempt, limit, "Fetching updates failed, trying to reconnect");
            }
        }

        if !self.transition(PollerState::Running, PollerState::Backoff) {
            return false;
        }

        tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = tokio::time::sleep(self.config.retry_wait()) => {}
        }

        self.transition(PollerState::Backoff, PollerState::Running)
    }

    fn give_up(&self) {
        self.gave_up.store(true, Ordering::SeqCst);
        self.halt();
    }

    fn halt(&self) {
        self.state.send_if_modified(|state| {
            let running = *state != PollerState::Stopped;
            *state = PollerState::Stopped;
            running
        });
    }

    /// Moves `from` to `to`. Fails if the state changed underneath.
    fn transition(&self, from: PollerState, to: PollerState) -> bool {
        self.state.send_if_modified(|state| {
            let matches = *state == from;
            if matches {
                *state = to;
            }
            matches
        })
    }
}

/// Marks polling stopped when its loop ends without being asked to.
struct LoopExit<'a> {
    polling: &'a Polling,
    cancel: &'a CancellationToken,
}

impl Drop for LoopExit<'_> {
    fn drop(&mut self) {
        if self.cancel.is_cancelled() {
            trace!("Polling loop exited");
            return;
        }
        self.cancel.cancel();
        if !self.polling.gave_up() {
            error!("Polling loop ended unexpectedly, polling stopped");
        }
        self.polling.halt();
    }
}

impl fmt::Debug for Polling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Polling")
            .field("state", &self.state())
            .field("offset", &self.offset())
            .field("retries", &self.retries())
            .field("retry_limit", &self.config.retry_limit)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ferrogram_core::Transport;
    use ferrogram_framework::handler;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;
    use tokio::sync::mpsc;

    #[derive(Clone)]
    enum Step {
        Batch(Value),
        Delayed(Duration, Value),
        Fail,
        Panic,
    }

    /// Answers `getUpdates` from a script; hangs once the script runs out
    /// unless `exhausted` is set.
    struct ScriptedTransport {
        steps: Mutex<VecDeque<Step>>,
        exhausted: Option<Step>,
        calls: Arc<AtomicUsize>,
        me_calls: Arc<AtomicUsize>,
        offsets: Arc<Mutex<Vec<Option<i64>>>>,
        has_token: bool,
        identity_fails: bool,
    }

    impl ScriptedTransport {
        fn new(steps: impl IntoIterator<Item = Step>) -> Self {
            Self {
                steps: Mutex::new(steps.into_iter().collect()),
                exhausted: None,
                calls: Arc::new(AtomicUsize::new(0)),
                me_calls: Arc::new(AtomicUsize::new(0)),
                offsets: Arc::new(Mutex::new(Vec::new())),
                has_token: true,
                identity_fails: false,
            }
        }

        fn always_failing() -> Self {
            Self {
                exhausted: Some(Step::Fail),
                ..Self::new([])
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn call(&self, method: &str, params: Value) -> ApiResult<Value> {
            match method {
                "getMe" => {
                    self.me_calls.fetch_add(1, Ordering::SeqCst);
                    if self.identity_fails {
                        Err(ApiError::transport("network unreachable"))
                    } else {
                        Ok(json!({ "id": 1, "is_bot": true, "first_name": "ferro" }))
                    }
                }
                "getUpdates" => {
                    self.calls.fetch_add(1, Ordering::SeqCst);
                    self.offsets
                        .lock()
                        .push(params.get("offset").and_then(Value::as_i64));
                    let step = self.steps.lock().pop_front().or_else(|| self.exhausted.clone());
                    match step {
                        Some(Step::Batch(records)) => Ok(records),
                        Some(Step::Delayed(delay, records)) => {
                            tokio::time::sleep(delay).await;
                            Ok(records)
                        }
                        Some(Step::Fail) => Err(ApiError::transport("connection reset")),
                        Some(Step::Panic) => panic!("transport panicked"),
                        None => futures::future::pending().await,
                    }
                }
                _ => Ok(Value::Bool(true)),
            }
        }

        fn has_token(&self) -> bool {
            self.has_token
        }
    }

    fn config(retry_limit: RetryLimit) -> PollingConfig {
        PollingConfig {
            retry_limit,
            ..PollingConfig::default()
        }
    }

    fn polling(transport: ScriptedTransport, config: PollingConfig) -> Arc<Polling> {
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(transport)));
        Arc::new(Polling::new(dispatcher, config))
    }

    /// Lets every task run until the runtime is idle.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    async fn wait_for(polling: &Polling, target: PollerState) {
        polling
            .subscribe()
            .wait_for(|state| *state == target)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_ceiling_reached() {
        let transport = ScriptedTransport::always_failing();
        let calls = transport.calls.clone();
        let polling = polling(transport, config(RetryLimit::Limited(2)));

        let started = tokio::time::Instant::now();
        polling.start(PollingOptions::new()).await.unwrap();
        wait_for(&polling, PollerState::Stopped).await;

        // one attempt plus two retries
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(polling.retries(), 2);
        assert!(!polling.is_running());
        assert!(polling.gave_up());
        assert!(started.elapsed() >= Duration::from_millis(6_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_limit_zero_stops_at_once() {
        let transport = ScriptedTransport::always_failing();
        let calls = transport.calls.clone();
        let polling = polling(transport, config(RetryLimit::Limited(0)));

        let started = tokio::time::Instant::now();
        polling.start(PollingOptions::new()).await.unwrap();
        wait_for(&polling, PollerState::Stopped).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(polling.retries(), 0);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unlimited_retries_recover() {
        let transport = ScriptedTransport::new([
            Step::Fail,
            Step::Fail,
            Step::Fail,
            Step::Batch(json!([{ "update_id": 3, "message": { "text": "hi" } }])),
        ]);
        let calls = transport.calls.clone();
        let polling = polling(transport, config(RetryLimit::Unlimited));

        let (tx, mut rx) = mpsc::unbounded_channel();
        polling.dispatcher.use_middleware(handler(move |ctx| {
            let tx = tx.clone();
            async move {
                tx.send(ctx.update_id()).ok();
                Ok(())
            }
        }));

        polling.start(PollingOptions::new()).await.unwrap();
        assert_eq!(rx.recv().await, Some(3));
        settle().await;

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(polling.retries(), 0);
        assert_eq!(polling.state(), PollerState::Running);
        assert_eq!(polling.offset(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_retries() {
        let transport = ScriptedTransport::new([
            Step::Fail,
            Step::Batch(json!([])),
            Step::Fail,
            Step::Fail,
        ]);
        let calls = transport.calls.clone();
        let polling = polling(transport, config(RetryLimit::Limited(2)));

        polling.start(PollingOptions::new()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;

        // the empty batch cleared the first failure, so two more retries fit
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        assert_eq!(polling.retries(), 2);
        assert!(polling.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_watermark_advances_before_dispatch() {
        let transport = ScriptedTransport::new([Step::Batch(json!([
            { "update_id": 10, "message": { "text": "a" } },
            { "update_id": 11, "callback_query": { "id": "q" } }
        ]))]);
        let offsets = transport.offsets.clone();
        let polling = polling(transport, PollingConfig::default());

        let (tx, mut rx) = mpsc::unbounded_channel();
        let observed = Arc::clone(&polling);
        polling.dispatcher.use_middleware(handler(move |ctx| {
            let tx = tx.clone();
            let offset = observed.offset();
            async move {
                tx.send((ctx.update_id(), offset)).ok();
                Ok(())
            }
        }));

        polling.start(PollingOptions::new()).await.unwrap();

        let mut seen = vec![rx.recv().await.unwrap(), rx.recv().await.unwrap()];
        seen.sort();
        assert_eq!(seen, vec![(10, 12), (11, 12)]);

        settle().await;
        assert_eq!(*offsets.lock(), vec![None, Some(12)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_batch_is_noop() {
        let transport = ScriptedTransport::new([Step::Batch(json!([]))]);
        let calls = transport.calls.clone();
        let offsets = transport.offsets.clone();
        let polling = polling(transport, PollingConfig::default());

        let dispatched = Arc::new(AtomicUsize::new(0));
        let counter = dispatched.clone();
        polling.dispatcher.use_middleware(handler(move |_ctx| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));

        polling.start(PollingOptions::new()).await.unwrap();
        settle().await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(*offsets.lock(), vec![None, None]);
        assert_eq!(polling.offset(), 0);
        assert_eq!(dispatched.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_offset_seeds_watermark() {
        let transport = ScriptedTransport::new([Step::Batch(json!([
            { "update_id": 40, "message": {} }
        ]))]);
        let offsets = transport.offsets.clone();
        let polling = polling(transport, PollingConfig::default());

        polling
            .start(PollingOptions::new().offset(40))
            .await
            .unwrap();
        settle().await;

        assert_eq!(*offsets.lock(), vec![Some(40), Some(41)]);
    }

    #[tokio::test]
    async fn test_identity_failure_is_fatal() {
        let transport = ScriptedTransport {
            identity_fails: true,
            ..ScriptedTransport::new([])
        };
        let calls = transport.calls.clone();
        let polling = polling(transport, PollingConfig::default());

        let err = polling.start(PollingOptions::new()).await.unwrap_err();
        assert!(matches!(err, PollingError::Identity(_)));
        assert_eq!(polling.state(), PollerState::Stopped);
        assert!(polling.identity().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_token() {
        let transport = ScriptedTransport {
            has_token: false,
            ..ScriptedTransport::new([])
        };
        let polling = polling(transport, PollingConfig::default());

        let err = polling.start(PollingOptions::new()).await.unwrap_err();
        assert!(matches!(err, PollingError::MissingToken));
        assert!(!polling.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_running_and_identity_cached() {
        let transport = ScriptedTransport {
            exhausted: Some(Step::Delayed(Duration::from_secs(1), json!([]))),
            ..ScriptedTransport::new([])
        };
        let me_calls = transport.me_calls.clone();
        let polling = polling(transport, PollingConfig::default());

        polling.start(PollingOptions::new()).await.unwrap();
        let err = polling.start(PollingOptions::new()).await.unwrap_err();
        assert!(matches!(err, PollingError::AlreadyRunning));

        polling.stop();
        assert!(!polling.is_running());
        polling.start(PollingOptions::new()).await.unwrap();

        assert_eq!(me_calls.load(Ordering::SeqCst), 1);
        assert_eq!(polling.identity().map(|me| me.id), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_backoff() {
        let transport = ScriptedTransport::always_failing();
        let calls = transport.calls.clone();
        let polling = polling(transport, config(RetryLimit::Unlimited));

        polling.start(PollingOptions::new()).await.unwrap();
        wait_for(&polling, PollerState::Backoff).await;

        polling.stop();
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(polling.state(), PollerState::Stopped);
        assert!(!polling.gave_up());
    }

    fn counting_handler(polling: &Polling) -> mpsc::UnboundedReceiver<i64> {
        let (tx, rx) = mpsc::unbounded_channel();
        polling.dispatcher.use_middleware(handler(move |ctx| {
            let tx = tx.clone();
            async move {
                tx.send(ctx.update_id()).ok();
                Ok(())
            }
        }));
        rx
    }

    #[tokio::test(start_paused = true)]
    async fn test_highest_possible_id_is_skipped() {
        let transport = ScriptedTransport::new([Step::Batch(json!([
            { "update_id": i64::MAX, "message": {} },
            { "update_id": 5, "message": {} }
        ]))]);
        let offsets = transport.offsets.clone();
        let polling = polling(transport, PollingConfig::default());
        let mut rx = counting_handler(&polling);

        polling.start(PollingOptions::new()).await.unwrap();
        assert_eq!(rx.recv().await, Some(5));
        settle().await;

        assert!(rx.try_recv().is_err());
        assert_eq!(polling.offset(), 6);
        assert_eq!(*offsets.lock(), vec![None, Some(6)]);
        assert_eq!(polling.state(), PollerState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_panic_stops_polling() {
        let transport = ScriptedTransport::new([Step::Panic]);
        let calls = transport.calls.clone();
        let polling = polling(transport, PollingConfig::default());

        polling.start(PollingOptions::new()).await.unwrap();
        wait_for(&polling, PollerState::Stopped).await;

        assert!(!polling.is_running());
        assert!(!polling.gave_up());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // the poller can be started again afterwards
        polling.start(PollingOptions::new()).await.unwrap();
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_waits_for_fetch_in_flight() {
        let transport = ScriptedTransport::new([Step::Delayed(
            Duration::from_secs(5),
            json!([{ "update_id": 7, "message": {} }]),
        )]);
        let offsets = transport.offsets.clone();
        let polling = polling(transport, PollingConfig::default());
        let mut rx = counting_handler(&polling);

        polling.start(PollingOptions::new()).await.unwrap();
        settle().await;
        polling.stop();

        let restarted = tokio::time::Instant::now();
        polling.start(PollingOptions::new()).await.unwrap();
        assert!(restarted.elapsed() >= Duration::from_secs(4));

        assert_eq!(rx.recv().await, Some(7));
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(rx.try_recv().is_err());
        assert_eq!(polling.offset(), 8);
        assert_eq!(*offsets.lock(), vec![None, Some(8)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_bound() {
        let transport = ScriptedTransport::new([Step::Batch(json!([
            { "update_id": 1, "message": {} },
            { "update_id": 2, "message": {} },
            { "update_id": 3, "message": {} }
        ]))]);
        let calls = transport.calls.clone();
        let config = PollingConfig {
            max_in_flight: std::num::NonZeroUsize::new(1),
            ..PollingConfig::default()
        };
        let polling = polling(transport, config);

        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));
        let (active_c, peak_c, done_c) = (active.clone(), peak.clone(), done.clone());
        polling.dispatcher.use_middleware(handler(move |_ctx| {
            let (active, peak, done) = (active_c.clone(), peak_c.clone(), done_c.clone());
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }));

        polling.start(PollingOptions::new()).await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(polling.state(), PollerState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_failure_is_isolated() {
        let transport = ScriptedTransport::new([Step::Batch(json!([
            { "update_id": 1, "message": { "text": "boom" } },
            { "update_id": 2, "message": { "text": "fine" } }
        ]))]);
        let polling = polling(transport, PollingConfig::default());

        let (tx, mut rx) = mpsc::unbounded_channel();
        polling.dispatcher.use_middleware(handler(move |ctx| {
            let tx = tx.clone();
            async move {
                if ctx.text() == Some("boom") {
                    panic!("handler panicked");
                }
                tx.send(ctx.update_id()).ok();
                Ok(())
            }
        }));

        polling.start(PollingOptions::new()).await.unwrap();
        assert_eq!(rx.recv().await, Some(2));
        settle().await;
        assert!(polling.is_running());
    }
}
