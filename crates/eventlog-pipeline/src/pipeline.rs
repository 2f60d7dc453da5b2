//! Write pipeline
//!
//! A `Pipeline` serializes event writes to a single active sink. It owns
//! the sink for its whole life: opened lazily on the first write,
//! taken out of service and ended on `reconfigure`, ended for good on
//! `stop`. Callers never touch the sink directly.
//!
//! ## State machine
//!
//! ```text
//! Uninitialized --init--> Available <--reconfigure--> Draining
//!                              |                          |
//!                              +-----------stop-----------+--> Stopped
//! ```
//!
//! ## Flow of one `log` call
//!
//! 1. The event is normalized, checked against the state, given a
//!    `WriteId` and registered in the in-flight registry, synchronously
//! 2. A single dispatcher task takes submissions in call order and waits
//!    until the pipeline is `Available`
//! 3. The sink is opened if needed; if it signalled backpressure the
//!    dispatcher waits for it to drain, then queues the write
//! 4. The sink task acknowledges the write, which settles the registry
//!    entry and resolves the caller's `LogTicket`
//!
//! `reconfigure` and `stop` run as spawned tasks behind a FIFO transition
//! lock, so a caller dropping its future never leaves the pipeline half
//! way through a transition.

use crate::config::PipelineConfig;
use crate::hooks::{ErrorHook, ErrorReporter, TracingErrorHook};
use crate::registry::InFlightRegistry;
use crate::shutdown::{self, ExitProcess, ShutdownAction, ShutdownSignal, SignalListeners};
use crate::sink::task::{PendingWrite, SinkHandle};
use crate::sink::{AdapterRegistry, SinkFactory, SinkSpec};
use eventlog_core::errors::{EventLogError, Result};
use eventlog_core::event::{Event, EventRecord};
use eventlog_core::{log_op_end, log_op_error, log_op_start};
use eventlog_core_types::{PipelineId, WriteId};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::sync::{mpsc, oneshot, watch};

/// Lifecycle state of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// No configuration yet; `log` fails with `NotInitialised`
    Uninitialized,
    /// Writes flow to the current sink
    Available,
    /// The sink is being swapped; writes queue until `Available`
    Draining,
    /// Terminal; `log` fails with `Stopped`
    Stopped,
}

/// Outcome of one accepted `log` call
///
/// Resolves when the sink has acknowledged (or rejected) the write.
/// Dropping the ticket does not cancel the write.
#[must_use = "a ticket resolves with the sink outcome of the write"]
pub struct LogTicket {
    id: WriteId,
    ack: oneshot::Receiver<Result<()>>,
}

impl LogTicket {
    pub fn write_id(&self) -> WriteId {
        self.id
    }
}

impl Future for LogTicket {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.ack).poll(cx).map(|outcome| {
            outcome.unwrap_or_else(|_| {
                Err(EventLogError::Internal {
                    message: "write dropped without settlement".to_string(),
                })
            })
        })
    }
}

impl std::fmt::Debug for LogTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogTicket").field("id", &self.id).finish()
    }
}

/// Fluent builder for a [`Pipeline`]
///
/// # Example
///
/// ```
/// use eventlog_pipeline::{MemorySink, Pipeline};
/// use std::sync::Arc;
///
/// let sink = MemorySink::new();
/// let pipeline = Pipeline::builder()
///     .adapter("memory", Arc::new(sink.clone()))
///     .error_hook(|err: &eventlog_core::ExError| eprintln!("{}", err))
///     .build();
/// ```
pub struct PipelineBuilder {
    adapters: AdapterRegistry,
    hook: Arc<dyn ErrorHook>,
    shutdown_action: Arc<dyn ShutdownAction>,
}

impl Default for PipelineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self {
            adapters: AdapterRegistry::new(),
            hook: Arc::new(TracingErrorHook),
            shutdown_action: Arc::new(ExitProcess),
        }
    }

    /// Register a sink factory for a URL scheme
    #[must_use]
    pub fn adapter(mut self, scheme: impl Into<String>, factory: Arc<dyn SinkFactory>) -> Self {
        self.adapters.register(scheme, factory);
        self
    }

    /// Replace the whole adapter registry
    #[must_use]
    pub fn adapters(mut self, adapters: AdapterRegistry) -> Self {
        self.adapters = adapters;
        self
    }

    /// Observer for sink and lifecycle errors (default: `TracingErrorHook`)
    #[must_use]
    pub fn error_hook(mut self, hook: impl ErrorHook) -> Self {
        self.hook = Arc::new(hook);
        self
    }

    /// Action run after a signal-triggered stop (default: `ExitProcess`)
    #[must_use]
    pub fn shutdown_action(mut self, action: impl ShutdownAction) -> Self {
        self.shutdown_action = Arc::new(action);
        self
    }

    pub fn build(self) -> Pipeline {
        let id = PipelineId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let inner = Arc::new_cyclic(|weak| Inner {
            reporter: Arc::new(ErrorReporter::new(self.hook, id.clone())),
            id,
            weak: weak.clone(),
            adapters: self.adapters,
            shutdown_action: self.shutdown_action,
            active: RwLock::new(None),
            state: watch::Sender::new(PipelineState::Uninitialized),
            gate: Mutex::new(Gate {
                submissions: Some(tx),
                dispatcher: Some(rx),
                next_write: 1,
            }),
            registry: Arc::new(InFlightRegistry::new()),
            sink: tokio::sync::Mutex::new(None),
            transition: tokio::sync::Mutex::new(()),
            stop: Mutex::new(None),
            listeners: SignalListeners::default(),
        });
        Pipeline { inner }
    }
}

/// Audit event write pipeline
///
/// Cheap to clone; clones share the same sink and state.
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<Inner>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl Pipeline {
    /// Pipeline with no adapters, the tracing error hook and process exit
    /// as shutdown action
    pub fn new() -> Self {
        PipelineBuilder::new().build()
    }

    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn id(&self) -> &PipelineId {
        &self.inner.id
    }

    pub fn state(&self) -> PipelineState {
        *self.inner.state.borrow()
    }

    /// Number of accepted writes not yet settled
    pub fn in_flight(&self) -> usize {
        self.inner.registry.len()
    }

    /// The active configuration, if any
    pub fn config(&self) -> Option<PipelineConfig> {
        self.inner.active().map(|active| active.config.clone())
    }

    /// Whether SIGTERM/SIGINT listeners are currently attached
    pub fn signal_listeners_attached(&self) -> bool {
        self.inner.listeners.attached()
    }

    pub(crate) fn shutdown_on_signal(&self) -> bool {
        self.inner
            .active()
            .is_some_and(|active| active.config.shutdown_on_signal)
    }

    /// Accept `event` for writing and return its ticket
    ///
    /// Acceptance is synchronous: tickets are written in the order `submit`
    /// was called.
    ///
    /// # Errors
    ///
    /// Returns `NotInitialised` before `init`, `Stopped` once `stop` has
    /// begun, and `Internal` when called outside a tokio runtime.
    pub fn submit(&self, event: Event) -> Result<LogTicket> {
        self.inner.submit(event.normalize())
    }

    /// Write `event` and resolve with the sink outcome
    ///
    /// The event is accepted when `log` is called, not when the returned
    /// future is first polled.
    pub fn log(&self, event: Event) -> impl Future<Output = Result<()>> + Send + 'static {
        let ticket = self.submit(event);
        async move { ticket?.await }
    }

    /// Configure an uninitialized pipeline
    ///
    /// Equivalent to `reconfigure`; calling it again swaps the sink.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::reconfigure`].
    pub async fn init(&self, config: PipelineConfig) -> Result<()> {
        self.reconfigure(config).await
    }

    /// Switch to a new configuration without losing events
    ///
    /// The configuration is validated before anything changes. If a sink is
    /// active it is drained, ended and replaced; writes submitted meanwhile
    /// queue and go to the replacement.
    ///
    /// # Errors
    ///
    /// Configuration errors are returned before any transition. A failure
    /// to finish the old sink or open the new one is returned as
    /// `TransitionFailed` after the pipeline is `Available` again. Returns
    /// `Stopped` once `stop` has begun.
    pub async fn reconfigure(&self, config: PipelineConfig) -> Result<()> {
        config.validate()?;
        let spec = SinkSpec::resolve(&config, &self.inner.adapters)?;
        let active = Arc::new(ActiveConfig { config, spec });

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run_reconfigure(active).await })
            .await
            .unwrap_or_else(|err| {
                Err(EventLogError::Internal {
                    message: format!("reconfigure task failed: {}", err),
                })
            })
    }

    /// Stop accepting events, complete every accepted write and end the sink
    ///
    /// Idempotent: concurrent and later calls share the first call's outcome.
    ///
    /// # Errors
    ///
    /// Returns `TransitionFailed` when the sink fails to finish; the pipeline
    /// is `Stopped` regardless.
    pub async fn stop(&self) -> Result<()> {
        let outcome = {
            let mut stop = lock(&self.inner.stop);
            stop.get_or_insert_with(|| {
                let inner = Arc::clone(&self.inner);
                let task = tokio::spawn(async move { inner.run_stop().await });
                async move {
                    task.await.unwrap_or_else(|err| {
                        Err(EventLogError::Internal {
                            message: format!("stop task failed: {}", err),
                        })
                    })
                }
                .boxed()
                .shared()
            })
            .clone()
        };
        outcome.await
    }

    /// Run the graceful stop a delivered `signal` would trigger
    pub async fn handle_signal(&self, signal: ShutdownSignal) {
        shutdown::graceful_stop(
            self.clone(),
            signal,
            Arc::clone(&self.inner.shutdown_action),
        )
        .await;
    }
}

type StopOutcome = Shared<BoxFuture<'static, Result<()>>>;

struct ActiveConfig {
    config: PipelineConfig,
    spec: SinkSpec,
}

struct Submission {
    pending: PendingWrite,
    record: EventRecord,
}

/// Submission side of the dispatcher channel
struct Gate {
    /// `None` once stop has begun
    submissions: Option<mpsc::UnboundedSender<Submission>>,
    /// Receiver until the dispatcher task is spawned
    dispatcher: Option<mpsc::UnboundedReceiver<Submission>>,
    next_write: u64,
}

struct Inner {
    id: PipelineId,
    weak: Weak<Inner>,
    adapters: AdapterRegistry,
    reporter: Arc<ErrorReporter>,
    shutdown_action: Arc<dyn ShutdownAction>,
    active: RwLock<Option<Arc<ActiveConfig>>>,
    state: watch::Sender<PipelineState>,
    gate: Mutex<Gate>,
    registry: Arc<InFlightRegistry>,
    sink: tokio::sync::Mutex<Option<Arc<SinkHandle>>>,
    transition: tokio::sync::Mutex<()>,
    stop: Mutex<Option<StopOutcome>>,
    listeners: SignalListeners,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

impl Inner {
    fn active(&self) -> Option<Arc<ActiveConfig>> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_active(&self, active: Arc<ActiveConfig>) {
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Some(active);
    }

    fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    fn set_state(&self, state: PipelineState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(
                component = module_path!(),
                pipeline_id = %self.id,
                from = ?previous,
                to = ?state,
                "Pipeline state changed"
            );
        }
    }

    fn submit(&self, record: EventRecord) -> Result<LogTicket> {
        let mut gate = lock(&self.gate);
        let Some(submissions) = gate.submissions.clone() else {
            return Err(EventLogError::Stopped);
        };
        match self.state() {
            PipelineState::Uninitialized => return Err(EventLogError::NotInitialised),
            PipelineState::Stopped => return Err(EventLogError::Stopped),
            PipelineState::Available | PipelineState::Draining => {}
        }

        if let Some(rx) = gate.dispatcher.take() {
            let runtime = match tokio::runtime::Handle::try_current() {
                Ok(runtime) => runtime,
                Err(err) => {
                    gate.dispatcher = Some(rx);
                    return Err(EventLogError::Internal {
                        message: format!("log requires a tokio runtime: {}", err),
                    });
                }
            };
            runtime.spawn(dispatch(self.weak.clone(), rx));
        }

        let id = WriteId::new(gate.next_write);
        gate.next_write += 1;
        let (ack_tx, ack_rx) = oneshot::channel();
        let pending = PendingWrite::new(
            id,
            Arc::clone(&self.registry),
            Arc::clone(&self.reporter),
            ack_tx,
        );
        if let Err(mpsc::error::SendError(rejected)) =
            submissions.send(Submission { pending, record })
        {
            drop(gate);
            // Settles the registered write as stopped
            drop(rejected);
            return Err(EventLogError::Stopped);
        }
        Ok(LogTicket { id, ack: ack_rx })
    }

    /// Forward one submission to the sink, waiting for availability and drain
    async fn forward(&self, submission: Submission) {
        let Submission { pending, record } = submission;
        let mut state = self.state.subscribe();
        loop {
            let ready = state
                .wait_for(|s| matches!(s, PipelineState::Available | PipelineState::Stopped))
                .await
                .map(|s| *s);
            if !matches!(ready, Ok(PipelineState::Available)) {
                pending.settle(Err(EventLogError::Stopped));
                return;
            }

            let mut slot = self.sink.lock().await;
            // A transition may have started while waiting for the slot
            if self.state() != PipelineState::Available {
                continue;
            }

            let handle = match slot.as_ref() {
                Some(handle) => Arc::clone(handle),
                None => match self.open_sink().await {
                    Ok(handle) => {
                        *slot = Some(Arc::clone(&handle));
                        handle
                    }
                    Err(err) => {
                        pending.settle(Err(err));
                        return;
                    }
                },
            };

            if handle.is_backpressured() {
                tracing::debug!(
                    component = module_path!(),
                    pipeline_id = %self.id,
                    write_id = pending.id().get(),
                    "Waiting for sink to drain"
                );
            }
            handle.drained().await;
            handle.write(pending, record);
            return;
        }
    }

    async fn open_sink(&self) -> Result<Arc<SinkHandle>> {
        let active = self.active().ok_or(EventLogError::NotInitialised)?;
        let name = active.spec.describe();
        let started = Instant::now();
        log_op_start!("open_sink", pipeline_id = %self.id, sink = name.as_str());

        let writer = match active.spec.open().await {
            Ok(writer) => writer,
            Err(err) => {
                log_op_error!(
                    "open_sink",
                    &err,
                    duration_ms = elapsed_ms(started),
                    pipeline_id = %self.id,
                    sink = name.as_str()
                );
                return Err(err);
            }
        };
        let handle = Arc::new(SinkHandle::spawn(
            name.as_str(),
            writer,
            active.config.high_water_mark,
        ));
        log_op_end!(
            "open_sink",
            duration_ms = elapsed_ms(started),
            pipeline_id = %self.id,
            sink = name.as_str()
        );

        // Stop detaches for good; a write it is still draining must not re-attach
        if active.config.attach_signal_listeners && !self.is_stopping() {
            self.attach_signal_listeners();
        } else {
            self.listeners.detach();
        }
        Ok(handle)
    }

    fn attach_signal_listeners(&self) {
        let weak = self.weak.clone();
        self.listeners.attach(move |signal| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let pipeline = Pipeline { inner };
            let action = Arc::clone(&pipeline.inner.shutdown_action);
            tokio::spawn(shutdown::graceful_stop(pipeline, signal, action));
        });
    }

    fn is_stopping(&self) -> bool {
        lock(&self.gate).submissions.is_none() || self.state() == PipelineState::Stopped
    }

    async fn run_reconfigure(&self, active: Arc<ActiveConfig>) -> Result<()> {
        let _transition = self.transition.lock().await;
        if self.is_stopping() {
            return Err(EventLogError::Stopped);
        }

        let started = Instant::now();
        let sink_name = active.spec.describe();
        log_op_start!(
            "reconfigure",
            pipeline_id = %self.id,
            sink = sink_name.as_str(),
            in_flight = self.registry.len()
        );

        self.set_state(PipelineState::Draining);
        let previous = self.sink.lock().await.take();
        self.set_active(active);

        let result = match previous {
            None => Ok(()),
            Some(previous) => self.replace_sink(previous).await,
        };
        self.set_state(PipelineState::Available);

        match &result {
            Ok(()) => {
                log_op_end!(
                    "reconfigure",
                    duration_ms = elapsed_ms(started),
                    pipeline_id = %self.id,
                    sink = sink_name.as_str()
                );
            }
            Err(err) => {
                log_op_error!(
                    "reconfigure",
                    err,
                    duration_ms = elapsed_ms(started),
                    pipeline_id = %self.id,
                    sink = sink_name.as_str()
                );
                self.reporter
                    .report("reconfigure", err, Some(sink_name.as_str()), None);
            }
        }
        result
    }

    /// End a superseded sink and eagerly open its replacement
    async fn replace_sink(&self, previous: Arc<SinkHandle>) -> Result<()> {
        previous.drained().await;
        previous.end();
        let finished = previous.finished().await;

        let mut slot = self.sink.lock().await;
        let opened = match self.open_sink().await {
            Ok(handle) => {
                *slot = Some(handle);
                Ok(())
            }
            // The next write retries the open
            Err(err) => Err(err),
        };

        finished.and(opened).map_err(|err| EventLogError::TransitionFailed {
            op: "reconfigure".to_string(),
            message: err.to_string(),
        })
    }

    async fn run_stop(&self) -> Result<()> {
        let started = Instant::now();
        log_op_start!(
            "stop",
            pipeline_id = %self.id,
            in_flight = self.registry.len()
        );

        self.listeners.detach();
        lock(&self.gate).submissions = None;

        let _transition = self.transition.lock().await;
        let result = self.drain_and_end().await;
        self.listeners.detach();
        self.set_state(PipelineState::Stopped);

        match &result {
            Ok(()) => {
                log_op_end!("stop", duration_ms = elapsed_ms(started), pipeline_id = %self.id);
            }
            Err(err) => {
                log_op_error!(
                    "stop",
                    err,
                    duration_ms = elapsed_ms(started),
                    pipeline_id = %self.id
                );
                self.reporter.report("stop", err, None, None);
            }
        }
        result
    }

    async fn drain_and_end(&self) -> Result<()> {
        let current = self.sink.lock().await.clone();
        if current.is_none() && self.registry.is_empty() {
            return Ok(());
        }

        if let Some(current) = &current {
            current.drained().await;
        }
        self.registry.wait_empty().await;

        let Some(sink) = self.sink.lock().await.take() else {
            return Ok(());
        };
        sink.end();
        sink.finished()
            .await
            .map_err(|err| EventLogError::TransitionFailed {
                op: "stop".to_string(),
                message: err.to_string(),
            })
    }
}

/// Dispatcher loop: forwards submissions one at a time in call order
async fn dispatch(pipeline: Weak<Inner>, mut rx: mpsc::UnboundedReceiver<Submission>) {
    while let Some(submission) = rx.recv().await {
        // Dropping the submission settles it if the pipeline is gone
        let Some(inner) = pipeline.upgrade() else {
            break;
        };
        inner.forward(submission).await;
    }
}
