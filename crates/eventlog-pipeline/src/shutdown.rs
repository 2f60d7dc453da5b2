//! Shutdown coordinator
//!
//! Binds SIGTERM and SIGINT to a graceful pipeline stop. Listeners are
//! attached when a sink is opened (unless disabled in the configuration)
//! and detached by `stop`. Once a signal-triggered stop has settled, the
//! process is terminated only when `shutdown_on_signal` is set; otherwise
//! the host application stays in charge of exiting.
//!
//! A signal that arrives after every pipeline has detached its listeners
//! gets the default disposition: the process exits with `128 + signo`.

use crate::pipeline::Pipeline;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tokio::task::JoinHandle;

/// Process signals that trigger a graceful stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShutdownSignal {
    Terminate,
    Interrupt,
}

impl ShutdownSignal {
    pub const ALL: [ShutdownSignal; 2] = [ShutdownSignal::Terminate, ShutdownSignal::Interrupt];

    pub fn name(&self) -> &'static str {
        match self {
            ShutdownSignal::Terminate => "SIGTERM",
            ShutdownSignal::Interrupt => "SIGINT",
        }
    }

    /// POSIX signal number
    pub fn number(&self) -> i32 {
        match self {
            ShutdownSignal::Terminate => 15,
            ShutdownSignal::Interrupt => 2,
        }
    }

    /// Conventional exit status of a process ended by this signal
    pub fn exit_code(&self) -> i32 {
        128 + self.number()
    }
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What to do once a signal-triggered stop has settled
pub trait ShutdownAction: Send + Sync + 'static {
    fn terminate(&self, signal: ShutdownSignal);
}

/// Exit the process with `128 + signo`
#[derive(Debug, Default, Clone, Copy)]
pub struct ExitProcess;

impl ShutdownAction for ExitProcess {
    fn terminate(&self, signal: ShutdownSignal) {
        std::process::exit(signal.exit_code());
    }
}

/// Stop `pipeline` in response to `signal`, then run `action` if configured
///
/// A stop failure is logged; the process is considered ready for shutdown
/// either way.
pub(crate) async fn graceful_stop(
    pipeline: Pipeline,
    signal: ShutdownSignal,
    action: Arc<dyn ShutdownAction>,
) {
    tracing::info!(
        component = module_path!(),
        pipeline_id = %pipeline.id(),
        signal = signal.name(),
        "Graceful stop due to signal"
    );

    if let Err(err) = pipeline.stop().await {
        tracing::warn!(
            component = module_path!(),
            pipeline_id = %pipeline.id(),
            error = %err,
            "Stop failed; continuing with shutdown"
        );
    }

    if pipeline.shutdown_on_signal() {
        tracing::info!(
            component = module_path!(),
            pipeline_id = %pipeline.id(),
            exit_code = signal.exit_code(),
            "Event log stopped; terminating process"
        );
        action.terminate(signal);
    } else {
        tracing::info!(
            component = module_path!(),
            pipeline_id = %pipeline.id(),
            "Event log stopped; ready for application shutdown"
        );
    }
}

type SignalCallback = Arc<dyn Fn(ShutdownSignal) + Send + Sync>;

/// Process-wide dispatch of SIGTERM and SIGINT to attached listeners
///
/// The OS handlers tokio installs stay registered for the life of the
/// process, so detaching a listener cannot restore the default signal
/// disposition. The hub does it instead: a signal that arrives while no
/// listener is attached is answered with `action`, which terminates the
/// process.
pub(crate) struct SignalHub {
    callbacks: Mutex<HashMap<u64, SignalCallback>>,
    next_id: AtomicU64,
    watchers: Mutex<Vec<JoinHandle<()>>>,
    action: Arc<dyn ShutdownAction>,
}

impl SignalHub {
    pub(crate) fn new(action: Arc<dyn ShutdownAction>) -> Arc<Self> {
        Arc::new(Self {
            callbacks: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            watchers: Mutex::new(Vec::new()),
            action,
        })
    }

    /// Hub shared by every pipeline in the process
    pub(crate) fn global() -> Arc<Self> {
        static HUB: OnceLock<Arc<SignalHub>> = OnceLock::new();
        Arc::clone(HUB.get_or_init(|| SignalHub::new(Arc::new(ExitProcess))))
    }

    fn callbacks(&self) -> MutexGuard<'_, HashMap<u64, SignalCallback>> {
        self.callbacks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(self: &Arc<Self>, callback: SignalCallback) -> u64 {
        self.watch();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.callbacks().insert(id, callback);
        id
    }

    fn unregister(&self, id: u64) {
        self.callbacks().remove(&id);
    }

    /// Number of attached listener sets
    pub(crate) fn listening(&self) -> usize {
        self.callbacks().len()
    }

    /// Hand `signal` to every attached listener, or terminate if there is none
    pub(crate) fn deliver(&self, signal: ShutdownSignal) {
        let callbacks: Vec<SignalCallback> = self.callbacks().values().cloned().collect();
        if callbacks.is_empty() {
            tracing::info!(
                component = module_path!(),
                signal = signal.name(),
                exit_code = signal.exit_code(),
                "No event log listening; applying default signal disposition"
            );
            self.action.terminate(signal);
            return;
        }
        for callback in callbacks {
            callback(signal);
        }
    }

    /// Start the OS signal watchers unless they are already running
    ///
    /// Watchers die with the runtime that spawned them and are restarted
    /// on the next attach.
    fn watch(self: &Arc<Self>) {
        let mut watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
        if !watchers.is_empty() && watchers.iter().all(|w| !w.is_finished()) {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(
                component = module_path!(),
                "No tokio runtime; signal listeners not installed"
            );
            return;
        };
        for watcher in watchers.drain(..) {
            watcher.abort();
        }
        for signal in ShutdownSignal::ALL {
            let hub = Arc::downgrade(self);
            watchers.push(runtime.spawn(async move {
                let delivered = watch_signal(signal, |signal| {
                    if let Some(hub) = hub.upgrade() {
                        hub.deliver(signal);
                    }
                });
                if let Err(err) = delivered.await {
                    tracing::warn!(
                        component = module_path!(),
                        signal = signal.name(),
                        error = %err,
                        "Could not listen for signal"
                    );
                }
            }));
        }
    }
}

/// The signal listener set of one pipeline
pub(crate) struct SignalListeners {
    hub: Arc<SignalHub>,
    registration: Mutex<Option<u64>>,
}

impl Default for SignalListeners {
    fn default() -> Self {
        Self::with_hub(SignalHub::global())
    }
}

impl SignalListeners {
    pub(crate) fn with_hub(hub: Arc<SignalHub>) -> Self {
        Self {
            hub,
            registration: Mutex::new(None),
        }
    }

    fn registration(&self) -> MutexGuard<'_, Option<u64>> {
        self.registration
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace any attached listeners with fresh ones calling `on_signal`
    pub(crate) fn attach<F>(&self, on_signal: F)
    where
        F: Fn(ShutdownSignal) + Send + Sync + 'static,
    {
        let mut registration = self.registration();
        if let Some(id) = registration.take() {
            self.hub.unregister(id);
        }
        *registration = Some(self.hub.register(Arc::new(on_signal)));
    }

    pub(crate) fn detach(&self) {
        if let Some(id) = self.registration().take() {
            self.hub.unregister(id);
        }
    }

    pub(crate) fn attached(&self) -> bool {
        self.registration().is_some()
    }
}

impl Drop for SignalListeners {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(unix)]
async fn watch_signal<F>(signal: ShutdownSignal, on_signal: F) -> std::io::Result<()>
where
    F: Fn(ShutdownSignal),
{
    use tokio::signal::unix::{signal as unix_signal, SignalKind};

    let kind = match signal {
        ShutdownSignal::Terminate => SignalKind::terminate(),
        ShutdownSignal::Interrupt => SignalKind::interrupt(),
    };
    let mut stream = unix_signal(kind)?;
    while stream.recv().await.is_some() {
        on_signal(signal);
    }
    Ok(())
}

#[cfg(not(unix))]
async fn watch_signal<F>(signal: ShutdownSignal, on_signal: F) -> std::io::Result<()>
where
    F: Fn(ShutdownSignal),
{
    match signal {
        ShutdownSignal::Interrupt => loop {
            tokio::signal::ctrl_c().await?;
            on_signal(signal);
        },
        ShutdownSignal::Terminate => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_follow_shell_convention() {
        assert_eq!(ShutdownSignal::Terminate.exit_code(), 143);
        assert_eq!(ShutdownSignal::Interrupt.exit_code(), 130);
        assert_eq!(ShutdownSignal::Interrupt.to_string(), "SIGINT");
    }

    #[derive(Default)]
    struct RecordingAction {
        signals: Mutex<Vec<ShutdownSignal>>,
    }

    impl ShutdownAction for RecordingAction {
        fn terminate(&self, signal: ShutdownSignal) {
            self.signals.lock().unwrap().push(signal);
        }
    }

    #[tokio::test]
    async fn test_attach_replaces_instead_of_stacking() {
        let hub = SignalHub::new(Arc::new(RecordingAction::default()));
        let listeners = SignalListeners::with_hub(Arc::clone(&hub));

        listeners.attach(|_| {});
        listeners.attach(|_| {});
        listeners.attach(|_| {});

        assert!(listeners.attached());
        assert_eq!(hub.listening(), 1);

        listeners.detach();
        assert!(!listeners.attached());
        assert_eq!(hub.listening(), 0);
    }

    #[tokio::test]
    async fn test_signal_after_detach_gets_default_disposition() {
        // Given a hub with one attached listener set
        let action = Arc::new(RecordingAction::default());
        let hub = SignalHub::new(action.clone());
        let listeners = SignalListeners::with_hub(Arc::clone(&hub));
        let heard = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&heard);
        listeners.attach(move |signal| sink.lock().unwrap().push(signal));

        // When a signal arrives while attached, the listener handles it
        hub.deliver(ShutdownSignal::Terminate);
        assert_eq!(*heard.lock().unwrap(), vec![ShutdownSignal::Terminate]);
        assert!(action.signals.lock().unwrap().is_empty());

        // Then after detaching, the next signal terminates the process
        listeners.detach();
        hub.deliver(ShutdownSignal::Interrupt);
        assert_eq!(heard.lock().unwrap().len(), 1);
        assert_eq!(
            *action.signals.lock().unwrap(),
            vec![ShutdownSignal::Interrupt]
        );
    }

    #[tokio::test]
    async fn test_dropping_listeners_releases_the_hub() {
        let hub = SignalHub::new(Arc::new(RecordingAction::default()));
        {
            let listeners = SignalListeners::with_hub(Arc::clone(&hub));
            listeners.attach(|_| {});
            assert_eq!(hub.listening(), 1);
        }
        assert_eq!(hub.listening(), 0);
    }
}
