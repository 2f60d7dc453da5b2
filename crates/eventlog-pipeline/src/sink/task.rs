//! Task-owned sink
//!
//! Each opened `SinkWriter` is moved into its own tokio task that consumes
//! an unbounded command queue. The handle counts queued writes against the
//! high-water mark: `write` returns `false` once the mark is reached, and
//! `drained` resolves when the queue has emptied again. When the task exits
//! for any reason the backpressure flag is cleared and `finished` resolves,
//! and any write still queued settles with `SinkClosed`.

use super::SinkWriter;
use crate::hooks::ErrorReporter;
use crate::registry::InFlightRegistry;
use eventlog_core::errors::{EventLogError, Result};
use eventlog_core::event::EventRecord;
use eventlog_core_types::WriteId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{mpsc, oneshot, watch};

/// A registered write waiting for its sink acknowledgement
///
/// Settling removes the registry entry, reports failures to the error hook
/// and resolves the caller, exactly once. A `PendingWrite` dropped without
/// being settled (its sink task died, or the pipeline went away) settles
/// as closed.
pub(crate) struct PendingWrite {
    id: WriteId,
    sink: Option<Arc<str>>,
    settlement: Option<Settlement>,
}

struct Settlement {
    registry: Arc<InFlightRegistry>,
    reporter: Arc<ErrorReporter>,
    ack: oneshot::Sender<Result<()>>,
}

impl PendingWrite {
    pub(crate) fn new(
        id: WriteId,
        registry: Arc<InFlightRegistry>,
        reporter: Arc<ErrorReporter>,
        ack: oneshot::Sender<Result<()>>,
    ) -> Self {
        registry.insert(id);
        Self {
            id,
            sink: None,
            settlement: Some(Settlement {
                registry,
                reporter,
                ack,
            }),
        }
    }

    pub(crate) fn id(&self) -> WriteId {
        self.id
    }

    pub(crate) fn assign_sink(&mut self, sink: Arc<str>) {
        self.sink = Some(sink);
    }

    pub(crate) fn settle(mut self, result: Result<()>) {
        self.complete(result);
    }

    fn complete(&mut self, result: Result<()>) {
        let Some(settlement) = self.settlement.take() else {
            return;
        };
        let elapsed = settlement.registry.remove(self.id);
        match &result {
            Ok(()) => tracing::trace!(
                component = module_path!(),
                write_id = self.id.get(),
                elapsed_us = elapsed.map(|d| d.as_micros() as u64),
                "Write acknowledged"
            ),
            Err(err) => {
                settlement
                    .reporter
                    .report("write", err, self.sink.as_deref(), Some(self.id));
            }
        }
        // The caller may have dropped its ticket; the outcome is still reported
        let _ = settlement.ack.send(result);
    }
}

impl Drop for PendingWrite {
    fn drop(&mut self) {
        if self.settlement.is_some() {
            let err = match &self.sink {
                Some(sink) => EventLogError::SinkClosed {
                    sink: sink.to_string(),
                },
                None => EventLogError::Stopped,
            };
            self.complete(Err(err));
        }
    }
}

enum SinkCommand {
    Write {
        pending: PendingWrite,
        record: EventRecord,
    },
    End,
}

struct SinkShared {
    name: Arc<str>,
    high_water_mark: usize,
    buffered: Mutex<usize>,
    backpressure: watch::Sender<bool>,
    finished: watch::Sender<Option<Result<()>>>,
}

impl SinkShared {
    fn buffered(&self) -> MutexGuard<'_, usize> {
        self.buffered.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release_one(&self) {
        let mut buffered = self.buffered();
        *buffered = buffered.saturating_sub(1);
        if *buffered == 0 && *self.backpressure.borrow() {
            self.backpressure.send_replace(false);
            tracing::debug!(
                component = module_path!(),
                sink = &*self.name,
                "Sink drained"
            );
        }
    }
}

/// Clears backpressure and publishes the finish outcome however the task ends
struct TaskExit {
    shared: Arc<SinkShared>,
}

impl TaskExit {
    fn finish(&self, result: Result<()>) {
        self.shared.finished.send_replace(Some(result));
    }
}

impl Drop for TaskExit {
    fn drop(&mut self) {
        self.shared.backpressure.send_replace(false);
        let name = self.shared.name.to_string();
        self.shared.finished.send_if_modified(|outcome| {
            if outcome.is_some() {
                return false;
            }
            *outcome = Some(Err(EventLogError::SinkClosed { sink: name }));
            true
        });
    }
}

/// Handle to a sink owned by its own task
pub(crate) struct SinkHandle {
    shared: Arc<SinkShared>,
    tx: mpsc::UnboundedSender<SinkCommand>,
    ended: AtomicBool,
}

impl SinkHandle {
    /// Move `writer` into a new task and return its handle
    pub(crate) fn spawn(
        name: impl Into<Arc<str>>,
        writer: Box<dyn SinkWriter>,
        high_water_mark: usize,
    ) -> Self {
        let shared = Arc::new(SinkShared {
            name: name.into(),
            high_water_mark: high_water_mark.max(1),
            buffered: Mutex::new(0),
            backpressure: watch::Sender::new(false),
            finished: watch::Sender::new(None),
        });
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_sink_task(writer, rx, Arc::clone(&shared)));
        Self {
            shared,
            tx,
            ended: AtomicBool::new(false),
        }
    }

    pub(crate) fn name(&self) -> Arc<str> {
        Arc::clone(&self.shared.name)
    }

    /// Queue a write; `false` means the high-water mark has been reached
    /// and the next write should wait for `drained`
    pub(crate) fn write(&self, mut pending: PendingWrite, record: EventRecord) -> bool {
        pending.assign_sink(self.name());
        let mut buffered = self.shared.buffered();
        if let Err(mpsc::error::SendError(rejected)) =
            self.tx.send(SinkCommand::Write { pending, record })
        {
            drop(buffered);
            // Dropping the command settles the write as closed
            drop(rejected);
            return true;
        }
        *buffered += 1;
        let below_mark = *buffered < self.shared.high_water_mark;
        if !below_mark && !*self.shared.backpressure.borrow() {
            self.shared.backpressure.send_replace(true);
            tracing::debug!(
                component = module_path!(),
                sink = &*self.shared.name,
                buffered = *buffered,
                "Sink signalled backpressure"
            );
        }
        below_mark
    }

    pub(crate) fn is_backpressured(&self) -> bool {
        *self.shared.backpressure.borrow()
    }

    /// Resolve once no backpressure is signalled
    pub(crate) async fn drained(&self) {
        let mut rx = self.shared.backpressure.subscribe();
        // Sender is owned by `shared`, which outlives this borrow
        let _ = rx.wait_for(|pressured| !*pressured).await;
    }

    /// Ask the task to finish after the writes already queued; idempotent
    pub(crate) fn end(&self) {
        if !self.ended.swap(true, Ordering::SeqCst) {
            let _ = self.tx.send(SinkCommand::End);
        }
    }

    /// Resolve with the writer's finish outcome once the task has exited
    pub(crate) async fn finished(&self) -> Result<()> {
        let mut rx = self.shared.finished.subscribe();
        let outcome = rx.wait_for(Option::is_some).await.map(|outcome| (*outcome).clone());
        match outcome {
            Ok(Some(result)) => result,
            _ => Err(EventLogError::SinkClosed {
                sink: self.shared.name.to_string(),
            }),
        }
    }
}

async fn run_sink_task(
    mut writer: Box<dyn SinkWriter>,
    mut rx: mpsc::UnboundedReceiver<SinkCommand>,
    shared: Arc<SinkShared>,
) {
    let exit = TaskExit {
        shared: Arc::clone(&shared),
    };

    while let Some(command) = rx.recv().await {
        match command {
            SinkCommand::Write { pending, record } => {
                let result = writer.write(&record).await;
                shared.release_one();
                pending.settle(result);
            }
            SinkCommand::End => break,
        }
    }

    // Either `end` was requested or every handle is gone
    rx.close();
    let result = writer.finish().await;
    if let Err(err) = &result {
        tracing::warn!(
            component = module_path!(),
            sink = &*shared.name,
            error = %err,
            "Sink failed to finish"
        );
    }
    exit.finish(result);
    // Anything queued after `End` settles as closed when `rx` drops
}
