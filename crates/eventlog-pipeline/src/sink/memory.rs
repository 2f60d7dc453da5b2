//! In-memory sink
//!
//! `MemorySink` is a `SinkFactory` whose writers append to shared memory.
//! Every `open` starts a new batch, so a test can tell which records went
//! to a sink before and after a reconfigure. Opens and writes can be slowed down or
//! made to fail to exercise backpressure and error paths.

use super::{SinkFactory, SinkTarget, SinkWriter};
use async_trait::async_trait;
use eventlog_core::errors::{EventLogError, Result};
use eventlog_core::event::EventRecord;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const SINK_NAME: &str = "memory";

#[derive(Default)]
struct MemoryState {
    batches: Vec<Vec<EventRecord>>,
    targets: Vec<String>,
    finished: usize,
    write_delay: Option<Duration>,
    open_delay: Option<Duration>,
    write_failures: VecDeque<String>,
    finish_failure: Option<String>,
    open_failure: Option<String>,
}

/// Shared in-memory destination; clones observe the same records
#[derive(Clone, Default)]
pub struct MemorySink {
    state: Arc<Mutex<MemoryState>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delay every subsequent write by `delay`
    #[must_use]
    pub fn with_write_delay(self, delay: Duration) -> Self {
        self.state().write_delay = Some(delay);
        self
    }

    /// Delay every subsequent open by `delay`
    #[must_use]
    pub fn with_open_delay(self, delay: Duration) -> Self {
        self.state().open_delay = Some(delay);
        self
    }

    /// Make the next write fail with `message`
    pub fn fail_next_write(&self, message: impl Into<String>) {
        self.state().write_failures.push_back(message.into());
    }

    /// Make the next `finish` fail with `message`
    pub fn fail_next_finish(&self, message: impl Into<String>) {
        self.state().finish_failure = Some(message.into());
    }

    /// Make the next `open` fail with `message`
    pub fn fail_next_open(&self, message: impl Into<String>) {
        self.state().open_failure = Some(message.into());
    }

    /// All records, across every opened writer, in write order
    pub fn records(&self) -> Vec<EventRecord> {
        self.state().batches.concat()
    }

    /// Records grouped by the writer that received them
    pub fn batches(&self) -> Vec<Vec<EventRecord>> {
        self.state().batches.clone()
    }

    /// Redacted targets, one per successful open
    pub fn targets(&self) -> Vec<String> {
        self.state().targets.clone()
    }

    /// Number of writers opened so far
    pub fn opened(&self) -> usize {
        self.state().batches.len()
    }

    /// Number of writers finished so far
    pub fn finished(&self) -> usize {
        self.state().finished
    }
}

#[async_trait]
impl SinkFactory for MemorySink {
    async fn open(&self, target: &SinkTarget) -> Result<Box<dyn SinkWriter>> {
        let delay = self.state().open_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if let Some(message) = state.open_failure.take() {
            return Err(EventLogError::sink(SINK_NAME, message));
        }
        state.batches.push(Vec::new());
        state.targets.push(target.redacted());
        Ok(Box::new(MemoryWriter {
            sink: self.clone(),
            batch: state.batches.len() - 1,
        }))
    }
}

struct MemoryWriter {
    sink: MemorySink,
    batch: usize,
}

#[async_trait]
impl SinkWriter for MemoryWriter {
    async fn write(&mut self, record: &EventRecord) -> Result<()> {
        let delay = self.sink.state().write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.sink.state();
        if let Some(message) = state.write_failures.pop_front() {
            return Err(EventLogError::sink(SINK_NAME, message));
        }
        state.batches[self.batch].push(record.clone());
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        let mut state = self.sink.state();
        state.finished += 1;
        match state.finish_failure.take() {
            Some(message) => Err(EventLogError::sink(SINK_NAME, message)),
            None => Ok(()),
        }
    }
}
