//! In-flight write registry
//!
//! Every accepted `log` call is registered here until its write settles.
//! `stop` waits for the registry to empty before ending the sink, so no
//! accepted event is lost on shutdown.

use eventlog_core_types::WriteId;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::watch;

pub(crate) struct InFlightRegistry {
    entries: Mutex<HashMap<WriteId, Instant>>,
    len: watch::Sender<usize>,
}

impl InFlightRegistry {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            len: watch::Sender::new(0),
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<WriteId, Instant>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn insert(&self, id: WriteId) {
        let mut entries = self.entries();
        entries.insert(id, Instant::now());
        self.len.send_replace(entries.len());
    }

    /// Remove a settled write; returns how long it was in flight
    pub(crate) fn remove(&self, id: WriteId) -> Option<std::time::Duration> {
        let mut entries = self.entries();
        let started = entries.remove(&id)?;
        self.len.send_replace(entries.len());
        Some(started.elapsed())
    }

    pub(crate) fn len(&self) -> usize {
        *self.len.borrow()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resolve once every registered write has settled
    pub(crate) async fn wait_empty(&self) {
        let mut rx = self.len.subscribe();
        // The sender lives as long as `self`, so this cannot observe closure
        let _ = rx.wait_for(|len| *len == 0).await;
    }
}
