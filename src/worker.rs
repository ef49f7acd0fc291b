//! Background entry loading.
//!
//! Every view binding gets a fresh generation. Results come back tagged with
//! the mode and generation they were started for, so a result that arrives
//! after the user has moved on can be recognised and dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::thread;

use crate::mode::EntryJob;
use crate::msg::Msg;
use crate::registry::ModeKey;

/// Monotonic generation counter, starting at 1.
#[derive(Debug, Default, Clone)]
pub struct GenerationClock {
    next: Arc<AtomicU64>,
}

impl GenerationClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }
}

/// Run `job` on its own thread and post the rows back as [`Msg::EntriesReady`].
pub fn spawn(job: EntryJob, mode: ModeKey, generation: u64, tx: mpsc::Sender<Msg>) {
    let spawned = thread::Builder::new()
        .name(format!("entries-{generation}"))
        .spawn(move || {
            let entries = job();
            tracing::debug!("background job {generation} produced {} rows", entries.len());
            // the receiver is gone once the launcher has exited
            let _ = tx.send(Msg::EntriesReady {
                mode,
                generation,
                entries,
            });
        });

    if let Err(err) = spawned {
        tracing::error!("failed to start background job: {err}");
    }
}
