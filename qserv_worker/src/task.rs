//! The unit of work a worker's scheduler admits and its executor runs:
//! one chunk's fragments for one user query.
//!
//! Grounded on `wbase::Task`: identity is the message hash (so the same
//! logical task submitted twice dedupes), and cancellation is a single
//! `poisoned` flag the executor polls at row boundaries rather than a
//! preemptible abort.

use std::sync::atomic::{AtomicBool, Ordering};

use qserv_proto::Fragment;

/// One chunk's worth of dispatched fragments, as seen by a worker.
#[derive(Debug)]
pub struct Task {
    pub chunk_id: i32,
    pub fragments: Vec<Fragment>,
    pub db: String,
    pub user: String,
    /// Identity of the dispatched message; two tasks are "the same chunk
    /// request" iff their hash matches, used to coalesce duplicate
    /// re-dispatches.
    pub hash: String,
    /// Monotonic arrival sequence, standing in for wall-clock entry time:
    /// what the scheduler needs is relative arrival order for FIFO
    /// tie-breaking, not an absolute timestamp.
    pub entry_seq: u64,
    poisoned: AtomicBool,
}

impl Task {
    /// Build a new, unpoisoned task.
    pub fn new(
        chunk_id: i32,
        fragments: Vec<Fragment>,
        db: impl Into<String>,
        user: impl Into<String>,
        hash: impl Into<String>,
        entry_seq: u64,
    ) -> Task {
        Task {
            chunk_id,
            fragments,
            db: db.into(),
            user: user.into(),
            hash: hash.into(),
            entry_seq,
            poisoned: AtomicBool::new(false),
        }
    }

    /// Cancel this task; the executor observes this at the next row
    /// boundary and aborts there. Idempotent.
    pub fn poison(&self) {
        self.poisoned.store(true, Ordering::SeqCst);
    }

    /// Whether this task has been cancelled.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::SeqCst)
    }

    /// A coarse fingerprint of this task's spatial-scan shape, used by
    /// [`crate::group_scheduler::GroupScheduler`] to group tasks that would
    /// scan the same underlying chunk tables. Grounded on the original's
    /// `removeByHash` grouping key: db + chunk id + the set of sub-chunk
    /// tables touched.
    pub fn scan_fingerprint(&self) -> String {
        let mut tables: Vec<&str> = self
            .fragments
            .iter()
            .flat_map(|f| f.sub_chunk_tables.iter().map(String::as_str))
            .collect();
        tables.sort_unstable();
        tables.dedup();
        format!("{}:{}:{}", self.db, self.chunk_id, tables.join(","))
    }
}
