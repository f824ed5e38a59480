//! The worker-wide scheduling facade: one scheduling discipline, chosen at
//! startup, shared behind a mutex by every connection-handling thread.
//!
//! [`ChunkDisk`] scan-ordered scheduling and [`GroupScheduler`] fingerprint
//! grouping are alternative strategies, not composable — a worker process
//! runs exactly one.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::group_scheduler::GroupScheduler;
use crate::scan_scheduler::ChunkDisk;
use crate::task::Task;

/// Either scheduling discipline a worker process may run.
#[derive(Debug)]
enum Mode {
    Scan(ChunkDisk),
    Group(GroupScheduler),
}

/// Thread-safe entry point a worker's connection handlers call into to
/// enqueue incoming tasks and pull admitted ones for execution.
#[derive(Debug)]
pub struct WorkerScheduler {
    mode: Mutex<Mode>,
}

impl WorkerScheduler {
    /// Chunk-ordered scanning, bounded to `max_running` concurrent tasks.
    pub fn chunk_ordered(max_running: u32) -> WorkerScheduler {
        WorkerScheduler {
            mode: Mutex::new(Mode::Scan(ChunkDisk::new(max_running))),
        }
    }

    /// Fingerprint-grouped scheduling, admitting at most `group_size` tasks
    /// per group and `max_running` overall.
    pub fn grouped(group_size: usize, max_running: u32) -> WorkerScheduler {
        WorkerScheduler {
            mode: Mutex::new(Mode::Group(GroupScheduler::new(group_size, max_running))),
        }
    }

    pub fn enqueue(&self, task: Arc<Task>) {
        match &mut *self.mode.lock() {
            Mode::Scan(disk) => disk.enqueue(task),
            Mode::Group(group) => group.enqueue(task),
        }
    }

    pub fn task_finished(&self) {
        match &mut *self.mode.lock() {
            Mode::Scan(disk) => disk.task_finished(),
            Mode::Group(group) => group.task_finished(),
        }
    }

    pub fn get_next_tasks(&self, available: u32) -> Vec<Arc<Task>> {
        match &mut *self.mode.lock() {
            Mode::Scan(disk) => disk.get_next_tasks(available),
            Mode::Group(group) => group.get_next_tasks(available),
        }
    }
}
