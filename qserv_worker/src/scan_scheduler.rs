//! A single chunk disk's scan scheduler: two chunk-id-ordered priority
//! queues (`active`, `pending`) and the admission rule that bounds
//! concurrency per disk while scanning chunks in non-decreasing order.
//!
//! Grounded on `ScanScheduler`/`ChunkDisk`: a task whose chunk id the
//! scheduler has already passed goes to `pending` rather than starving the
//! scan in progress; when `active` drains, the two queues swap and the
//! scheduler is free to pick a new current chunk the next time it is idle.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

use metric::U64Counter;

use crate::task::Task;

#[derive(Debug)]
struct Entry {
    chunk_id: i32,
    seq: u64,
    task: Arc<Task>,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.chunk_id == other.chunk_id && self.seq == other.seq
    }
}
impl Eq for Entry {}
impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.chunk_id, self.seq).cmp(&(other.chunk_id, other.seq))
    }
}

/// One chunk disk's task queues and in-flight accounting.
#[derive(Debug)]
pub struct ChunkDisk {
    active: BinaryHeap<Reverse<Entry>>,
    pending: BinaryHeap<Reverse<Entry>>,
    current_chunk_id: i32,
    running_count: u32,
    max_running: u32,
    next_seq: u64,
    admitted: U64Counter,
}

impl ChunkDisk {
    /// A fresh, empty disk admitting at most `max_running` concurrent
    /// tasks.
    pub fn new(max_running: u32) -> ChunkDisk {
        ChunkDisk {
            active: BinaryHeap::new(),
            pending: BinaryHeap::new(),
            current_chunk_id: -1,
            running_count: 0,
            max_running,
            next_seq: 0,
            admitted: U64Counter::default(),
        }
    }

    /// Total number of tasks this disk has ever admitted.
    pub fn admitted_count(&self) -> u64 {
        self.admitted.fetch()
    }

    /// Enqueue `task`. Goes to `pending` if the scheduler has already
    /// scanned past its chunk id (to avoid starving the chunk currently in
    /// progress); otherwise `active`.
    pub fn enqueue(&mut self, task: Arc<Task>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let entry = Entry {
            chunk_id: task.chunk_id,
            seq,
            task,
        };
        if entry.chunk_id < self.current_chunk_id {
            self.pending.push(Reverse(entry));
        } else {
            self.active.push(Reverse(entry));
        }
    }

    /// Called when an admitted task finishes, freeing a concurrency slot.
    pub fn task_finished(&mut self) {
        self.running_count = self.running_count.saturating_sub(1);
    }

    /// Number of chunk ids, independent of its own ordering, currently
    /// waiting in `pending` (used only by tests/observability).
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// The chunk id the scheduler is currently scanning, or `-1` if idle
    /// with nothing admitted yet this scan.
    pub fn current_chunk_id(&self) -> i32 {
        self.current_chunk_id
    }

    fn swap_if_active_empty(&mut self) {
        if self.active.is_empty() && !self.pending.is_empty() {
            std::mem::swap(&mut self.active, &mut self.pending);
            self.current_chunk_id = -1;
        }
    }

    /// Admit as many tasks as `available` and the disk's own `maxRunning`
    /// bound allow, in chunk-id order, advancing to a new current chunk at
    /// most once per call when the disk is idle.
    pub fn get_next_tasks(&mut self, available: u32) -> Vec<Arc<Task>> {
        let mut admitted = Vec::new();
        let mut advanced_this_cycle = false;

        loop {
            if self.running_count >= self.max_running {
                break;
            }
            if admitted.len() as u32 >= available {
                break;
            }
            self.swap_if_active_empty();
            let Some(Reverse(top)) = self.active.peek() else {
                break;
            };

            if top.chunk_id == self.current_chunk_id {
                let Reverse(entry) = self.active.pop().unwrap();
                self.running_count += 1;
                self.admitted.inc(1);
                admitted.push(entry.task);
                continue;
            }

            if !advanced_this_cycle && self.running_count == 0 {
                let Reverse(entry) = self.active.pop().unwrap();
                self.current_chunk_id = entry.chunk_id;
                self.running_count += 1;
                self.admitted.inc(1);
                admitted.push(entry.task);
                advanced_this_cycle = true;
                continue;
            }

            break;
        }
        admitted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qserv_proto::Fragment;

    fn task(chunk_id: i32) -> Arc<Task> {
        Arc::new(Task::new(
            chunk_id,
            vec![Fragment {
                result_table: "r".into(),
                queries: vec!["SELECT 1".into()],
                sub_chunk_tables: vec![],
                sub_chunk_ids: vec![],
            }],
            "LSST",
            "qsmaster",
            format!("h{chunk_id}"),
            0,
        ))
    }

    /// maxRunning=2, enqueue chunks [3,1,2,1] in that order. The
    /// scheduler admits 1 (advance), then 1 (same chunk), completes both,
    /// then admits 2, then 3. Pending stays empty throughout.
    #[test]
    fn advances_one_chunk_at_a_time_under_a_running_cap() {
        let mut disk = ChunkDisk::new(2);
        disk.enqueue(task(3));
        disk.enqueue(task(1));
        disk.enqueue(task(2));
        disk.enqueue(task(1));

        let first = disk.get_next_tasks(2);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].chunk_id, 1);
        assert_eq!(first[1].chunk_id, 1);
        assert_eq!(disk.current_chunk_id(), 1);
        assert_eq!(disk.pending_len(), 0);

        // No more room: max_running reached.
        assert!(disk.get_next_tasks(2).is_empty());

        disk.task_finished();
        disk.task_finished();

        let second = disk.get_next_tasks(2);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].chunk_id, 2);
        assert_eq!(disk.pending_len(), 0);

        disk.task_finished();
        let third = disk.get_next_tasks(2);
        assert_eq!(third.len(), 1);
        assert_eq!(third[0].chunk_id, 3);
        assert_eq!(disk.pending_len(), 0);
    }

    #[test]
    fn late_arrival_for_a_passed_chunk_goes_to_pending() {
        let mut disk = ChunkDisk::new(4);
        disk.enqueue(task(1));
        let admitted = disk.get_next_tasks(4);
        assert_eq!(admitted.len(), 1);
        assert_eq!(disk.current_chunk_id(), 1);

        // Chunk 0 arrives after the scheduler has moved on to chunk 1.
        disk.enqueue(task(0));
        assert_eq!(disk.pending_len(), 1);

        // It isn't admitted until active drains and the queues swap.
        disk.task_finished();
        let none_yet = disk.get_next_tasks(4);
        assert!(none_yet.is_empty());
        let swapped = disk.get_next_tasks(4);
        assert_eq!(swapped.len(), 1);
        assert_eq!(swapped[0].chunk_id, 0);
    }

    #[test]
    fn running_count_never_exceeds_max() {
        let mut disk = ChunkDisk::new(1);
        disk.enqueue(task(1));
        disk.enqueue(task(1));
        let admitted = disk.get_next_tasks(10);
        assert_eq!(admitted.len(), 1);
    }
}
