//! An alternative scheduling mode: group tasks by scan fingerprint instead
//! of chunk id order.
//!
//! Grounded on `GroupScheduler`: rather than a single current-chunk cursor,
//! tasks that would scan the same underlying tables are batched into
//! size-bounded groups and admitted a whole group at a time. A worker picks
//! one scheduling mode or the other at startup; the two are not composed.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::task::Task;

/// Groups enqueued tasks by [`Task::scan_fingerprint`] and admits whole
/// groups, up to `group_size` tasks at a time, up to `max_running` tasks
/// in flight.
#[derive(Debug)]
pub struct GroupScheduler {
    groups: HashMap<String, VecDeque<Arc<Task>>>,
    group_order: VecDeque<String>,
    group_size: usize,
    max_running: u32,
    running_count: u32,
}

impl GroupScheduler {
    /// A fresh scheduler admitting at most `group_size` tasks per group and
    /// `max_running` tasks overall.
    pub fn new(group_size: usize, max_running: u32) -> GroupScheduler {
        GroupScheduler {
            groups: HashMap::new(),
            group_order: VecDeque::new(),
            group_size,
            max_running,
            running_count: 0,
        }
    }

    /// Enqueue `task`, bucketing it by its scan fingerprint.
    pub fn enqueue(&mut self, task: Arc<Task>) {
        let key = task.scan_fingerprint();
        if !self.groups.contains_key(&key) {
            self.group_order.push_back(key.clone());
        }
        self.groups.entry(key).or_default().push_back(task);
    }

    /// Called when an admitted task finishes.
    pub fn task_finished(&mut self) {
        self.running_count = self.running_count.saturating_sub(1);
    }

    /// Number of distinct fingerprint groups with tasks still waiting.
    pub fn group_count(&self) -> usize {
        self.group_order.iter().filter(|k| !self.groups[*k].is_empty()).count()
    }

    /// Admit tasks, preferring to drain the front group of the queue (up to
    /// `group_size` of its tasks) before moving to the next group, bounded
    /// by `available` and `max_running`.
    pub fn get_next_tasks(&mut self, available: u32) -> Vec<Arc<Task>> {
        let mut admitted = Vec::new();
        while self.running_count < self.max_running && (admitted.len() as u32) < available {
            let Some(key) = self.group_order.front().cloned() else {
                break;
            };
            let Some(queue) = self.groups.get_mut(&key) else {
                self.group_order.pop_front();
                continue;
            };
            if queue.is_empty() {
                self.group_order.pop_front();
                self.groups.remove(&key);
                continue;
            }
            let mut taken_from_group = 0usize;
            while taken_from_group < self.group_size
                && self.running_count < self.max_running
                && (admitted.len() as u32) < available
            {
                let Some(task) = queue.pop_front() else {
                    break;
                };
                self.running_count += 1;
                admitted.push(task);
                taken_from_group += 1;
            }
            if queue.is_empty() {
                self.group_order.pop_front();
                self.groups.remove(&key);
            } else if taken_from_group > 0 {
                // Group still has work left; rotate it to the back so other
                // groups get a turn before it is revisited.
                self.group_order.pop_front();
                self.group_order.push_back(key);
            } else {
                break;
            }
        }
        admitted
    }
}
