//! Builds a [`WorkerScheduler`] from the worker's `clap`/env configuration
//! block, per spec §6's scheduler-mode selection (`QSW_GROUPSZ` present
//! means group scheduling; otherwise scan-ordered).

use clap_blocks::WorkerConfig;

use crate::scheduler::WorkerScheduler;

impl WorkerScheduler {
    /// Construct the configured scheduling discipline: group scheduling
    /// when `group_size` is set, chunk-ordered scanning otherwise.
    pub fn from_config(config: &WorkerConfig) -> WorkerScheduler {
        if config.group_size > 0 {
            WorkerScheduler::grouped(config.group_size, config.scheduler_pool_size)
        } else {
            WorkerScheduler::chunk_ordered(config.scheduler_pool_size)
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn builds_group_scheduler_when_group_size_positive() {
        let config = WorkerConfig::try_parse_from([
            "worker",
            "--mysql-socket",
            "/tmp/mysql.sock",
            "--group-size",
            "5",
        ])
        .unwrap();
        let _sched = WorkerScheduler::from_config(&config);
    }

    #[test]
    fn builds_scan_scheduler_by_default() {
        let config = WorkerConfig::try_parse_from([
            "worker",
            "--mysql-socket",
            "/tmp/mysql.sock",
            "--group-size",
            "0",
        ])
        .unwrap();
        let _sched = WorkerScheduler::from_config(&config);
    }
}
