//! The worker process's option block: the `mysqlSocket`/`numThreads`/
//! `QSW_*` keys from spec §6, recognized from either flags or environment.

use std::path::PathBuf;

use crate::memman::MemManConfig;

/// Connection and scheduling configuration for one worker process.
#[derive(Debug, Clone, clap::Parser)]
pub struct WorkerConfig {
    /// Path to the local relational engine's UNIX socket.
    #[clap(long = "mysql-socket", env = "mysqlSocket")]
    pub mysql_socket: PathBuf,

    /// User the worker connects to the local engine as.
    #[clap(
        long = "mysql-default-user",
        env = "mysqlDefaultUser",
        default_value = "qsmaster"
    )]
    pub mysql_default_user: String,

    /// Size of the executor's fragment-running thread pool.
    #[clap(long = "num-threads", env = "numThreads", default_value = "4")]
    pub num_threads: usize,

    /// Scheduler thread pool size (`QSW_THRDPOOLSZ`).
    #[clap(long = "scheduler-pool-size", env = "QSW_THRDPOOLSZ", default_value = "4")]
    pub scheduler_pool_size: u32,

    /// Max tasks sharing one scan group in the worker's group-scheduling
    /// mode (`QSW_GROUPSZ`).
    #[clap(long = "group-size", env = "QSW_GROUPSZ", default_value = "100")]
    pub group_size: usize,

    /// Reserved slow-class threads (`QSW_RESERVESLOW`).
    #[clap(long = "reserve-slow", env = "QSW_RESERVESLOW", default_value = "0")]
    pub reserve_slow: u32,

    /// Reserved medium-class threads (`QSW_RESERVEMED`).
    #[clap(long = "reserve-med", env = "QSW_RESERVEMED", default_value = "0")]
    pub reserve_med: u32,

    /// Reserved fast-class threads (`QSW_RESERVEFAST`).
    #[clap(long = "reserve-fast", env = "QSW_RESERVEFAST", default_value = "0")]
    pub reserve_fast: u32,

    #[clap(flatten)]
    pub memman: MemManConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn parses_required_socket_and_defaults() {
        let cfg = WorkerConfig::try_parse_from([
            "worker",
            "--mysql-socket",
            "/var/run/mysqld/mysqld.sock",
        ])
        .unwrap();
        assert_eq!(cfg.mysql_default_user, "qsmaster");
        assert_eq!(cfg.num_threads, 4);
        assert_eq!(cfg.memman.kind, MemManKind::None);
    }

    #[test]
    fn rejects_missing_socket() {
        assert!(WorkerConfig::try_parse_from(["worker"]).is_err());
    }

    #[test]
    fn overrides_from_flags() {
        let cfg = WorkerConfig::try_parse_from([
            "worker",
            "--mysql-socket",
            "/tmp/x.sock",
            "--num-threads",
            "16",
            "--group-size",
            "7",
        ])
        .unwrap();
        assert_eq!(cfg.num_threads, 16);
        assert_eq!(cfg.group_size, 7);
    }
}
