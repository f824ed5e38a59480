//! Streams worker results into a destination table and runs the
//! coordinator-side query that combines per-chunk partial aggregates into
//! the final result.
//!
//! Grounded on `InfileMerger`/`SqlInsertIter`: [`InfileMerger::merge`] is
//! called once per worker result, possibly concurrently from several
//! threads as chunks complete out of order; table creation happens at most
//! once, serialized by the same mutex that guards the state machine, and
//! row ingest after that proceeds under whatever concurrency the sink
//! itself allows.

use metric::U64Counter;
use observability_deps::tracing::{error, info};
use parking_lot::Mutex;
use qserv_proto::ResultMsg;
use snafu::prelude::*;

use crate::state::MergeState;

/// Errors raised while merging worker results.
#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum MergeError {
    #[snafu(display("failed to create destination table: {detail}"))]
    CreateTable { detail: String },

    #[snafu(display("failed to write rows: {detail}"))]
    MergeWrite { detail: String },

    #[snafu(display("failed to connect for the final merge query: {detail}"))]
    MysqlConnect { detail: String },

    #[snafu(display("final merge query failed: {detail}"))]
    MysqlExec { detail: String },

    #[snafu(display("a worker reported a job-level error: {detail}"))]
    Terminate { detail: String },

    #[snafu(display("result set exceeds the configured row limit"))]
    ResultTooBig,

    #[snafu(display("merge already reached a terminal state"))]
    AlreadyTerminal,
}

/// The database operations the merger needs; modeled as a trait so the
/// merge state machine can be exercised and tested without a live MySQL
/// connection.
pub trait MergeSink: Send + Sync {
    /// Create the destination table, if it does not already exist.
    fn create_table(&self, table: &str) -> Result<(), MergeError>;

    /// Load `result`'s rows into `table`. Returns the number of rows
    /// written.
    fn insert_rows(&self, table: &str, result: &ResultMsg) -> Result<u64, MergeError>;

    /// Run the coordinator-side query that folds per-chunk partial
    /// aggregates in `table` into the final result, returning the name of
    /// the table holding the final result.
    fn run_final_merge(&self, table: &str) -> Result<String, MergeError>;
}

/// Drives one query's merge state machine across however many worker
/// results arrive for it.
#[derive(Debug)]
pub struct InfileMerger<S> {
    state: Mutex<MergeState>,
    sink: S,
    table: String,
    rows_merged: U64Counter,
    max_result_rows: Option<u64>,
    final_table: Mutex<Option<String>>,
}

impl<S: MergeSink> InfileMerger<S> {
    /// A merger writing into `table` via `sink`, optionally capping the
    /// total number of rows it will accept before failing with
    /// [`MergeError::ResultTooBig`].
    pub fn new(table: impl Into<String>, sink: S, max_result_rows: Option<u64>) -> InfileMerger<S> {
        InfileMerger {
            state: Mutex::new(MergeState::Idle),
            sink,
            table: table.into(),
            rows_merged: U64Counter::default(),
            max_result_rows,
            final_table: Mutex::new(None),
        }
    }

    /// The merger's current state.
    pub fn state(&self) -> MergeState {
        *self.state.lock()
    }

    /// Total rows ingested so far.
    pub fn rows_merged(&self) -> u64 {
        self.rows_merged.fetch()
    }

    /// Whether [`finalize`](Self::finalize) has completed successfully.
    pub fn is_finished(&self) -> bool {
        *self.state.lock() == MergeState::Done
    }

    fn fail(&self, to: MergeState) {
        *self.state.lock() = to;
    }

    /// Ensure the destination table exists, creating it at most once. Holds
    /// the state mutex across the (potentially slow) creation call so two
    /// concurrent first callers can't both attempt it.
    fn ensure_table_created(&self) -> Result<(), MergeError> {
        let mut state = self.state.lock();
        if state.is_terminal() {
            return AlreadyTerminalSnafu.fail();
        }
        if *state == MergeState::Idle {
            *state = MergeState::HeaderParsed;
        }
        if *state == MergeState::HeaderParsed {
            match self.sink.create_table(&self.table) {
                Ok(()) => {
                    *state = MergeState::TableCreated;
                    Ok(())
                }
                Err(e) => {
                    *state = MergeState::CreateTableError;
                    error!(table = %self.table, "create table failed");
                    Err(e)
                }
            }
        } else {
            Ok(())
        }
    }

    /// Ingest one worker result. Safe to call concurrently for results from
    /// different chunks; table creation is serialized internally.
    pub fn merge(&self, result: &ResultMsg) -> Result<(), MergeError> {
        if !result.is_ok() {
            self.fail(MergeState::MergeWriteError);
            return TerminateSnafu {
                detail: result.error_msg.clone(),
            }
            .fail();
        }

        self.ensure_table_created()?;
        {
            let mut state = self.state.lock();
            if *state == MergeState::TableCreated {
                *state = MergeState::RowsLoading;
            }
        }

        let inserted = self.sink.insert_rows(&self.table, result).map_err(|e| {
            self.fail(MergeState::MergeWriteError);
            e
        })?;
        self.rows_merged.inc(inserted);
        let total = self.rows_merged.fetch();

        if let Some(max) = self.max_result_rows {
            if total > max {
                self.fail(MergeState::MergeWriteError);
                return ResultTooBigSnafu.fail();
            }
        }
        Ok(())
    }

    /// Wait for no more results to be in flight (the caller's
    /// responsibility — see the dispatch executive's quiescence check) and
    /// run the coordinator-side final merge query.
    pub fn finalize(&self) -> Result<String, MergeError> {
        {
            let mut state = self.state.lock();
            match *state {
                MergeState::Done => {
                    return Ok(self.final_table.lock().clone().unwrap_or_default());
                }
                s if s.is_terminal() => return AlreadyTerminalSnafu.fail(),
                _ => *state = MergeState::Finalize,
            }
        }
        match self.sink.run_final_merge(&self.table) {
            Ok(final_table) => {
                *self.final_table.lock() = Some(final_table.clone());
                self.fail(MergeState::Done);
                info!(table = %final_table, "merge finalized");
                Ok(final_table)
            }
            Err(e) => {
                self.fail(MergeState::MysqlExecError);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qserv_proto::{RowBundle, RowSchema};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSink {
        create_calls: AtomicUsize,
        fail_create: bool,
        fail_insert: bool,
    }

    impl MergeSink for CountingSink {
        fn create_table(&self, _table: &str) -> Result<(), MergeError> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_create {
                return CreateTableSnafu { detail: "boom" }.fail();
            }
            Ok(())
        }

        fn insert_rows(&self, _table: &str, result: &ResultMsg) -> Result<u64, MergeError> {
            if self.fail_insert {
                return MergeWriteSnafu { detail: "boom" }.fail();
            }
            Ok(result.row.len() as u64)
        }

        fn run_final_merge(&self, table: &str) -> Result<String, MergeError> {
            Ok(format!("{table}_final"))
        }
    }

    fn ok_result(rows: usize) -> ResultMsg {
        ResultMsg {
            session: 1,
            query_id: 1,
            row_schema: RowSchema {
                columns: vec!["id".into()],
            },
            row: (0..rows)
                .map(|_| RowBundle {
                    column: vec![b"1".to_vec()],
                    is_null: vec![false],
                })
                .collect(),
            row_count: rows as u64,
            transmit_size: 0,
            error_code: 0,
            error_msg: String::new(),
            continues: false,
        }
    }

    #[test]
    fn table_is_created_exactly_once_across_merges() {
        let sink = CountingSink::default();
        let merger = InfileMerger::new("result_1", sink, None);
        merger.merge(&ok_result(1)).unwrap();
        merger.merge(&ok_result(2)).unwrap();
        assert_eq!(merger.sink.create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(merger.rows_merged(), 3);
        assert_eq!(merger.state(), MergeState::RowsLoading);
    }

    #[test]
    fn finalize_transitions_to_done_with_final_table_name() {
        let sink = CountingSink::default();
        let merger = InfileMerger::new("result_1", sink, None);
        merger.merge(&ok_result(1)).unwrap();
        let final_table = merger.finalize().unwrap();
        assert_eq!(final_table, "result_1_final");
        assert!(merger.is_finished());
    }

    #[test]
    fn finalize_is_idempotent_once_done() {
        let sink = CountingSink::default();
        let merger = InfileMerger::new("result_1", sink, None);
        merger.merge(&ok_result(1)).unwrap();
        let first = merger.finalize().unwrap();
        let second = merger.finalize().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn worker_error_result_fails_merge_without_touching_sink() {
        let sink = CountingSink::default();
        let merger = InfileMerger::new("result_1", sink, None);
        let mut bad = ok_result(1);
        bad.error_code = 500;
        bad.error_msg = "mysql exec failed".into();
        let err = merger.merge(&bad).unwrap_err();
        assert_eq!(
            err,
            MergeError::Terminate {
                detail: "mysql exec failed".into()
            }
        );
        assert_eq!(merger.state(), MergeState::MergeWriteError);
        assert_eq!(merger.sink.create_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn create_table_failure_is_terminal() {
        let sink = CountingSink {
            fail_create: true,
            ..Default::default()
        };
        let merger = InfileMerger::new("result_1", sink, None);
        assert!(merger.merge(&ok_result(1)).is_err());
        assert_eq!(merger.state(), MergeState::CreateTableError);
        assert!(merger.merge(&ok_result(1)).is_err());
    }

    #[test]
    fn insert_failure_is_terminal() {
        let sink = CountingSink {
            fail_insert: true,
            ..Default::default()
        };
        let merger = InfileMerger::new("result_1", sink, None);
        assert!(merger.merge(&ok_result(1)).is_err());
        assert_eq!(merger.state(), MergeState::MergeWriteError);
    }

    #[test]
    fn result_too_big_is_rejected() {
        let sink = CountingSink::default();
        let merger = InfileMerger::new("result_1", sink, Some(2));
        merger.merge(&ok_result(1)).unwrap();
        let err = merger.merge(&ok_result(5)).unwrap_err();
        assert_eq!(err, MergeError::ResultTooBig);
        assert_eq!(merger.state(), MergeState::MergeWriteError);
    }
}
