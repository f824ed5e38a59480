//! The result merger's per-query state machine.
//!
//! Grounded on `InfileMerger`: progress is strictly forward (`Idle` through
//! `Done`) except for three terminal error branches, one per failure
//! surface (table creation, row ingest, and the coordinator's final merge
//! query).

/// One stage of a query's merge lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    /// No result has arrived yet.
    Idle,
    /// The first result's header has been validated.
    HeaderParsed,
    /// The destination table exists (created at most once).
    TableCreated,
    /// One or more result buffers have been ingested; more may still
    /// arrive.
    RowsLoading,
    /// [`finalize`](super::merger::InfileMerger::finalize) has been called
    /// and the coordinator-side merge query is running.
    Finalize,
    /// Finalization completed; the final table name is available.
    Done,
    /// `CREATE TABLE` failed.
    CreateTableError,
    /// Row ingest failed, or a worker reported a job-level error.
    MergeWriteError,
    /// The final merge query failed.
    MysqlExecError,
}

impl MergeState {
    /// Whether this state ends the query's merge lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            MergeState::Done
                | MergeState::CreateTableError
                | MergeState::MergeWriteError
                | MergeState::MysqlExecError
        )
    }

    /// Whether this state represents a failure.
    pub fn is_error(self) -> bool {
        self.is_terminal() && self != MergeState::Done
    }
}
