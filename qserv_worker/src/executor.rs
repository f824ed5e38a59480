//! Runs one worker [`Task`]'s fragments against a caller-supplied row
//! source and assembles the result into a [`ResultMsg`].
//!
//! Grounded on `wbase::Task`/`FileChannelShared`: cancellation is
//! cooperative, checked at fragment and row boundaries via
//! [`Task::is_poisoned`], never preempting mid-row. A poisoned task still
//! produces a well-formed (if partial) result rather than simply dropping
//! the connection.

use observability_deps::tracing::warn;
use qserv_proto::{Fragment, ResultMsg, RowBundle, RowSchema};

use crate::row_packer::{Row, WorkerError};
use crate::task::Task;

/// A query engine error code surfaced in a [`ResultMsg`] that is not a
/// transport- or buffer-level [`WorkerError`].
const GENERIC_ERROR_CODE: i32 = 1;
/// The error code used to report a cooperatively cancelled task.
const CANCELLED_ERROR_CODE: i32 = 2;

/// Executes one task's fragments in order.
pub struct TaskExecutor<'a> {
    task: &'a Task,
}

impl<'a> TaskExecutor<'a> {
    pub fn new(task: &'a Task) -> TaskExecutor<'a> {
        TaskExecutor { task }
    }

    /// Run every fragment via `run_fragment`, which synchronously executes
    /// the fragment's SQL and returns its rows. Checks
    /// [`Task::is_poisoned`] before each fragment and each row; on
    /// cancellation, returns whatever rows were already gathered along with
    /// a `Cancelled`-coded error.
    pub fn execute(
        &self,
        session: i32,
        query_id: i32,
        schema: RowSchema,
        mut run_fragment: impl FnMut(&Fragment) -> Result<Vec<Row>, WorkerError>,
    ) -> ResultMsg {
        let mut bundles = Vec::new();
        let mut row_count = 0u64;

        for fragment in &self.task.fragments {
            if self.task.is_poisoned() {
                warn!(chunk_id = self.task.chunk_id, "task cancelled before fragment start");
                return self.cancelled_result(session, query_id, schema, bundles, row_count);
            }
            let rows = match run_fragment(fragment) {
                Ok(rows) => rows,
                Err(err) => {
                    warn!(chunk_id = self.task.chunk_id, %err, "fragment execution failed");
                    return self.error_result(session, query_id, schema, err);
                }
            };
            for row in rows {
                if self.task.is_poisoned() {
                    return self.cancelled_result(session, query_id, schema, bundles, row_count);
                }
                let is_null: Vec<bool> = row.iter().map(Option::is_none).collect();
                let column: Vec<Vec<u8>> = row.into_iter().map(|c| c.unwrap_or_default()).collect();
                bundles.push(RowBundle { column, is_null });
                row_count += 1;
            }
        }

        ResultMsg {
            session,
            query_id,
            row_schema: schema,
            row: bundles,
            row_count,
            transmit_size: 0,
            error_code: 0,
            error_msg: String::new(),
            continues: false,
        }
    }

    fn cancelled_result(
        &self,
        session: i32,
        query_id: i32,
        schema: RowSchema,
        row: Vec<RowBundle>,
        row_count: u64,
    ) -> ResultMsg {
        ResultMsg {
            session,
            query_id,
            row_schema: schema,
            row,
            row_count,
            transmit_size: 0,
            error_code: CANCELLED_ERROR_CODE,
            error_msg: "task cancelled".into(),
            continues: false,
        }
    }

    fn error_result(&self, session: i32, query_id: i32, schema: RowSchema, err: WorkerError) -> ResultMsg {
        ResultMsg {
            session,
            query_id,
            row_schema: schema,
            row: Vec::new(),
            row_count: 0,
            transmit_size: 0,
            error_code: GENERIC_ERROR_CODE,
            error_msg: err.to_string(),
            continues: false,
        }
    }
}
