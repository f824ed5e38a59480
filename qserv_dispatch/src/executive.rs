//! The coordinator-side owner of every job dispatched for one user query.
//!
//! Grounded on `Executive`/`QueryResource`: a mutex-guarded map from
//! `(chunkId, fragmentIndex)` to a job, a retry policy built on
//! [`backoff::BackoffConfig`] for transiently-unavailable resources, and a
//! cooperative cancellation flag that every subsequent state transition
//! checks before acting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use observability_deps::tracing::{info, warn};
use qserv_proto::ResourceUnit;
use snafu::prelude::*;
use trace::{SpanContext, SpanRecorder};

use crate::job::{JobState, JobStatus};
use crate::message_store::{MessageStore, Severity};

/// Per-job, per-transport error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    Provision,
    Request,
    ResponseData,
    ResponseMd5,
    HeaderImport,
    HeaderOverflow,
}

/// The transport status codes the dispatcher will retry on a
/// `RequestError`: retry iff the code is in a retryable set, with bounded
/// attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub backoff: backoff::BackoffConfig,
    pub max_provision_attempts: u32,
    pub retryable_request_codes: Vec<i32>,
}

impl Default for RetryPolicy {
    fn default() -> RetryPolicy {
        RetryPolicy {
            backoff: backoff::BackoffConfig::default(),
            max_provision_attempts: 3,
            // Matches the original's transient resource-unavailable codes:
            // "temporarily unavailable" and "try again".
            retryable_request_codes: vec![11, 62],
        }
    }
}

impl RetryPolicy {
    fn is_retryable_request(&self, code: i32) -> bool {
        self.retryable_request_codes.contains(&code)
    }
}

/// One `(chunkId, fragmentIndex)` unit of dispatched work.
#[derive(Debug)]
pub struct Job {
    pub chunk_id: i32,
    pub fragment_index: i32,
    pub status: JobStatus,
    attempts: AtomicU32,
    re_provisioned: AtomicBool,
    span: SpanRecorder,
}

impl Job {
    /// Number of provision attempts made so far (starts at 0).
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Relaxed)
    }
}

/// Errors produced while driving a job through its state machine.
#[derive(Debug, Snafu, PartialEq, Eq)]
pub enum ExecutiveError {
    #[snafu(display("no such job: chunk {chunk_id} fragment {fragment_index}"))]
    NoSuchJob { chunk_id: i32, fragment_index: i32 },

    #[snafu(display("query was cancelled"))]
    Cancelled,
}

/// Owns every job for one user query: the job map, the cancellation flag,
/// and the query-scoped [`MessageStore`].
#[derive(Debug)]
pub struct Executive {
    jobs: parking_lot::Mutex<HashMap<(i32, i32), Arc<Job>>>,
    cancelled: AtomicBool,
    messages: Arc<MessageStore>,
    retry_policy: RetryPolicy,
    trace_ctx: Option<SpanContext>,
}

impl Executive {
    /// A fresh executive with no jobs yet, using `retry_policy` for
    /// transient transport failures.
    pub fn new(retry_policy: RetryPolicy) -> Executive {
        Executive {
            jobs: parking_lot::Mutex::new(HashMap::new()),
            cancelled: AtomicBool::new(false),
            messages: Arc::new(MessageStore::new()),
            retry_policy,
            trace_ctx: None,
        }
    }

    /// A fresh executive that records one span per job under `trace_ctx`,
    /// for a collector to reconstruct this query's timeline.
    pub fn with_trace_context(retry_policy: RetryPolicy, trace_ctx: SpanContext) -> Executive {
        Executive {
            trace_ctx: Some(trace_ctx),
            ..Executive::new(retry_policy)
        }
    }

    /// The query-scoped message store, for callers (e.g. the result
    /// merger) that also need to record events against this query.
    pub fn messages(&self) -> Arc<MessageStore> {
        Arc::clone(&self.messages)
    }

    /// Whether the query has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Register a new job for `(chunk_id, fragment_index)`, addressed at
    /// `resource`.
    pub fn add_job(&self, chunk_id: i32, fragment_index: i32, resource: ResourceUnit) -> Arc<Job> {
        let job = Arc::new(Job {
            chunk_id,
            fragment_index,
            status: JobStatus::new(&resource),
            attempts: AtomicU32::new(0),
            re_provisioned: AtomicBool::new(false),
            span: SpanRecorder::new(
                self.trace_ctx.as_ref(),
                format!("dispatch.job.{chunk_id}.{fragment_index}"),
            ),
        });
        self.jobs.lock().insert((chunk_id, fragment_index), Arc::clone(&job));
        job
    }

    fn job(&self, chunk_id: i32, fragment_index: i32) -> Result<Arc<Job>, ExecutiveError> {
        self.jobs
            .lock()
            .get(&(chunk_id, fragment_index))
            .cloned()
            .context(NoSuchJobSnafu {
                chunk_id,
                fragment_index,
            })
    }

    /// Every job currently tracked, in no particular order.
    pub fn all_jobs(&self) -> Vec<Arc<Job>> {
        self.jobs.lock().values().cloned().collect()
    }

    /// Cooperatively cancel the whole query: every job still in flight
    /// moves to `Cancelled`, and all future transitions on any job become
    /// no-ops. Idempotent and safe to call concurrently with anything else.
    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        for job in self.jobs.lock().values() {
            if !job.status.state().is_terminal() {
                job.status.update(JobState::Cancelled, 0, "cancelled");
            }
        }
        self.messages.add_message(-1, 0, "query cancelled", Severity::Info);
    }

    fn guarded_update(&self, job: &Job, state: JobState, code: i32, desc: impl Into<String>) {
        if self.is_cancelled() {
            return;
        }
        let desc = desc.into();
        job.span.event(desc.clone());
        job.status.update(state, code, desc);
    }

    /// Begin provisioning the resource for a job: `Unknown -> Provision`.
    pub fn provision(&self, chunk_id: i32, fragment_index: i32) -> Result<(), ExecutiveError> {
        let job = self.job(chunk_id, fragment_index)?;
        job.attempts.fetch_add(1, Ordering::SeqCst);
        self.guarded_update(&job, JobState::Provision, 0, "provisioning");
        Ok(())
    }

    /// Deliver the result of a provision attempt. `success == false` means
    /// the resource was transiently unavailable (`PROVISION_NACK`); the
    /// dispatcher retries up to `max_provision_attempts` times before
    /// giving up with `PROVISION_ERROR`.
    pub fn provision_result(
        &self,
        chunk_id: i32,
        fragment_index: i32,
        success: bool,
        code: i32,
    ) -> Result<(), ExecutiveError> {
        let job = self.job(chunk_id, fragment_index)?;
        if self.is_cancelled() {
            return Ok(());
        }
        if success {
            self.guarded_update(&job, JobState::ProvisionOk, 0, "provisioned");
            self.messages.add_message(chunk_id, 0, "PROVISION_OK", Severity::Info);
            self.guarded_update(&job, JobState::Request, 0, "requesting");
            return Ok(());
        }

        self.guarded_update(&job, JobState::ProvisionNack, code, "resource unavailable");
        self.messages
            .add_message(chunk_id, code, "PROVISION_NACK", Severity::Info);
        if job.attempts() >= self.retry_policy.max_provision_attempts {
            self.guarded_update(&job, JobState::ProvisionError, code, "gave up provisioning");
            self.messages
                .add_message(chunk_id, code, "PROVISION_ERROR: retries exhausted", Severity::Error);
            warn!(chunk_id, fragment_index, "provisioning failed permanently");
        } else {
            self.provision(chunk_id, fragment_index)?;
            info!(chunk_id, fragment_index, attempt = job.attempts(), "retrying provision");
        }
        Ok(())
    }

    /// Deliver the result of submitting the request once provisioned.
    /// `TransportError::Request` with a retryable `code` causes one
    /// re-provision attempt; any other code is terminal for the job.
    pub fn request_result(
        &self,
        chunk_id: i32,
        fragment_index: i32,
        success: bool,
        code: i32,
    ) -> Result<(), ExecutiveError> {
        let job = self.job(chunk_id, fragment_index)?;
        if self.is_cancelled() {
            return Ok(());
        }
        if success {
            self.guarded_update(&job, JobState::ResponseReady, 0, "response ready");
            return Ok(());
        }

        self.guarded_update(&job, JobState::RequestError, code, "request failed");
        if self.retry_policy.is_retryable_request(code) && !job.re_provisioned.swap(true, Ordering::SeqCst) {
            self.messages
                .add_message(chunk_id, code, "REQUEST_ERROR: re-provisioning", Severity::Info);
            self.provision(chunk_id, fragment_index)?;
        } else {
            self.messages
                .add_message(chunk_id, code, "REQUEST_ERROR: terminal", Severity::Error);
        }
        Ok(())
    }

    /// Deliver one response data buffer (`RESPONSE_DATA`), or the terminal
    /// error if the transport reported a framing/MD5 problem.
    pub fn response_data(
        &self,
        chunk_id: i32,
        fragment_index: i32,
        error: Option<TransportError>,
    ) -> Result<(), ExecutiveError> {
        let job = self.job(chunk_id, fragment_index)?;
        if self.is_cancelled() {
            return Ok(());
        }
        match error {
            None => self.guarded_update(&job, JobState::ResponseData, 0, "data delivered"),
            Some(e) => {
                self.guarded_update(&job, JobState::ResponseDataError, 0, format!("{e:?}"));
                self.messages.add_message(
                    chunk_id,
                    0,
                    format!("RESPONSE_DATA_ERROR: {e:?}"),
                    Severity::Error,
                );
            }
        }
        Ok(())
    }

    /// Mark a job's response stream exhausted.
    pub fn response_done(&self, chunk_id: i32, fragment_index: i32) -> Result<(), ExecutiveError> {
        let job = self.job(chunk_id, fragment_index)?;
        self.guarded_update(&job, JobState::ResponseDone, 0, "response done");
        Ok(())
    }

    /// Deliver the result of the merger ingesting this job's rows.
    pub fn merge_result(&self, chunk_id: i32, fragment_index: i32, success: bool) -> Result<(), ExecutiveError> {
        let job = self.job(chunk_id, fragment_index)?;
        if self.is_cancelled() {
            return Ok(());
        }
        if success {
            self.guarded_update(&job, JobState::MergeOk, 0, "merged");
            self.guarded_update(&job, JobState::Complete, 0, "complete");
        } else {
            self.guarded_update(&job, JobState::MergeError, 0, "merge failed");
            self.messages.add_message(chunk_id, 0, "MERGE_ERROR", Severity::Error);
        }
        Ok(())
    }

    /// The first terminal error state among all jobs, if any — reported as
    /// the query's overall failure while the rest of the messages continue
    /// to accumulate until quiescence.
    pub fn first_error(&self) -> Option<JobState> {
        self.jobs
            .lock()
            .values()
            .map(|j| j.status.state())
            .find(|s| s.is_error())
    }

    /// Whether every job has reached a terminal state.
    pub fn is_quiescent(&self) -> bool {
        self.jobs.lock().values().all(|j| j.status.state().is_terminal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;
    use trace::{Span, TraceCollector};

    fn executive() -> Executive {
        Executive::new(RetryPolicy::default())
    }

    #[derive(Debug, Default)]
    struct CollectInto(StdMutex<Vec<Span>>);

    impl TraceCollector for CollectInto {
        fn export(&self, span: Span) {
            self.0.lock().unwrap().push(span);
        }
    }

    #[test]
    fn jobs_export_spans_when_traced() {
        let collector = Arc::new(CollectInto::default());
        let ctx = SpanContext::new(Some(collector.clone() as Arc<dyn trace::TraceCollector>));
        let exec = Executive::with_trace_context(RetryPolicy::default(), ctx);
        exec.add_job(1, 0, ResourceUnit::as_cquery("LSST", 1));
        exec.provision(1, 0).unwrap();
        exec.provision_result(1, 0, true, 0).unwrap();
        exec.request_result(1, 0, true, 0).unwrap();
        drop(exec);

        let spans = collector.0.lock().unwrap();
        assert_eq!(spans.len(), 1);
        assert!(!spans[0].events.is_empty());
    }

    #[test]
    fn provision_nack_then_success() {
        let exec = executive();
        let resource = ResourceUnit::as_cquery("LSST", 7);
        exec.add_job(7, 0, resource);
        exec.provision(7, 0).unwrap();
        exec.provision_result(7, 0, false, 62).unwrap();
        assert_eq!(exec.job(7, 0).unwrap().status.state(), JobState::Provision);
        exec.provision_result(7, 0, true, 0).unwrap();
        assert_eq!(exec.job(7, 0).unwrap().status.state(), JobState::Request);
        assert_eq!(exec.messages().message_count(), 2);
        assert!(!exec.messages().has_errors());
    }

    #[test]
    fn provision_gives_up_after_max_attempts() {
        let mut policy = RetryPolicy::default();
        policy.max_provision_attempts = 2;
        let exec = Executive::new(policy);
        exec.add_job(1, 0, ResourceUnit::as_cquery("LSST", 1));
        exec.provision(1, 0).unwrap();
        exec.provision_result(1, 0, false, 62).unwrap();
        exec.provision_result(1, 0, false, 62).unwrap();
        assert_eq!(exec.job(1, 0).unwrap().status.state(), JobState::ProvisionError);
        assert!(exec.messages().has_errors());
    }

    #[test]
    fn retryable_request_error_reprovisions_once() {
        let exec = executive();
        exec.add_job(1, 0, ResourceUnit::as_cquery("LSST", 1));
        exec.provision(1, 0).unwrap();
        exec.provision_result(1, 0, true, 0).unwrap();
        exec.request_result(1, 0, false, 62).unwrap();
        assert_eq!(exec.job(1, 0).unwrap().status.state(), JobState::Provision);
    }

    #[test]
    fn non_retryable_request_error_is_terminal() {
        let exec = executive();
        exec.add_job(1, 0, ResourceUnit::as_cquery("LSST", 1));
        exec.provision(1, 0).unwrap();
        exec.provision_result(1, 0, true, 0).unwrap();
        exec.request_result(1, 0, false, 500).unwrap();
        assert_eq!(exec.job(1, 0).unwrap().status.state(), JobState::RequestError);
        assert!(exec.messages().has_errors());
    }

    #[test]
    fn cancellation_mid_flight_is_idempotent() {
        let exec = executive();
        exec.add_job(1, 0, ResourceUnit::as_cquery("LSST", 1));
        exec.provision(1, 0).unwrap();
        exec.provision_result(1, 0, true, 0).unwrap();
        exec.cancel();
        exec.cancel();
        exec.cancel();
        assert_eq!(exec.job(1, 0).unwrap().status.state(), JobState::Cancelled);
        // Further transitions are no-ops once cancelled.
        exec.response_data(1, 0, None).unwrap();
        assert_eq!(exec.job(1, 0).unwrap().status.state(), JobState::Cancelled);
    }

    #[test]
    fn full_pipeline_reaches_complete() {
        let exec = executive();
        exec.add_job(1, 0, ResourceUnit::as_cquery("LSST", 1));
        exec.provision(1, 0).unwrap();
        exec.provision_result(1, 0, true, 0).unwrap();
        exec.request_result(1, 0, true, 0).unwrap();
        exec.response_data(1, 0, None).unwrap();
        exec.response_done(1, 0).unwrap();
        exec.merge_result(1, 0, true).unwrap();
        assert_eq!(exec.job(1, 0).unwrap().status.state(), JobState::Complete);
        assert!(exec.is_quiescent());
        assert!(exec.first_error().is_none());
    }

    #[test]
    fn unknown_job_is_an_error() {
        let exec = executive();
        assert_eq!(
            exec.provision(99, 0),
            Err(ExecutiveError::NoSuchJob {
                chunk_id: 99,
                fragment_index: 0
            })
        );
    }
}
