//! The per-job state machine: one `(chunkId, fragmentIndex)` unit of work
//! tracked from `Unknown` through to `Complete` or a terminal error.
//!
//! Grounded on `JobStatus`/`JobState`: every transition goes through a
//! single mutex-guarded entry point and is timestamped, so that concurrent
//! reads of a job's state always see a consistent, monotonically advancing
//! sequence of `(state, stateTime)` pairs.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use qserv_proto::ResourceUnit;

/// One step of a per-job dispatch pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Unknown,
    Provision,
    ProvisionOk,
    ProvisionError,
    ProvisionNack,
    Request,
    RequestError,
    ResponseReady,
    ResponseError,
    ResponseData,
    ResponseDataError,
    ResponseDone,
    ResultError,
    MergeOk,
    MergeError,
    Complete,
    Cancelled,
}

impl JobState {
    /// Whether this state ends the job's lifecycle (success or failure).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Complete
                | JobState::ProvisionError
                | JobState::RequestError
                | JobState::ResponseError
                | JobState::ResponseDataError
                | JobState::ResultError
                | JobState::MergeError
                | JobState::Cancelled
        )
    }

    /// Whether this state represents an error (as opposed to a successful
    /// terminal state or an in-progress one).
    pub fn is_error(self) -> bool {
        self.is_terminal() && !matches!(self, JobState::Complete | JobState::Cancelled)
    }
}

/// Process-wide monotonic clock standing in for wall-clock timestamps: only
/// relative order matters for the monotonicity invariant, and a counter
/// avoids any platform clock-resolution flakiness in tests.
static CLOCK: AtomicU64 = AtomicU64::new(0);

fn tick() -> u64 {
    CLOCK.fetch_add(1, Ordering::Relaxed)
}

/// A single `(state, stateTime, stateCode, stateDesc)` snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStatusInfo {
    pub resource_unit: String,
    pub state: JobState,
    pub state_time: u64,
    pub state_code: i32,
    pub state_desc: String,
}

/// The mutex-guarded, timestamped status of one job. All reads and writes
/// go through [`JobStatus::update`], mirroring the original's single
/// `updateInfo` entry point.
#[derive(Debug)]
pub struct JobStatus {
    info: Mutex<JobStatusInfo>,
}

impl JobStatus {
    /// A freshly created job, addressed at `resource`, starting in
    /// `Unknown`.
    pub fn new(resource: &ResourceUnit) -> JobStatus {
        JobStatus {
            info: Mutex::new(JobStatusInfo {
                resource_unit: resource.to_string(),
                state: JobState::Unknown,
                state_time: tick(),
                state_code: 0,
                state_desc: String::new(),
            }),
        }
    }

    /// Move to `state`, recording `code`/`desc` and a fresh timestamp.
    /// Every transition, regardless of caller, goes through here so the
    /// `stateTime` sequence is strictly non-decreasing.
    pub fn update(&self, state: JobState, code: i32, desc: impl Into<String>) {
        let mut info = self.info.lock();
        info.state = state;
        info.state_time = tick();
        info.state_code = code;
        info.state_desc = desc.into();
    }

    /// A snapshot of the current status.
    pub fn snapshot(&self) -> JobStatusInfo {
        self.info.lock().clone()
    }

    /// The current state only.
    pub fn state(&self) -> JobState {
        self.info.lock().state
    }
}
