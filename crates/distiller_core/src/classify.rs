use crate::Job;

/// Lifecycle bucket of a job, derived from its raw scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum JobCategory {
    Pending,
    Running,
    Complete,
    Failed,
}

const PENDING_STATES: &[&str] = &[
    "INITIALIZING",
    "PENDING",
    "CONFIGURING",
    "REQUEUED",
    "REQUEUE_FED",
    "REQUEUE_HOLD",
    "RESV_DEL_HOLD",
    "SUSPENDED",
    "STOPPED",
];

const RUNNING_STATES: &[&str] = &["RUNNING", "COMPLETING", "SIGNALING", "STAGE_OUT", "RESIZING"];

const COMPLETE_STATES: &[&str] = &["COMPLETED", "CANCELLED"];

const FAILED_STATES: &[&str] = &[
    "BOOT_FAIL",
    "DEADLINE",
    "FAILED",
    "NODE_FAIL",
    "OUT_OF_MEMORY",
    "PREEMPTED",
    "REVOKED",
    "SPECIAL_EXIT",
    "TIMEOUT",
];

/// Every state token the server is known to emit.
pub const KNOWN_JOB_STATES: &[&str] = &[
    "INITIALIZING",
    "PENDING",
    "CONFIGURING",
    "REQUEUED",
    "REQUEUE_FED",
    "REQUEUE_HOLD",
    "RESV_DEL_HOLD",
    "SUSPENDED",
    "STOPPED",
    "RUNNING",
    "COMPLETING",
    "SIGNALING",
    "STAGE_OUT",
    "RESIZING",
    "COMPLETED",
    "CANCELLED",
    "BOOT_FAIL",
    "DEADLINE",
    "FAILED",
    "NODE_FAIL",
    "OUT_OF_MEMORY",
    "PREEMPTED",
    "REVOKED",
    "SPECIAL_EXIT",
    "TIMEOUT",
];

/// Classifies a raw state token. Absent and unknown tokens are `Pending`:
/// that bucket implies neither a runnable nor a finished session.
pub fn classify(state: Option<&str>) -> JobCategory {
    let Some(raw) = state else {
        return JobCategory::Pending;
    };
    let token = raw.trim().to_ascii_uppercase();
    let token = token.as_str();

    if RUNNING_STATES.contains(&token) {
        JobCategory::Running
    } else if COMPLETE_STATES.contains(&token) {
        JobCategory::Complete
    } else if FAILED_STATES.contains(&token) {
        JobCategory::Failed
    } else {
        debug_assert!(
            PENDING_STATES.contains(&token) || !KNOWN_JOB_STATES.contains(&token),
            "known state {token} missing from its bucket"
        );
        JobCategory::Pending
    }
}

impl JobCategory {
    pub fn of(job: &Job) -> Self {
        classify(job.state.as_deref())
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobCategory::Complete | JobCategory::Failed)
    }

    /// Finished jobs are the ones whose scans are expected to exist.
    pub fn scans_expected(self) -> bool {
        self == JobCategory::Complete
    }

    pub fn shows_failure(self) -> bool {
        self == JobCategory::Failed
    }

    pub fn indicator(self) -> Indicator {
        Indicator {
            visible: matches!(self, JobCategory::Pending | JobCategory::Running),
            pulsing: self == JobCategory::Running,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            JobCategory::Pending => "Pending",
            JobCategory::Running => "Running",
            JobCategory::Complete => "Complete",
            JobCategory::Failed => "Failed",
        }
    }

    /// Cancel is offered for running jobs and for pending jobs that the
    /// scheduler has already accepted.
    pub fn cancel_enabled(job: &Job) -> bool {
        match JobCategory::of(job) {
            JobCategory::Running => true,
            JobCategory::Pending => job.slurm_id.is_some(),
            JobCategory::Complete | JobCategory::Failed => false,
        }
    }
}

/// Activity indicator shown next to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Indicator {
    pub visible: bool,
    pub pulsing: bool,
}
