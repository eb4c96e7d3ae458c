use crate::{JobCategory, JobCreate, JobId};

/// Lifecycle of the single streaming session this client tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    /// Creation request in flight; no job id yet.
    Starting,
    Running {
        job_id: JobId,
    },
    /// Cancel issued for `job_id`; waiting for the server to report it ended.
    Cancelling {
        job_id: JobId,
    },
    /// The cancelled job reached a terminal state. Behaves like `Idle`.
    Cancelled {
        job_id: JobId,
    },
}

impl SessionState {
    /// The job id of the started-but-not-yet-terminal session, if any.
    pub fn active_session(&self) -> Option<JobId> {
        match *self {
            SessionState::Running { job_id } | SessionState::Cancelling { job_id } => Some(job_id),
            SessionState::Idle | SessionState::Starting | SessionState::Cancelled { .. } => None,
        }
    }

    pub fn pending_cancel(&self) -> bool {
        matches!(self, SessionState::Cancelling { .. })
    }

    /// Only one streaming session is representable at a time.
    pub fn accepts_submit(&self) -> bool {
        matches!(self, SessionState::Idle | SessionState::Cancelled { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionMsg {
    /// User asked to start a session. `can_run` is the admission check,
    /// evaluated at the moment of submission.
    SubmitRequested { request: JobCreate, can_run: bool },
    SubmitSucceeded { job_id: JobId },
    SubmitFailed,
    CancelRequested,
    /// The server answered a cancel request with the job in `category`.
    CancelAcknowledged { job_id: JobId, category: JobCategory },
    CancelFailed { job_id: JobId },
    /// A job entity changed in the shared store.
    JobObserved { job_id: JobId, category: JobCategory },
    /// A session started in an earlier run is picked up again.
    Resumed { job_id: JobId, category: JobCategory },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    SessionActive,
    MachineUnavailable,
    NoActiveSession,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    CreateJob(JobCreate),
    CancelJob { job_id: JobId },
    Rejected(RejectReason),
    /// A cancel outcome arrived for a job that is no longer being cancelled.
    StaleCancelDiscarded { job_id: JobId },
}

/// Pure update function: applies a message to the session state and returns
/// any effects to execute.
pub fn update(state: SessionState, msg: SessionMsg) -> (SessionState, Vec<SessionEffect>) {
    match msg {
        SessionMsg::SubmitRequested { request, can_run } => {
            if !state.accepts_submit() {
                return (state, vec![SessionEffect::Rejected(RejectReason::SessionActive)]);
            }
            if !can_run {
                return (
                    state,
                    vec![SessionEffect::Rejected(RejectReason::MachineUnavailable)],
                );
            }
            (SessionState::Starting, vec![SessionEffect::CreateJob(request)])
        }
        SessionMsg::SubmitSucceeded { job_id } => match state {
            SessionState::Starting => (SessionState::Running { job_id }, Vec::new()),
            other => (other, Vec::new()),
        },
        SessionMsg::SubmitFailed => match state {
            SessionState::Starting => (SessionState::Idle, Vec::new()),
            other => (other, Vec::new()),
        },
        SessionMsg::CancelRequested => match state {
            SessionState::Running { job_id } => (
                SessionState::Cancelling { job_id },
                vec![SessionEffect::CancelJob { job_id }],
            ),
            // Already cancelling: the outstanding request stands.
            SessionState::Cancelling { .. } => (state, Vec::new()),
            other => (
                other,
                vec![SessionEffect::Rejected(RejectReason::NoActiveSession)],
            ),
        },
        SessionMsg::CancelAcknowledged { job_id, category } => match state {
            SessionState::Cancelling { job_id: current } if current == job_id => {
                if category.is_terminal() {
                    (SessionState::Cancelled { job_id }, Vec::new())
                } else {
                    (state, Vec::new())
                }
            }
            // The job was already seen ending; the answer agrees with it.
            SessionState::Cancelled { job_id: current } if current == job_id => {
                (state, Vec::new())
            }
            other => (other, vec![SessionEffect::StaleCancelDiscarded { job_id }]),
        },
        SessionMsg::CancelFailed { job_id } => match state {
            SessionState::Cancelling { job_id: current } if current == job_id => {
                (SessionState::Running { job_id }, Vec::new())
            }
            SessionState::Cancelled { job_id: current } if current == job_id => {
                (state, Vec::new())
            }
            other => (other, vec![SessionEffect::StaleCancelDiscarded { job_id }]),
        },
        SessionMsg::JobObserved { job_id, category } => {
            if !category.is_terminal() {
                return (state, Vec::new());
            }
            match state {
                SessionState::Cancelling { job_id: current } if current == job_id => {
                    (SessionState::Cancelled { job_id }, Vec::new())
                }
                SessionState::Running { job_id: current } if current == job_id => {
                    (SessionState::Idle, Vec::new())
                }
                other => (other, Vec::new()),
            }
        }
        SessionMsg::Resumed { job_id, category } => {
            if state.accepts_submit() && !category.is_terminal() {
                (SessionState::Running { job_id }, Vec::new())
            } else {
                (state, Vec::new())
            }
        }
    }
}
