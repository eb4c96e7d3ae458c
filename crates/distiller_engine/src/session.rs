use std::sync::{Arc, Mutex};

use distiller_core::{
    update, Job, JobCategory, JobCreate, JobId, JobType, Params, RejectReason, SessionEffect,
    SessionMsg, SessionState,
};
use distiller_logging::{distiller_debug, distiller_info, distiller_warn};
use thiserror::Error;

use crate::coordinator::lock;
use crate::{ApiError, JobsApi, MachineStatusProvider, SharedStore};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("a streaming session is already active")]
    SessionActive,
    #[error("machine {0} cannot run jobs right now")]
    MachineUnavailable(String),
    #[error("no active session to cancel")]
    NoActiveSession,
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// What became of a cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The server accepted the cancel; the job has not reported an end yet.
    Requested,
    /// The job reached a terminal state; the session is over.
    Cancelled,
    /// A cancel for this session was already outstanding.
    AlreadyCancelling,
    /// The response belonged to a session that is no longer current.
    Stale,
}

/// Executes the session state machine's effects against the server and
/// keeps the single active-session pointer.
pub struct SessionController {
    api: Arc<dyn JobsApi>,
    machines: Arc<dyn MachineStatusProvider>,
    store: SharedStore,
    state: Mutex<SessionState>,
}

impl SessionController {
    pub fn new(
        api: Arc<dyn JobsApi>,
        machines: Arc<dyn MachineStatusProvider>,
        store: SharedStore,
    ) -> Self {
        Self {
            api,
            machines,
            store,
            state: Mutex::new(SessionState::Idle),
        }
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.state)
    }

    pub fn active_session(&self) -> Option<JobId> {
        self.state().active_session()
    }

    /// Refreshes the machine before the start action is offered. Returns
    /// whether the machine currently accepts new work.
    pub async fn prepare_start(&self, machine: &str) -> Result<bool, ApiError> {
        let status = self.machines.refresh(machine).await?;
        Ok(status.can_run_jobs())
    }

    /// Starts a new session. Admission is checked now, against the
    /// machine's current status.
    pub async fn submit(
        &self,
        job_type: JobType,
        machine: &str,
        params: Params,
    ) -> Result<Job, SessionError> {
        let request = JobCreate {
            job_type,
            scan_id: None,
            machine: machine.to_string(),
            params,
        };
        let can_run = self.machines.can_run_jobs(machine);

        let mut created = None;
        for effect in self.dispatch(SessionMsg::SubmitRequested { request, can_run }) {
            match effect {
                SessionEffect::CreateJob(request) => created = Some(self.create(&request).await?),
                SessionEffect::Rejected(reason) => {
                    distiller_warn!("Session submit rejected: {:?}", reason);
                    return Err(rejection(reason, machine));
                }
                SessionEffect::CancelJob { .. } | SessionEffect::StaleCancelDiscarded { .. } => {}
            }
        }
        created.ok_or(SessionError::SessionActive)
    }

    async fn create(&self, request: &JobCreate) -> Result<Job, SessionError> {
        match self.api.create_job(request).await {
            Ok(job) => {
                distiller_info!("Session job {} created on {}", job.id, request.machine);
                lock(&self.store).upsert_job(job.clone());
                self.dispatch(SessionMsg::SubmitSucceeded { job_id: job.id });
                self.observe(&job);
                Ok(job)
            }
            Err(err) => {
                self.dispatch(SessionMsg::SubmitFailed);
                Err(err.into())
            }
        }
    }

    /// Cancels the active session's job. The pending-cancel flag is set
    /// before the request goes out.
    pub async fn cancel(&self) -> Result<CancelOutcome, SessionError> {
        let mut outcome = CancelOutcome::AlreadyCancelling;
        for effect in self.dispatch(SessionMsg::CancelRequested) {
            match effect {
                SessionEffect::CancelJob { job_id } => outcome = self.cancel_job(job_id).await?,
                SessionEffect::Rejected(reason) => return Err(rejection(reason, "")),
                SessionEffect::CreateJob(_) | SessionEffect::StaleCancelDiscarded { .. } => {}
            }
        }
        Ok(outcome)
    }

    async fn cancel_job(&self, job_id: JobId) -> Result<CancelOutcome, SessionError> {
        distiller_info!("Cancelling session job {}", job_id);
        let result = self.api.cancel_job(job_id).await;
        let (effects, failure) = match result {
            Ok(job) => {
                // The returned job is current server data whether or not the
                // session moved on.
                let category = JobCategory::of(&job);
                lock(&self.store).upsert_job(job);
                (
                    self.dispatch(SessionMsg::CancelAcknowledged { job_id, category }),
                    None,
                )
            }
            Err(err) => (self.dispatch(SessionMsg::CancelFailed { job_id }), Some(err)),
        };

        if effects.contains(&SessionEffect::StaleCancelDiscarded { job_id }) {
            distiller_debug!("Discarding late cancel response for job {}", job_id);
            return Ok(CancelOutcome::Stale);
        }
        if self.state() == (SessionState::Cancelled { job_id }) {
            return Ok(CancelOutcome::Cancelled);
        }
        if let Some(err) = failure {
            distiller_warn!("Cancel for job {} failed: {}", job_id, err);
            return Err(err.into());
        }
        Ok(CancelOutcome::Requested)
    }

    /// Takes up a session started by an earlier run, so it can be cancelled
    /// through this controller. Ignored while another session is tracked or
    /// when the job has already ended.
    pub fn resume(&self, job: &Job) -> SessionState {
        self.dispatch(SessionMsg::Resumed {
            job_id: job.id,
            category: JobCategory::of(job),
        });
        self.state()
    }

    /// Feeds a job entity change into the session. Terminal states of the
    /// session's job end it.
    pub fn observe(&self, job: &Job) {
        self.dispatch(SessionMsg::JobObserved {
            job_id: job.id,
            category: JobCategory::of(job),
        });
    }

    fn dispatch(&self, msg: SessionMsg) -> Vec<SessionEffect> {
        let mut state = lock(&self.state);
        let before = *state;
        let (next, effects) = update(before, msg);
        *state = next;
        if before != next {
            distiller_info!("Session {:?} -> {:?}", before, next);
        }
        effects
    }
}

fn rejection(reason: RejectReason, machine: &str) -> SessionError {
    match reason {
        RejectReason::SessionActive => SessionError::SessionActive,
        RejectReason::MachineUnavailable => SessionError::MachineUnavailable(machine.to_string()),
        RejectReason::NoActiveSession => SessionError::NoActiveSession,
    }
}
