use distiller_core::{Job, JobCreate, JobId, JobListRequest, JobUpdate, MachineStatus, Scan};

use crate::{ApiError, JobPage};

/// The job endpoints the coordinator and session controller depend on.
#[async_trait::async_trait]
pub trait JobsApi: Send + Sync {
    async fn create_job(&self, request: &JobCreate) -> Result<Job, ApiError>;

    async fn list_jobs(&self, request: &JobListRequest) -> Result<JobPage, ApiError>;

    async fn get_job(&self, id: JobId) -> Result<Job, ApiError>;

    async fn job_scans(&self, id: JobId) -> Result<Vec<Scan>, ApiError>;

    /// Cancels the job on the server and returns it as it stands afterwards.
    async fn cancel_job(&self, id: JobId) -> Result<Job, ApiError>;

    async fn update_job(&self, id: JobId, update: &JobUpdate) -> Result<Job, ApiError>;
}

#[async_trait::async_trait]
pub trait MachinesApi: Send + Sync {
    async fn machine_status(&self, machine: &str) -> Result<MachineStatus, ApiError>;
}

/// Admission check for new work on an execution target.
#[async_trait::async_trait]
pub trait MachineStatusProvider: Send + Sync {
    /// Answers from the last known status; never touches the network.
    fn can_run_jobs(&self, machine: &str) -> bool;

    async fn refresh(&self, machine: &str) -> Result<MachineStatus, ApiError>;
}
