use std::sync::{Arc, Mutex};
use std::time::Duration;

use distiller_core::{
    EntityStore, Job, JobCategory, JobId, JobListRequest, JobRowView, JobType, JobUpdate, Scan,
    SessionsQuery, SessionsViewModel,
};
use distiller_logging::distiller_debug;
use url::Url;

use crate::coordinator::lock;
use crate::{
    ApiError, FetchCoordinator, JobPage, JobsApi, MachineStatusProvider, SessionController,
    SharedStore,
};

/// Owns the shared store and routes every job update through it, so the
/// session controller sees each change exactly where views do.
pub struct JobsService {
    api: Arc<dyn JobsApi>,
    store: SharedStore,
    coordinator: FetchCoordinator,
    session: SessionController,
}

impl JobsService {
    pub fn new(api: Arc<dyn JobsApi>, machines: Arc<dyn MachineStatusProvider>) -> Self {
        let store: SharedStore = Arc::new(Mutex::new(EntityStore::new()));
        Self {
            coordinator: FetchCoordinator::new(api.clone(), store.clone()),
            session: SessionController::new(api.clone(), machines, store.clone()),
            api,
            store,
        }
    }

    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    pub fn coordinator(&self) -> &FetchCoordinator {
        &self.coordinator
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    pub async fn list_jobs(&self, request: &JobListRequest) -> Result<JobPage, ApiError> {
        let page = self.api.list_jobs(request).await?;
        distiller_debug!(
            "Listed {} jobs (total {})",
            page.jobs.len(),
            page.total_count
        );
        lock(&self.store).record_listing(page.jobs.clone(), page.total_count);
        for job in &page.jobs {
            self.session.observe(job);
        }
        Ok(page)
    }

    pub async fn refresh_job(&self, id: JobId) -> Result<Job, ApiError> {
        let job = self.api.get_job(id).await?;
        self.apply_job(job.clone());
        Ok(job)
    }

    /// Merges a job as reported by the server and lets the session react.
    pub fn apply_job(&self, job: Job) {
        lock(&self.store).upsert_job(job.clone());
        self.session.observe(&job);
    }

    pub async fn update_notes(&self, id: JobId, notes: &str) -> Result<Job, ApiError> {
        let update = JobUpdate {
            notes: Some(notes.to_string()),
        };
        let job = self.api.update_job(id, &update).await?;
        self.apply_job(job.clone());
        Ok(job)
    }

    /// Cancels a listed job directly, outside the streaming session.
    pub async fn cancel_job(&self, id: JobId) -> Result<Job, ApiError> {
        let job = self.api.cancel_job(id).await?;
        self.apply_job(job.clone());
        Ok(job)
    }

    pub async fn ensure_synced(&self, id: JobId) -> Result<(), ApiError> {
        self.coordinator.ensure_synced(id).await
    }

    /// Polls the job until it reaches a terminal state or `max_polls` runs out.
    /// Returns the last seen version.
    pub async fn wait_for_terminal(
        &self,
        id: JobId,
        interval: Duration,
        max_polls: usize,
    ) -> Result<Job, ApiError> {
        let mut job = self.refresh_job(id).await?;
        for _ in 1..max_polls {
            if JobCategory::of(&job).is_terminal() {
                break;
            }
            tokio::time::sleep(interval).await;
            job = self.refresh_job(id).await?;
        }
        Ok(job)
    }

    pub fn job(&self, id: JobId) -> Option<Job> {
        lock(&self.store).job(id).cloned()
    }

    pub fn scans_for_job(&self, id: JobId) -> Vec<Scan> {
        lock(&self.store)
            .scans_for_job(id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn job_view(&self, id: JobId) -> Option<JobRowView> {
        let fetched = self.coordinator.fetched_ids();
        let store = lock(&self.store);
        store
            .job(id)
            .map(|job| JobRowView::build(job, &store, &fetched))
    }

    pub fn sessions_view(
        &self,
        query: &SessionsQuery,
        location: &Url,
        job_type: Option<JobType>,
    ) -> SessionsViewModel {
        let fetched = self.coordinator.fetched_ids();
        let session = self.session.state();
        let store = lock(&self.store);
        SessionsViewModel::build(&store, &fetched, session, query, location, job_type)
    }
}
