#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use distiller_core::{Job, JobCreate, JobId, JobListRequest, JobUpdate, MachineStatus, Scan};
use distiller_engine::{ApiError, ApiFailure, JobPage, JobsApi, MachineStatusProvider};
use tokio::sync::Semaphore;

pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(distiller_logging::initialize_for_tests);
}

/// In-memory server. Scan and cancel calls can be held at a gate so tests
/// decide when responses arrive.
#[derive(Default)]
pub struct FakeApi {
    pub jobs: Mutex<HashMap<JobId, Job>>,
    pub scans: Mutex<HashMap<JobId, Vec<Scan>>>,
    pub next_id: Mutex<JobId>,
    pub scan_calls: AtomicUsize,
    pub create_calls: AtomicUsize,
    pub cancel_calls: AtomicUsize,
    pub fail_scans: Mutex<bool>,
    /// State reported by the cancel endpoint.
    pub cancel_state: Mutex<Option<String>>,
    scan_gate: Mutex<Option<Arc<Semaphore>>>,
    cancel_gate: Mutex<Option<Arc<Semaphore>>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self {
            next_id: Mutex::new(1),
            ..Self::default()
        }
    }

    pub fn with_job(self, job: Job) -> Self {
        self.jobs.lock().unwrap().insert(job.id, job);
        self
    }

    pub fn with_scans(self, job_id: JobId, scans: Vec<Scan>) -> Self {
        self.scans.lock().unwrap().insert(job_id, scans);
        self
    }

    /// Holds every scan fetch until the returned semaphore gets permits.
    pub fn gate_scans(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.scan_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn gate_cancels(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.cancel_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn set_state(&self, id: JobId, state: &str) {
        if let Some(job) = self.jobs.lock().unwrap().get_mut(&id) {
            job.state = Some(state.to_string());
        }
    }

    pub fn scan_calls(&self) -> usize {
        self.scan_calls.load(Ordering::SeqCst)
    }

    fn not_found(id: JobId) -> ApiError {
        ApiError::new(ApiFailure::HttpStatus(404), format!("job {id} not found"))
    }
}

async fn pass(gate: Option<Arc<Semaphore>>) {
    if let Some(gate) = gate {
        gate.acquire().await.unwrap().forget();
    }
}

#[async_trait::async_trait]
impl JobsApi for FakeApi {
    async fn create_job(&self, request: &JobCreate) -> Result<Job, ApiError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let id = {
            let mut next = self.next_id.lock().unwrap();
            let id = *next;
            *next += 1;
            id
        };
        let mut job = Job::new(id, request.job_type).with_state("PENDING");
        job.machine = request.machine.clone();
        job.params = request.params.clone();
        self.jobs.lock().unwrap().insert(id, job.clone());
        Ok(job)
    }

    async fn list_jobs(&self, request: &JobListRequest) -> Result<JobPage, ApiError> {
        let mut jobs: Vec<Job> = self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|job| request.job_type.is_none_or(|wanted| job.job_type == wanted))
            .cloned()
            .collect();
        jobs.sort_by(|a, b| b.id.cmp(&a.id));
        let total_count = jobs.len() as i64;
        Ok(JobPage { jobs, total_count })
    }

    async fn get_job(&self, id: JobId) -> Result<Job, ApiError> {
        self.jobs
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| Self::not_found(id))
    }

    async fn job_scans(&self, id: JobId) -> Result<Vec<Scan>, ApiError> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.scan_gate.lock().unwrap().clone();
        pass(gate).await;
        if *self.fail_scans.lock().unwrap() {
            return Err(ApiError::new(ApiFailure::HttpStatus(500), "boom"));
        }
        Ok(self.scans.lock().unwrap().get(&id).cloned().unwrap_or_default())
    }

    async fn cancel_job(&self, id: JobId) -> Result<Job, ApiError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.cancel_gate.lock().unwrap().clone();
        pass(gate).await;
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(&id).ok_or_else(|| Self::not_found(id))?;
        if let Some(state) = self.cancel_state.lock().unwrap().clone() {
            job.state = Some(state);
        }
        Ok(job.clone())
    }

    async fn update_job(&self, id: JobId, update: &JobUpdate) -> Result<Job, ApiError> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs.get_mut(&id).ok_or_else(|| Self::not_found(id))?;
        if let Some(notes) = &update.notes {
            job.notes = Some(notes.clone());
        }
        Ok(job.clone())
    }
}

/// Machine statuses fixed by the test; `refresh` just reports them.
#[derive(Default)]
pub struct FakeMachines {
    pub statuses: Mutex<HashMap<String, MachineStatus>>,
}

impl FakeMachines {
    pub fn with(machine: &str, status: MachineStatus) -> Self {
        let machines = Self::default();
        machines.set(machine, status);
        machines
    }

    pub fn set(&self, machine: &str, status: MachineStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(machine.to_string(), status);
    }
}

#[async_trait::async_trait]
impl MachineStatusProvider for FakeMachines {
    fn can_run_jobs(&self, machine: &str) -> bool {
        self.statuses
            .lock()
            .unwrap()
            .get(machine)
            .is_some_and(|status| status.can_run_jobs())
    }

    async fn refresh(&self, machine: &str) -> Result<MachineStatus, ApiError> {
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .get(machine)
            .copied()
            .unwrap_or_default())
    }
}
