use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use distiller_core::{EntityStore, FetchedSet, JobId};
use distiller_logging::{distiller_debug, distiller_info, distiller_warn};
use futures_util::future::{BoxFuture, FutureExt, Shared};

use crate::{ApiError, JobsApi};

/// Process-wide entity store shared by every surface.
pub type SharedStore = Arc<Mutex<EntityStore>>;

type SyncFuture = Shared<BoxFuture<'static, Result<(), ApiError>>>;

#[derive(Default)]
struct SyncState {
    fetched: FetchedSet,
    in_flight: HashMap<JobId, SyncFuture>,
}

/// Mediates every "load scans for job X" request so that concurrent callers
/// share a single outstanding fetch per job.
#[derive(Clone)]
pub struct FetchCoordinator {
    api: Arc<dyn JobsApi>,
    store: SharedStore,
    state: Arc<Mutex<SyncState>>,
}

impl FetchCoordinator {
    pub fn new(api: Arc<dyn JobsApi>, store: SharedStore) -> Self {
        Self {
            api,
            store,
            state: Arc::new(Mutex::new(SyncState::default())),
        }
    }

    pub fn has_synced(&self, job_id: JobId) -> bool {
        lock(&self.state).fetched.contains(job_id)
    }

    pub fn fetched_ids(&self) -> FetchedSet {
        lock(&self.state).fetched.clone()
    }

    /// Forgets that `job_id` was synced; the next `ensure_synced` refetches.
    /// A fetch already in flight is left alone.
    pub fn invalidate(&self, job_id: JobId) -> bool {
        lock(&self.state).fetched.invalidate(job_id)
    }

    /// Makes sure the job's scans are in the store.
    ///
    /// Returns immediately once synced. Otherwise joins the fetch in flight
    /// for this job, or starts one. A failed fetch leaves the job unsynced and
    /// reports the same error to every caller that joined it.
    pub async fn ensure_synced(&self, job_id: JobId) -> Result<(), ApiError> {
        let fetch = {
            // Check and register under one lock: no await point in between.
            let mut state = lock(&self.state);
            if state.fetched.contains(job_id) {
                return Ok(());
            }
            match state.in_flight.get(&job_id) {
                Some(fetch) => {
                    distiller_debug!("Joining in-flight scan fetch for job {}", job_id);
                    fetch.clone()
                }
                None => {
                    let fetch = self.start_fetch(job_id);
                    state.in_flight.insert(job_id, fetch.clone());
                    fetch
                }
            }
        };
        fetch.await
    }

    fn start_fetch(&self, job_id: JobId) -> SyncFuture {
        distiller_info!("Fetching scans for job {}", job_id);
        let api = self.api.clone();
        let store = self.store.clone();
        let state = self.state.clone();

        async move {
            // The store and the sync state are never locked together.
            let result = api.job_scans(job_id).await.map(|scans| {
                let count = scans.len();
                lock(&store).merge_scans(job_id, scans);
                distiller_debug!("Merged {} scans for job {}", count, job_id);
            });

            let mut sync = lock(&state);
            sync.in_flight.remove(&job_id);
            match &result {
                Ok(()) => {
                    sync.fetched.insert(job_id);
                }
                Err(err) => {
                    distiller_warn!("Scan fetch for job {} failed: {}", job_id, err);
                }
            }
            result
        }
        .boxed()
        .shared()
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
