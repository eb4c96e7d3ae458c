use chrono::{DateTime, NaiveDate, Utc};
use url::Url;

use crate::{
    group_by_date, EntityStore, FetchedSet, Indicator, Job, JobCategory, JobId, JobType,
    SessionState, SessionsQuery,
};

/// What a surface can say about a job's scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanSummary {
    /// Not synced yet; the store's view of this job's scans is not trusted.
    NotSynced,
    Empty,
    Loaded(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobRowView {
    pub job_id: JobId,
    pub job_type: JobType,
    pub state: Option<String>,
    pub category: JobCategory,
    pub indicator: Indicator,
    pub cancel_enabled: bool,
    pub shows_failure: bool,
    pub has_output: bool,
    pub notes: String,
    pub submit: Option<DateTime<Utc>>,
    pub scans: ScanSummary,
}

impl JobRowView {
    pub fn build(job: &Job, store: &EntityStore, fetched: &FetchedSet) -> Self {
        let category = JobCategory::of(job);
        let scans = if fetched.contains(job.id) {
            match store.scans_for_job(job.id).len() {
                0 => ScanSummary::Empty,
                count => ScanSummary::Loaded(count),
            }
        } else {
            ScanSummary::NotSynced
        };
        Self {
            job_id: job.id,
            job_type: job.job_type,
            state: job.state.clone(),
            category,
            indicator: category.indicator(),
            cancel_enabled: JobCategory::cancel_enabled(job),
            shows_failure: category.shows_failure(),
            has_output: job.has_output(),
            notes: job.notes.clone().unwrap_or_default(),
            submit: job.submit,
            scans,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub state: SessionState,
    pub active: Option<JobRowView>,
    pub pending_cancel: bool,
    pub can_start: bool,
    pub can_end: bool,
}

impl SessionView {
    pub fn build(state: SessionState, store: &EntityStore, fetched: &FetchedSet) -> Self {
        let active = state
            .active_session()
            .and_then(|job_id| store.job(job_id))
            .map(|job| JobRowView::build(job, store, fetched));
        Self {
            state,
            active,
            pending_cancel: state.pending_cancel(),
            can_start: state.accepts_submit() && !store.any_streaming_jobs(),
            can_end: matches!(state, SessionState::Running { .. }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateGroupView {
    pub date: Option<NaiveDate>,
    pub rows: Vec<JobRowView>,
}

/// Everything the session list renders.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionsViewModel {
    pub groups: Vec<DateGroupView>,
    pub total_count: i64,
    pub page: usize,
    pub rows_per_page: usize,
    pub date_filtered: bool,
    pub session: SessionView,
}

impl SessionsViewModel {
    pub fn build(
        store: &EntityStore,
        fetched: &FetchedSet,
        session: SessionState,
        query: &SessionsQuery,
        location: &Url,
        job_type: Option<JobType>,
    ) -> Self {
        let page = query.page(location);
        let rows_per_page = query.rows_per_page(location);
        let date_filtered = query.is_date_filtered(location);
        let jobs = if date_filtered {
            store.jobs_by_date(query.start_date(location), query.end_date(location), job_type)
        } else {
            store
                .listed_jobs()
                .unwrap_or_else(|| store.jobs_by_page(page, rows_per_page, job_type))
        };
        let groups = group_by_date(jobs)
            .into_iter()
            .map(|group| DateGroupView {
                date: group.date,
                rows: group
                    .jobs
                    .into_iter()
                    .map(|job| JobRowView::build(job, store, fetched))
                    .collect(),
            })
            .collect();

        Self {
            groups,
            total_count: store.total_count(),
            page,
            rows_per_page,
            date_filtered,
            session: SessionView::build(session, store, fetched),
        }
    }

    pub fn row_count(&self) -> usize {
        self.groups.iter().map(|group| group.rows.len()).sum()
    }
}
