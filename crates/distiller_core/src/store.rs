use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use chrono::{DateTime, NaiveDate, Utc};

use crate::{Job, JobCategory, JobId, JobType, Scan, ScanId};

/// Sentinel for "the server did not report a total".
const UNKNOWN_TOTAL: i64 = -1;

/// Normalized client-side mirror of jobs and scans.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityStore {
    jobs: BTreeMap<JobId, Job>,
    scans: BTreeMap<ScanId, Scan>,
    /// Scan ids synced for jobs the store has not seen yet.
    detached_scan_ids: BTreeMap<JobId, Vec<ScanId>>,
    /// Ids of the last listing, in server order.
    listing: Option<Vec<JobId>>,
    total_count: i64,
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityStore {
    pub fn new() -> Self {
        Self {
            jobs: BTreeMap::new(),
            scans: BTreeMap::new(),
            detached_scan_ids: BTreeMap::new(),
            listing: None,
            total_count: UNKNOWN_TOTAL,
        }
    }

    /// Inserts or replaces a job. Server job records do not carry scan ids,
    /// so ids learned from an earlier scan sync are kept.
    pub fn upsert_job(&mut self, mut job: Job) -> &Job {
        if job.scan_ids.is_empty() {
            if let Some(ids) = self.detached_scan_ids.remove(&job.id) {
                job.scan_ids = ids;
            } else if let Some(existing) = self.jobs.get(&job.id) {
                job.scan_ids = existing.scan_ids.clone();
            }
        } else {
            self.detached_scan_ids.remove(&job.id);
        }
        let id = job.id;
        self.jobs.insert(id, job);
        &self.jobs[&id]
    }

    pub fn upsert_jobs(&mut self, jobs: impl IntoIterator<Item = Job>) {
        for job in jobs {
            self.upsert_job(job);
        }
    }

    /// Stores the scans and makes them the job's complete scan list.
    /// Re-merging the same scans never duplicates ids.
    pub fn merge_scans(&mut self, job_id: JobId, scans: Vec<Scan>) {
        let mut ids = Vec::with_capacity(scans.len());
        for scan in scans {
            if !ids.contains(&scan.id) {
                ids.push(scan.id);
            }
            self.scans.insert(scan.id, scan);
        }
        match self.jobs.get_mut(&job_id) {
            Some(job) => job.scan_ids = ids,
            None => {
                self.detached_scan_ids.insert(job_id, ids);
            }
        }
    }

    pub fn job(&self, id: JobId) -> Option<&Job> {
        self.jobs.get(&id)
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    pub fn scan(&self, id: ScanId) -> Option<&Scan> {
        self.scans.get(&id)
    }

    pub fn scans_for_job(&self, job_id: JobId) -> Vec<&Scan> {
        let ids = match self.jobs.get(&job_id) {
            Some(job) => &job.scan_ids,
            None => match self.detached_scan_ids.get(&job_id) {
                Some(ids) => ids,
                None => return Vec::new(),
            },
        };
        ids.iter().filter_map(|id| self.scans.get(id)).collect()
    }

    /// Total reported by the last listing, `-1` when unknown.
    pub fn total_count(&self) -> i64 {
        self.total_count
    }

    /// Merges the result of a listing request and remembers its order.
    pub fn record_listing(&mut self, jobs: Vec<Job>, total: i64) {
        let ids = jobs.iter().map(|job| job.id).collect();
        self.upsert_jobs(jobs);
        self.listing = Some(ids);
        self.total_count = total;
    }

    /// Jobs of the last listing in server order, `None` before any listing.
    pub fn listed_jobs(&self) -> Option<Vec<&Job>> {
        self.listing
            .as_ref()
            .map(|ids| ids.iter().filter_map(|id| self.jobs.get(id)).collect())
    }

    /// Jobs of `job_type` (all types when `None`), newest first.
    fn newest_first(&self, job_type: Option<JobType>) -> impl Iterator<Item = &Job> {
        self.jobs
            .values()
            .rev()
            .filter(move |job| job_type.is_none_or(|wanted| job.job_type == wanted))
    }

    pub fn jobs_by_page(&self, page: usize, rows: usize, job_type: Option<JobType>) -> Vec<&Job> {
        self.newest_first(job_type)
            .skip(page.saturating_mul(rows))
            .take(rows)
            .collect()
    }

    /// Jobs submitted within the inclusive bounds. Jobs without a submit time
    /// only match when no bound is set.
    pub fn jobs_by_date(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        job_type: Option<JobType>,
    ) -> Vec<&Job> {
        self.newest_first(job_type)
            .filter(|job| match job.submit {
                Some(submit) => {
                    start.is_none_or(|start| submit >= start) && end.is_none_or(|end| submit <= end)
                }
                None => start.is_none() && end.is_none(),
            })
            .collect()
    }

    /// A streaming job that has not finished blocks starting another one.
    pub fn any_streaming_jobs(&self) -> bool {
        self.jobs.values().any(|job| {
            job.job_type == JobType::Streaming && !JobCategory::of(job).is_terminal()
        })
    }

    /// Previous and next job ids of the same type, by id.
    pub fn neighbours(&self, id: JobId) -> (Option<JobId>, Option<JobId>) {
        let Some(job_type) = self.jobs.get(&id).map(|job| job.job_type) else {
            return (None, None);
        };
        let prev = self
            .jobs
            .range(..id)
            .rev()
            .find(|(_, job)| job.job_type == job_type)
            .map(|(id, _)| *id);
        let next = self
            .jobs
            .range((Bound::Excluded(id), Bound::Unbounded))
            .find(|(_, job)| job.job_type == job_type)
            .map(|(id, _)| *id);
        (prev, next)
    }
}

/// Jobs whose scans were fetched and merged at least once.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchedSet {
    ids: BTreeSet<JobId>,
}

impl FetchedSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.ids.contains(&id)
    }

    /// Record a completed fetch. Returns false if it was already recorded.
    pub fn insert(&mut self, id: JobId) -> bool {
        self.ids.insert(id)
    }

    pub fn invalidate(&mut self, id: JobId) -> bool {
        self.ids.remove(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = JobId> + '_ {
        self.ids.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DateGroup<'a> {
    /// Submit date in UTC; `None` collects jobs without a submit time.
    pub date: Option<NaiveDate>,
    pub jobs: Vec<&'a Job>,
}

/// Groups jobs by submit date, newest date first, undated jobs last. Order
/// within a group follows the input.
pub fn group_by_date<'a>(jobs: impl IntoIterator<Item = &'a Job>) -> Vec<DateGroup<'a>> {
    let mut dated: BTreeMap<NaiveDate, Vec<&'a Job>> = BTreeMap::new();
    let mut undated = Vec::new();
    for job in jobs {
        match job.submit {
            Some(submit) => dated.entry(submit.date_naive()).or_default().push(job),
            None => undated.push(job),
        }
    }

    let mut groups: Vec<DateGroup<'a>> = dated
        .into_iter()
        .rev()
        .map(|(date, jobs)| DateGroup {
            date: Some(date),
            jobs,
        })
        .collect();
    if !undated.is_empty() {
        groups.push(DateGroup {
            date: None,
            jobs: undated,
        });
    }
    groups
}
