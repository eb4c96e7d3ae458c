use chrono::{DateTime, Utc};
use url::Url;

use crate::url_state::{
    date_time_deserializer, date_time_serializer, int_deserializer, int_serializer,
    positive_int_deserializer, History, UrlSlot,
};
use crate::JobType;

pub const ROWS_PER_PAGE_OPTIONS: [usize; 3] = [10, 20, 100];

/// How a job listing is filtered. Paging and date ranges are never combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobListMode {
    Paged {
        skip: usize,
        limit: usize,
    },
    DateRange {
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobListRequest {
    pub job_type: Option<JobType>,
    pub mode: JobListMode,
}

impl JobListRequest {
    pub fn paged(job_type: Option<JobType>, skip: usize, limit: usize) -> Self {
        Self {
            job_type,
            mode: JobListMode::Paged { skip, limit },
        }
    }
}

/// The list view's query parameters: `page`, `rowsPerPage`, `startDate`, `endDate`.
#[derive(Debug, Clone)]
pub struct SessionsQuery {
    page: UrlSlot<usize>,
    rows_per_page: UrlSlot<usize>,
    start_date: UrlSlot<Option<DateTime<Utc>>>,
    end_date: UrlSlot<Option<DateTime<Utc>>>,
}

impl Default for SessionsQuery {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionsQuery {
    pub fn new() -> Self {
        Self {
            page: UrlSlot::new("page", 0, int_serializer, int_deserializer),
            rows_per_page: UrlSlot::new(
                "rowsPerPage",
                ROWS_PER_PAGE_OPTIONS[0],
                int_serializer,
                positive_int_deserializer,
            ),
            start_date: UrlSlot::new(
                "startDate",
                None,
                date_time_serializer,
                date_time_deserializer,
            ),
            end_date: UrlSlot::new("endDate", None, date_time_serializer, date_time_deserializer),
        }
    }

    pub fn page(&self, location: &Url) -> usize {
        self.page.get(location)
    }

    pub fn rows_per_page(&self, location: &Url) -> usize {
        self.rows_per_page.get(location)
    }

    pub fn start_date(&self, location: &Url) -> Option<DateTime<Utc>> {
        self.start_date.get(location)
    }

    pub fn end_date(&self, location: &Url) -> Option<DateTime<Utc>> {
        self.end_date.get(location)
    }

    pub fn with_page(&self, location: &Url, page: usize) -> Url {
        self.page.write(location, &page)
    }

    /// Changing the page size returns to the first page.
    pub fn with_rows_per_page(&self, location: &Url, rows: usize) -> Url {
        let location = self.rows_per_page.write(location, &rows.max(1));
        self.page.write(&location, &0)
    }

    /// Changing a date filter returns to the first page.
    pub fn with_start_date(&self, location: &Url, start: Option<DateTime<Utc>>) -> Url {
        let location = self.page.write(location, &0);
        self.start_date.write(&location, &start)
    }

    pub fn with_end_date(&self, location: &Url, end: Option<DateTime<Utc>>) -> Url {
        let location = self.page.write(location, &0);
        self.end_date.write(&location, &end)
    }

    // Each setter is one history entry. Combine several changes with the
    // `with_*` builders and push the result once.

    pub fn set_page(&self, history: &mut History, page: usize) {
        history.push(self.with_page(history.current(), page));
    }

    pub fn set_rows_per_page(&self, history: &mut History, rows: usize) {
        history.push(self.with_rows_per_page(history.current(), rows));
    }

    pub fn set_start_date(&self, history: &mut History, start: Option<DateTime<Utc>>) {
        history.push(self.with_start_date(history.current(), start));
    }

    pub fn set_end_date(&self, history: &mut History, end: Option<DateTime<Utc>>) {
        history.push(self.with_end_date(history.current(), end));
    }

    pub fn is_date_filtered(&self, location: &Url) -> bool {
        self.start_date(location).is_some() || self.end_date(location).is_some()
    }

    pub fn list_request(&self, location: &Url, job_type: Option<JobType>) -> JobListRequest {
        let start = self.start_date(location);
        let end = self.end_date(location);
        let mode = if start.is_some() || end.is_some() {
            JobListMode::DateRange { start, end }
        } else {
            let limit = self.rows_per_page(location);
            JobListMode::Paged {
                skip: self.page(location).saturating_mul(limit),
                limit,
            }
        };
        JobListRequest { job_type, mode }
    }
}
