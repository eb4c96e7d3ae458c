//! Distiller core: pure job/scan model, classification, URL state and the
//! streaming-session state machine. No IO lives here.
mod classify;
mod query;
mod session;
mod store;
mod types;
mod url_state;
mod view_model;

pub use classify::{classify, Indicator, JobCategory, KNOWN_JOB_STATES};
pub use query::{JobListMode, JobListRequest, SessionsQuery, ROWS_PER_PAGE_OPTIONS};
pub use session::{update, RejectReason, SessionEffect, SessionMsg, SessionState};
pub use store::{group_by_date, DateGroup, EntityStore, FetchedSet};
pub use types::{
    Job, JobCreate, JobId, JobType, JobUpdate, MachineStatus, ParamValue, Params, Scan, ScanId,
};
pub use url_state::{
    date_time_deserializer, date_time_serializer, int_deserializer, int_serializer,
    positive_int_deserializer, History, UrlSlot, HISTORY_LIMIT,
};
pub use view_model::{DateGroupView, JobRowView, ScanSummary, SessionView, SessionsViewModel};
