//! Distiller engine: transport, fetch coordination and session control.
mod api;
mod client;
mod coordinator;
mod machines;
mod persist;
mod service;
mod session;
mod types;

pub use api::{JobsApi, MachineStatusProvider, MachinesApi};
pub use client::{ClientSettings, ReqwestJobsClient};
pub use coordinator::{FetchCoordinator, SharedStore};
pub use machines::MachineRegistry;
pub use persist::{PersistError, StateFile};
pub use service::JobsService;
pub use session::{CancelOutcome, SessionController, SessionError};
pub use types::{ApiError, ApiFailure, JobPage};
