use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use distiller_core::MachineStatus;
use distiller_logging::{distiller_debug, distiller_warn};

use crate::coordinator::lock;
use crate::{ApiError, MachineStatusProvider, MachinesApi};

/// Last known status per machine, refreshed on demand.
pub struct MachineRegistry {
    api: Arc<dyn MachinesApi>,
    statuses: Mutex<HashMap<String, MachineStatus>>,
}

impl MachineRegistry {
    pub fn new(api: Arc<dyn MachinesApi>) -> Self {
        Self {
            api,
            statuses: Mutex::new(HashMap::new()),
        }
    }

    pub fn status(&self, machine: &str) -> MachineStatus {
        lock(&self.statuses)
            .get(machine)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl MachineStatusProvider for MachineRegistry {
    fn can_run_jobs(&self, machine: &str) -> bool {
        self.status(machine).can_run_jobs()
    }

    async fn refresh(&self, machine: &str) -> Result<MachineStatus, ApiError> {
        match self.api.machine_status(machine).await {
            Ok(status) => {
                distiller_debug!("Machine {} is {:?}", machine, status);
                lock(&self.statuses).insert(machine.to_string(), status);
                Ok(status)
            }
            Err(err) => {
                // An unreachable machine admits no work.
                distiller_warn!("Refreshing machine {} failed: {}", machine, err);
                lock(&self.statuses).insert(machine.to_string(), MachineStatus::Unknown);
                Err(err)
            }
        }
    }
}
