use std::path::Path;

use distiller_core::{History, JobId};
use distiller_engine::StateFile;
use distiller_logging::{distiller_error, distiller_info, distiller_warn};
use serde::{Deserialize, Serialize};
use url::Url;

pub(crate) const STATE_FILENAME: &str = ".distiller_state.ron";

/// Location the list view starts from when nothing was saved.
pub(crate) const HOME_LOCATION: &str = "distiller://local/sessions";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
struct PersistedState {
    history: Vec<String>,
    cursor: usize,
    machine: Option<String>,
    session: Option<JobId>,
}

/// What survives between runs: the navigation history of the list view's
/// query state, the last machine a session was started on and the job of
/// the streaming session this client started.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AppState {
    pub history: History,
    pub machine: Option<String>,
    pub session: Option<JobId>,
}

impl AppState {
    pub fn home() -> Result<Self, url::ParseError> {
        Ok(Self {
            history: History::parse(HOME_LOCATION)?,
            machine: None,
            session: None,
        })
    }
}

/// Restores the saved state; anything unreadable starts over at home.
pub(crate) fn load_state(dir: &Path) -> Result<AppState, url::ParseError> {
    let file = StateFile::new(dir.join(STATE_FILENAME));
    let content = match file.load() {
        Ok(Some(text)) => text,
        Ok(None) => return AppState::home(),
        Err(err) => {
            distiller_warn!("Failed to read persisted state from {:?}: {}", file.path(), err);
            return AppState::home();
        }
    };

    let state: PersistedState = match ron::from_str(&content) {
        Ok(state) => state,
        Err(err) => {
            distiller_warn!("Failed to parse persisted state from {:?}: {}", file.path(), err);
            return AppState::home();
        }
    };

    // Entries that no longer parse are dropped; the cursor is clamped.
    let entries: Vec<Url> = state
        .history
        .iter()
        .filter_map(|entry| Url::parse(entry).ok())
        .collect();
    let history = match History::restore(entries, state.cursor) {
        Some(history) => history,
        None => History::parse(HOME_LOCATION)?,
    };

    distiller_info!("Loaded persisted state from {:?}", file.path());
    Ok(AppState {
        history,
        machine: state.machine,
        session: state.session,
    })
}

pub(crate) fn save_state(dir: &Path, state: &AppState) {
    let persisted = PersistedState {
        history: state
            .history
            .entries()
            .iter()
            .map(|url| url.to_string())
            .collect(),
        cursor: state.history.cursor(),
        machine: state.machine.clone(),
        session: state.session,
    };

    let pretty = ron::ser::PrettyConfig::new();
    let content = match ron::ser::to_string_pretty(&persisted, pretty) {
        Ok(text) => text,
        Err(err) => {
            distiller_error!("Failed to serialize persisted state: {}", err);
            return;
        }
    };

    let file = StateFile::new(dir.join(STATE_FILENAME));
    if let Err(err) = file.save(&content) {
        distiller_error!("Failed to write persisted state to {:?}: {}", file.path(), err);
    }
}
