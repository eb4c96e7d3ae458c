use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use distiller_engine::ClientSettings;
use distiller_logging::{distiller_info, distiller_warn, LogDestination};
use serde::{Deserialize, Serialize};
use url::Url;

pub(crate) const CONFIG_FILENAME: &str = "distiller.ron";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Machine used by `stream` when neither the flag nor saved state names one.
    pub machine: Option<String>,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub log_destination: LogDestination,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api/v1/".to_string(),
            api_key: None,
            machine: None,
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            poll_interval_ms: 2000,
            log_destination: LogDestination::Terminal,
        }
    }
}

impl AppConfig {
    pub fn client_settings(&self) -> anyhow::Result<ClientSettings> {
        let base_url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid base url {:?}", self.base_url))?;
        Ok(ClientSettings {
            api_key: self.api_key.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..ClientSettings::new(base_url)
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Reads the config file. A missing file gives the defaults; a file that does
/// not parse is reported and also gives the defaults.
pub(crate) fn load(path: &Path) -> AppConfig {
    let content = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return AppConfig::default();
        }
        Err(err) => {
            distiller_warn!("Failed to read config from {:?}: {}", path, err);
            return AppConfig::default();
        }
    };

    match ron::from_str(&content) {
        Ok(config) => {
            distiller_info!("Loaded config from {:?}", path);
            config
        }
        Err(err) => {
            distiller_warn!("Failed to parse config from {:?}: {}", path, err);
            AppConfig::default()
        }
    }
}
