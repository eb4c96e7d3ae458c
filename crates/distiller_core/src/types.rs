use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type JobId = u64;
pub type ScanId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Transfer,
    Count,
    Streaming,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::Transfer => "transfer",
            JobType::Count => "count",
            JobType::Streaming => "streaming",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job parameter as accepted by the server: string, integer or float.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    /// Parses a command-line style value, preferring integers, then floats.
    pub fn parse(raw: &str) -> Self {
        if let Ok(value) = raw.parse::<i64>() {
            return ParamValue::Int(value);
        }
        if let Ok(value) = raw.parse::<f64>() {
            if value.is_finite() {
                return ParamValue::Float(value);
            }
        }
        ParamValue::Text(raw.to_string())
    }
}

pub type Params = BTreeMap<String, ParamValue>;

/// A server-tracked unit of work, mirrored client-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub job_type: JobType,
    /// Raw scheduler state token; absent until the server assigns one.
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default, with = "timestamp")]
    pub submit: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub output: Option<String>,
    /// Filled in client-side once the job's scans have been synced.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scan_ids: Vec<ScanId>,
    /// Queuing-system handle, present once the job was admitted to execution.
    #[serde(default)]
    pub slurm_id: Option<u64>,
    #[serde(default)]
    pub machine: String,
    #[serde(default)]
    pub params: Params,
    /// Elapsed run time in seconds.
    #[serde(default)]
    pub elapsed: Option<f64>,
}

impl Job {
    pub fn new(id: JobId, job_type: JobType) -> Self {
        Self {
            id,
            job_type,
            state: None,
            submit: None,
            notes: None,
            output: None,
            scan_ids: Vec::new(),
            slurm_id: None,
            machine: String::new(),
            params: Params::new(),
            elapsed: None,
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn has_output(&self) -> bool {
        self.output.as_deref().is_some_and(|output| !output.is_empty())
    }
}

/// A captured data unit. Everything except the id is opaque to this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scan {
    pub id: ScanId,
    #[serde(flatten)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Scan {
    pub fn new(id: ScanId) -> Self {
        Self {
            id,
            metadata: serde_json::Map::new(),
        }
    }
}

/// Body of a job-creation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobCreate {
    pub job_type: JobType,
    pub scan_id: Option<ScanId>,
    pub machine: String,
    pub params: Params,
}

/// Body of a job patch request. Only user-editable fields are carried.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct JobUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Status of an execution target as reported by the machine endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineStatus {
    Active,
    Degraded,
    Down,
    #[default]
    #[serde(other)]
    Unknown,
}

impl MachineStatus {
    /// Whether the machine currently accepts new jobs.
    pub fn can_run_jobs(self) -> bool {
        matches!(self, MachineStatus::Active | MachineStatus::Degraded)
    }
}

/// Server timestamps may come with or without an offset; naive values are UTC.
mod timestamp {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::url_state::parse_date_time;

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw {
            None => Ok(None),
            Some(raw) => parse_date_time(&raw)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {raw:?}"))),
        }
    }
}
