use std::time::Duration;

use chrono::SecondsFormat;
use distiller_core::{
    Job, JobCreate, JobId, JobListMode, JobListRequest, JobUpdate, MachineStatus, Scan,
};
use distiller_logging::distiller_debug;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::{ApiError, ApiFailure, JobPage, JobsApi, MachinesApi};

const TOTAL_COUNT_HEADER: &str = "x-total-count";
const API_KEY_HEADER: &str = "X-API-KEY";

#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// API root, e.g. `http://localhost:8000/api/v1/`.
    pub base_url: Url,
    pub api_key: Option<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl ClientSettings {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            api_key: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReqwestJobsClient {
    base_url: Url,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl ReqwestJobsClient {
    pub fn new(settings: ClientSettings) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::new(ApiFailure::Network, err.to_string()))?;

        // Relative joins only append to a base whose path ends with '/'.
        let mut base_url = settings.base_url;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            base_url,
            api_key: settings.api_key,
            client,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|err| ApiError::new(ApiFailure::InvalidUrl, err.to_string()))
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<reqwest::Response, ApiError> {
        distiller_debug!("{} {}", method, url);
        let mut request = self.client.request(method, url);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::new(
                ApiFailure::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        Ok(response)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&impl Serialize>,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path)?;
        let body = body.map(encode_body).transpose()?;
        let response = self.send(method, url, body).await?;
        decode(response).await
    }
}

#[async_trait::async_trait]
impl JobsApi for ReqwestJobsClient {
    async fn create_job(&self, request: &JobCreate) -> Result<Job, ApiError> {
        self.call(Method::POST, "jobs", Some(request)).await
    }

    async fn list_jobs(&self, request: &JobListRequest) -> Result<JobPage, ApiError> {
        let mut url = self.endpoint("jobs")?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(job_type) = request.job_type {
                query.append_pair("job_type", job_type.as_str());
            }
            match request.mode {
                JobListMode::Paged { skip, limit } => {
                    query.append_pair("skip", &skip.to_string());
                    query.append_pair("limit", &limit.to_string());
                }
                JobListMode::DateRange { start, end } => {
                    for (key, bound) in [("start", start), ("end", end)] {
                        if let Some(bound) = bound {
                            let bound = bound.to_rfc3339_opts(SecondsFormat::AutoSi, true);
                            query.append_pair(key, &bound);
                        }
                    }
                }
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        let response = self.send(Method::GET, url, None).await?;
        let total_count = response
            .headers()
            .get(TOTAL_COUNT_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i64>().ok())
            .unwrap_or(-1);
        let jobs = decode(response).await?;
        Ok(JobPage { jobs, total_count })
    }

    async fn get_job(&self, id: JobId) -> Result<Job, ApiError> {
        self.call(Method::GET, &format!("jobs/{id}"), None::<&()>).await
    }

    async fn job_scans(&self, id: JobId) -> Result<Vec<Scan>, ApiError> {
        self.call(Method::GET, &format!("jobs/{id}/scans"), None::<&()>)
            .await
    }

    async fn cancel_job(&self, id: JobId) -> Result<Job, ApiError> {
        self.call(Method::DELETE, &format!("jobs/{id}"), None::<&()>)
            .await
    }

    async fn update_job(&self, id: JobId, update: &JobUpdate) -> Result<Job, ApiError> {
        self.call(Method::PATCH, &format!("jobs/{id}"), Some(update))
            .await
    }
}

#[async_trait::async_trait]
impl MachinesApi for ReqwestJobsClient {
    async fn machine_status(&self, machine: &str) -> Result<MachineStatus, ApiError> {
        let mut url = self.endpoint("machines")?;
        url.path_segments_mut()
            .map_err(|()| ApiError::new(ApiFailure::InvalidUrl, "base url cannot be a base"))?
            .pop_if_empty()
            .extend([machine, "state"]);
        let response = self.send(Method::GET, url, None).await?;
        decode(response).await
    }
}

fn encode_body(body: &impl Serialize) -> Result<Vec<u8>, ApiError> {
    serde_json::to_vec(body).map_err(|err| ApiError::new(ApiFailure::Decode, err.to_string()))
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let bytes = response.bytes().await.map_err(map_reqwest_error)?;
    serde_json::from_slice(&bytes).map_err(|err| ApiError::new(ApiFailure::Decode, err.to_string()))
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(ApiFailure::Timeout, err.to_string());
    }
    ApiError::new(ApiFailure::Network, err.to_string())
}
