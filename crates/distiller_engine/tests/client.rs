use std::time::Duration;

use chrono::{TimeZone, Utc};
use distiller_core::{
    JobCreate, JobListMode, JobListRequest, JobType, JobUpdate, MachineStatus, ParamValue, Params,
};
use distiller_engine::{
    ApiFailure, ClientSettings, JobsApi, MachinesApi, ReqwestJobsClient,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ReqwestJobsClient {
    let base = Url::parse(&format!("{}/api/v1", server.uri())).unwrap();
    ReqwestJobsClient::new(ClientSettings::new(base)).unwrap()
}

fn job_json(id: u64, state: &str) -> serde_json::Value {
    json!({
        "id": id,
        "job_type": "streaming",
        "state": state,
        "submit": "2024-03-01T10:00:00",
        "notes": null,
        "machine": "m1",
        "params": {}
    })
}

#[tokio::test]
async fn create_posts_the_request_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/jobs"))
        .and(body_json(json!({
            "job_type": "streaming",
            "scan_id": null,
            "machine": "m1",
            "params": { "threshold": 4, "label": "run a" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_json(42, "PENDING")))
        .expect(1)
        .mount(&server)
        .await;

    let mut params = Params::new();
    params.insert("threshold".to_string(), ParamValue::Int(4));
    params.insert("label".to_string(), ParamValue::parse("run a"));
    let request = JobCreate {
        job_type: JobType::Streaming,
        scan_id: None,
        machine: "m1".to_string(),
        params,
    };

    let job = client(&server).create_job(&request).await.unwrap();
    assert_eq!(job.id, 42);
    assert_eq!(job.state.as_deref(), Some("PENDING"));
    assert_eq!(
        job.submit,
        Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap())
    );
}

#[tokio::test]
async fn paged_listing_reads_total_count_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/jobs"))
        .and(query_param("job_type", "streaming"))
        .and(query_param("skip", "20"))
        .and(query_param("limit", "10"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-total-count", "57")
                .set_body_json(json!([job_json(3, "RUNNING"), job_json(2, "COMPLETED")])),
        )
        .mount(&server)
        .await;

    let request = JobListRequest::paged(Some(JobType::Streaming), 20, 10);
    let page = client(&server).list_jobs(&request).await.unwrap();

    assert_eq!(page.total_count, 57);
    let ids: Vec<u64> = page.jobs.iter().map(|job| job.id).collect();
    assert_eq!(ids, vec![3, 2]);
}

#[tokio::test]
async fn missing_or_malformed_total_count_is_unknown() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/jobs"))
        .and(query_param("skip", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/jobs"))
        .and(query_param("skip", "10"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-total-count", "lots")
                .set_body_json(json!([])),
        )
        .mount(&server)
        .await;

    let client = client(&server);
    let absent = client
        .list_jobs(&JobListRequest::paged(None, 0, 10))
        .await
        .unwrap();
    let garbage = client
        .list_jobs(&JobListRequest::paged(None, 10, 10))
        .await
        .unwrap();

    assert_eq!(absent.total_count, -1);
    assert_eq!(garbage.total_count, -1);
}

#[tokio::test]
async fn date_range_listing_sends_bounds_without_paging() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/jobs"))
        .and(query_param("start", "2024-03-01T00:00:00Z"))
        .and(query_param_is_missing("end"))
        .and(query_param_is_missing("skip"))
        .and(query_param_is_missing("limit"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("x-total-count", "1")
                .set_body_json(json!([job_json(5, "PENDING")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let request = JobListRequest {
        job_type: None,
        mode: JobListMode::DateRange {
            start: Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()),
            end: None,
        },
    };
    let page = client(&server).list_jobs(&request).await.unwrap();
    assert_eq!(page.jobs.len(), 1);
}

#[tokio::test]
async fn job_scans_and_api_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/jobs/42/scans"))
        .and(header("X-API-KEY", "secret"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "id": 1, "location": "/data/1" }, { "id": 2 }])),
        )
        .mount(&server)
        .await;

    let base = Url::parse(&format!("{}/api/v1/", server.uri())).unwrap();
    let settings = ClientSettings {
        api_key: Some("secret".to_string()),
        ..ClientSettings::new(base)
    };
    let client = ReqwestJobsClient::new(settings).unwrap();

    let scans = client.job_scans(42).await.unwrap();
    assert_eq!(scans.len(), 2);
    assert_eq!(scans[0].metadata.get("location"), Some(&json!("/data/1")));
}

#[tokio::test]
async fn cancel_uses_delete_and_notes_use_patch() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/jobs/8"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_json(8, "CANCELLED")))
        .expect(1)
        .mount(&server)
        .await;
    let mut patched = job_json(8, "CANCELLED");
    patched["notes"] = json!("bad beam");
    Mock::given(method("PATCH"))
        .and(path("/api/v1/jobs/8"))
        .and(body_json(json!({ "notes": "bad beam" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(patched))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let cancelled = client.cancel_job(8).await.unwrap();
    assert_eq!(cancelled.state.as_deref(), Some("CANCELLED"));

    let update = JobUpdate {
        notes: Some("bad beam".to_string()),
    };
    let updated = client.update_job(8, &update).await.unwrap();
    assert_eq!(updated.notes.as_deref(), Some("bad beam"));
}

#[tokio::test]
async fn http_errors_keep_their_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/jobs/404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client(&server).get_job(404).await.unwrap_err();
    assert_eq!(err.kind, ApiFailure::HttpStatus(404));
}

#[tokio::test]
async fn malformed_body_is_a_decode_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/jobs/1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client(&server).get_job(1).await.unwrap_err();
    assert_eq!(err.kind, ApiFailure::Decode);
}

#[tokio::test]
async fn slow_server_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/jobs/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(250))
                .set_body_json(job_json(1, "RUNNING")),
        )
        .mount(&server)
        .await;

    let base = Url::parse(&format!("{}/api/v1/", server.uri())).unwrap();
    let settings = ClientSettings {
        request_timeout: Duration::from_millis(50),
        ..ClientSettings::new(base)
    };
    let client = ReqwestJobsClient::new(settings).unwrap();

    let err = client.get_job(1).await.unwrap_err();
    assert_eq!(err.kind, ApiFailure::Timeout);
}

#[tokio::test]
async fn machine_state_is_read_per_machine() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/machines/perlmutter/state"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("degraded")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/machines/other/state"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("maintenance")))
        .mount(&server)
        .await;

    let client = client(&server);
    let status = client.machine_status("perlmutter").await.unwrap();
    assert_eq!(status, MachineStatus::Degraded);
    assert!(status.can_run_jobs());
    assert_eq!(
        client.machine_status("other").await.unwrap(),
        MachineStatus::Unknown
    );
}
