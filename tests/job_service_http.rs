use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use pdfstation_client::config::Config;
use pdfstation_client::models::{JobRequest, PageRanges, SplitMode, UploadFile};
use pdfstation_client::services::validation::RequestValidator;
use pdfstation_client::{ClientError, DownloadService, HttpJobClient, JobRunner, JobService};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const JOB_ID: &str = "job-42";
const RESULT_BYTES: &[u8] = b"%PDF-1.7\ncompressed result\n%%EOF";

#[derive(Debug, Clone)]
struct Upload {
    operation: String,
    request_id: Option<String>,
    body: String,
}

#[derive(Default)]
struct FakeService {
    uploads: Mutex<Vec<Upload>>,
    polls: AtomicU32,
    downloads: Mutex<Vec<String>>,
    reject_uploads: bool,
    failure: Option<String>,
}

impl FakeService {
    fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }

    fn downloads(&self) -> Vec<String> {
        self.downloads.lock().unwrap().clone()
    }
}

async fn create_job(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
    state: web::Data<FakeService>,
) -> HttpResponse {
    let request_id = req
        .headers()
        .get("X-Request-ID")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    state.uploads.lock().unwrap().push(Upload {
        operation: path.into_inner(),
        request_id,
        body: String::from_utf8_lossy(&body).into_owned(),
    });

    if state.reject_uploads {
        return HttpResponse::InternalServerError().body("Storage unavailable");
    }
    HttpResponse::Ok().json(json!({ "id": JOB_ID, "status": "CREATED" }))
}

/// PROCESSING on the first check, then the scripted outcome.
async fn job_status(path: web::Path<String>, state: web::Data<FakeService>) -> HttpResponse {
    let id = path.into_inner();
    let polls = state.polls.fetch_add(1, Ordering::SeqCst) + 1;
    let body = match &state.failure {
        _ if polls < 2 => json!({ "id": id, "status": "PROCESSING" }),
        Some(message) => json!({ "id": id, "status": "FAILED", "errorMessage": message }),
        None => json!({ "id": id, "status": "COMPLETED" }),
    };
    HttpResponse::Ok().json(body)
}

async fn download(path: web::Path<(String, String)>, state: web::Data<FakeService>) -> HttpResponse {
    let (id, artifact) = path.into_inner();
    state.downloads.lock().unwrap().push(artifact);
    HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header(("Content-Disposition", format!("attachment; filename=\"compressed_{id}.pdf\"")))
        .body(RESULT_BYTES)
}

async fn estimate_size(query: web::Query<HashMap<String, String>>) -> HttpResponse {
    let original: u64 = query.get("originalSize").and_then(|v| v.parse().ok()).unwrap_or(0);
    let quality: u64 = query.get("quality").and_then(|v| v.parse().ok()).unwrap_or(0);
    HttpResponse::Ok().body((original * quality / 100).to_string())
}

async fn start_service(state: FakeService) -> (String, web::Data<FakeService>) {
    let data = web::Data::new(state);
    let app_data = data.clone();

    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_data.clone())
            .route("/api/pdf/jobs/estimate-size", web::get().to(estimate_size))
            .service(
                web::resource("/api/pdf/jobs/{segment}")
                    .route(web::post().to(create_job))
                    .route(web::get().to(job_status)),
            )
            .route("/api/pdf/jobs/{id}/{artifact}", web::get().to(download))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .unwrap();

    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());
    (format!("http://{addr}"), data)
}

fn config_for(base_url: &str) -> Config {
    let mut config = Config::default();
    config.api.base_url = base_url.to_string();
    config.api.auth_password = None;
    config.polling.interval = Duration::from_millis(10);
    config.polling.max_polls = 20;
    config.download.min_free_space_mb = 0;
    config
}

fn runner_for(config: &Config) -> (HttpJobClient, JobRunner) {
    let client = HttpJobClient::from_config(config).unwrap();
    let service: Arc<dyn JobService> = Arc::new(client.clone());
    let runner = JobRunner::new(
        service,
        config.polling.clone(),
        RequestValidator::new(config.upload.max_file_size_mb),
    );
    (client, runner)
}

fn pdf(name: &str) -> UploadFile {
    UploadFile::new(name, b"%PDF-1.7\n1 0 obj\n<<>>\nendobj\n%%EOF".to_vec())
}

#[actix_web::test]
async fn compress_job_is_submitted_polled_and_saved() {
    let (base_url, state) = start_service(FakeService::default()).await;
    let config = config_for(&base_url);
    let (client, runner) = runner_for(&config);

    let job = runner
        .run(JobRequest::Compress { file: pdf("report.pdf"), quality: 70 })
        .await
        .unwrap();
    assert_eq!(job.id().as_str(), JOB_ID);
    assert_eq!(job.polls(), 2);

    let uploads = state.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].operation, "compress");
    let body = &uploads[0].body;
    assert!(body.contains("name=\"file\"; filename=\"report.pdf\""), "{body}");
    assert!(body.contains("%PDF-1.7"));
    assert!(body.contains("name=\"operation\"\r\n\r\nCOMPRESS"));
    assert!(body.contains("name=\"quality\"\r\n\r\n70"));

    let dir = tempfile::tempdir().unwrap();
    let downloads = DownloadService::new(client, &config.download);
    let path = downloads.save(&job, dir.path()).await.unwrap();

    assert_eq!(path, dir.path().join("compressed_job-42.pdf"));
    assert_eq!(tokio::fs::read(&path).await.unwrap(), RESULT_BYTES);
    assert_eq!(state.downloads(), vec!["download".to_string()]);

    let again = downloads.save(&job, dir.path()).await.unwrap();
    assert_eq!(again, dir.path().join("compressed_job-42-1.pdf"));
    assert_eq!(tokio::fs::read(&path).await.unwrap(), RESULT_BYTES);
}

#[actix_web::test]
async fn split_sends_page_ranges() {
    let (base_url, state) = start_service(FakeService::default()).await;
    let (client, _) = runner_for(&config_for(&base_url));

    let ranges: PageRanges = "1-3,5".parse().unwrap();
    let snapshot = client
        .create_job(&JobRequest::Split { file: pdf("book.pdf"), mode: SplitMode::Pages(ranges) })
        .await
        .unwrap();
    assert_eq!(snapshot.id.as_str(), JOB_ID);

    let body = &state.uploads()[0].body;
    assert!(body.contains("name=\"splitType\"\r\n\r\npages"), "{body}");
    assert!(body.contains("name=\"splitRanges\"\r\n\r\n1-3,5"), "{body}");
    assert!(!body.contains("splitInterval"));
}

#[actix_web::test]
async fn rejected_upload_is_a_submission_error() {
    let (base_url, state) = start_service(FakeService { reject_uploads: true, ..Default::default() }).await;
    let (_, runner) = runner_for(&config_for(&base_url));

    let err = runner.run(JobRequest::PdfToWord { file: pdf("cv.pdf") }).await.unwrap_err();

    match err {
        ClientError::Submission(message) => assert!(message.contains("Storage unavailable"), "{message}"),
        other => panic!("expected a submission error, got {other:?}"),
    }
    assert_eq!(state.polls.load(Ordering::SeqCst), 0);
}

#[actix_web::test]
async fn failed_job_reports_the_service_message() {
    let state = FakeService { failure: Some("Invalid password".to_string()), ..Default::default() };
    let (base_url, state) = start_service(state).await;
    let (_, runner) = runner_for(&config_for(&base_url));

    let err = runner
        .run(JobRequest::RemoveProtection { file: pdf("locked.pdf"), password: "wrong".to_string() })
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ClientError::JobFailed { job_id: JOB_ID.to_string(), message: Some("Invalid password".to_string()) }
    );
    assert_eq!(err.user_message(), "Invalid password");
    assert!(state.uploads()[0].body.contains("name=\"password\"\r\n\r\nwrong"));
    assert!(state.downloads().is_empty());
}

#[actix_web::test]
async fn every_submission_carries_a_fresh_request_id() {
    let (base_url, state) = start_service(FakeService::default()).await;
    let (client, _) = runner_for(&config_for(&base_url));

    for _ in 0..2 {
        client.create_job(&JobRequest::PdfToWord { file: pdf("cv.pdf") }).await.unwrap();
    }

    let ids: Vec<String> = state.uploads().into_iter().filter_map(|u| u.request_id).collect();
    assert_eq!(ids.len(), 2);
    assert_ne!(ids[0], ids[1]);
    for id in &ids {
        assert!(uuid::Uuid::parse_str(id).is_ok(), "{id}");
    }
}

#[actix_web::test]
async fn estimate_size_reads_plain_number() {
    let (base_url, _) = start_service(FakeService::default()).await;
    let (client, _) = runner_for(&config_for(&base_url));

    assert_eq!(client.estimate_size(1_000_000, 50).await.unwrap(), 500_000);
}
