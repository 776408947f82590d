use crate::config::Config;
use crate::error::{ClientError, ClientResult};
use crate::models::{CompletedJob, JobId, JobRequest, JobSnapshot};
use crate::services::validation::{validate_base_url, validate_job_id, RequestValidator};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

const JOBS_PATH: &str = "/api/pdf/jobs";
const REQUEST_ID_HEADER: &str = "X-Request-ID";
const MAX_ERROR_BODY_CHARS: usize = 200;

/// The two calls the job lifecycle needs from the remote service.
#[async_trait]
pub trait JobService: Send + Sync {
    /// Creates a job. Either returns the acknowledged snapshot or an error,
    /// in which case no job should be assumed to exist.
    async fn create_job(&self, request: &JobRequest) -> ClientResult<JobSnapshot>;

    /// Fetches the current status of a job.
    async fn job_status(&self, job_id: &JobId) -> ClientResult<JobSnapshot>;
}

/// `JobService` over the PDFStation HTTP API.
#[derive(Clone)]
pub struct HttpJobClient {
    http: reqwest::Client,
    base_url: Url,
    auth_header: Option<String>,
    validator: RequestValidator,
    download_timeout: Duration,
}

impl HttpJobClient {
    pub fn from_config(config: &Config) -> ClientResult<Self> {
        let base_url = validate_base_url(&config.api.base_url)?;

        let http = reqwest::Client::builder()
            .timeout(config.api.request_timeout)
            .connect_timeout(config.api.connect_timeout)
            .user_agent(concat!("pdfstation-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ClientError::Config(format!("Failed to build HTTP client: {e}")))?;

        let auth_header = config
            .api
            .auth_password
            .as_ref()
            .map(|password| format!("Basic {}", general_purpose::STANDARD.encode(password)));

        Ok(Self {
            http,
            base_url,
            auth_header,
            validator: RequestValidator::new(config.upload.max_file_size_mb),
            download_timeout: config.download.download_timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> ClientResult<Url> {
        let joined = format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path);
        Url::parse(&joined).map_err(|e| ClientError::Config(format!("Invalid endpoint URL '{joined}': {e}")))
    }

    fn job_endpoint(&self, job_id: &JobId, suffix: Option<&str>) -> ClientResult<Url> {
        validate_job_id(job_id)?;
        match suffix {
            Some(suffix) => self.endpoint(&format!("{JOBS_PATH}/{job_id}/{suffix}")),
            None => self.endpoint(&format!("{JOBS_PATH}/{job_id}")),
        }
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut builder = self
            .http
            .request(method, url)
            .header(REQUEST_ID_HEADER, Uuid::new_v4().to_string());
        if let Some(auth) = &self.auth_header {
            builder = builder.header(reqwest::header::AUTHORIZATION, auth);
        }
        builder
    }

    fn build_form(request: &JobRequest) -> ClientResult<Form> {
        let mut form = Form::new();

        for file in request.files() {
            let part = Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone())
                .mime_str(mime::APPLICATION_PDF.essence_str())
                .map_err(|e| ClientError::Submission(format!("Failed to attach {}: {e}", file.file_name)))?;
            form = form.part(request.file_field(), part);
        }

        for (name, value) in request.form_fields() {
            form = form.text(name, value);
        }

        Ok(form)
    }

    /// Where a browser would navigate to fetch the result directly.
    pub fn download_url(&self, job: &CompletedJob) -> ClientResult<Url> {
        self.job_endpoint(job.id(), Some(job.operation().profile().download_suffix))
    }

    /// Starts the result download. The body is left unread for streaming.
    #[instrument(skip(self, job), fields(job_id = %job.id(), operation = %job.operation()))]
    pub async fn download_response(&self, job: &CompletedJob) -> ClientResult<Response> {
        let url = self.download_url(job)?;
        debug!("Requesting result from {}", url);

        let response = self
            .request(Method::GET, url)
            .timeout(self.download_timeout)
            .send()
            .await
            .map_err(|e| ClientError::Download(format!("Failed to download result: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            return Err(ClientError::Download(format!(
                "Result download for job {} returned HTTP {status}{body}",
                job.id()
            )));
        }

        Ok(response)
    }

    /// Asks the service for the expected compressed size of a document.
    #[instrument(skip(self))]
    pub async fn estimate_size(&self, original_size: u64, quality: u8) -> ClientResult<u64> {
        let mut url = self.endpoint(&format!("{JOBS_PATH}/estimate-size"))?;
        url.query_pairs_mut()
            .append_pair("originalSize", &original_size.to_string())
            .append_pair("quality", &quality.to_string());

        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .map_err(|e| ClientError::Service(format!("Failed to estimate size: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            return Err(ClientError::Service(format!("Size estimate returned HTTP {status}{body}")));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ClientError::Service(format!("Failed to read size estimate: {e}")))?;

        text.trim()
            .parse()
            .map_err(|_| ClientError::Service(format!("Size estimate is not a number: {}", text.trim())))
    }
}

#[async_trait]
impl JobService for HttpJobClient {
    #[instrument(skip(self, request), fields(operation = %request.operation()))]
    async fn create_job(&self, request: &JobRequest) -> ClientResult<JobSnapshot> {
        self.validator.validate_request(request)?;

        let operation = request.operation();
        let url = self
            .endpoint(operation.profile().create_path)
            .map_err(|e| ClientError::Submission(e.to_string()))?;
        let form = Self::build_form(request)?;

        info!("Submitting {} job with {} file(s)", operation, request.files().len());

        let response = self
            .request(Method::POST, url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClientError::Submission(format!("Failed to create {operation} job: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            return Err(ClientError::Submission(format!(
                "Failed to create {operation} job: HTTP {status}{body}"
            )));
        }

        let snapshot: JobSnapshot = response
            .json()
            .await
            .map_err(|e| ClientError::Submission(format!("Unreadable {operation} job acknowledgement: {e}")))?;

        validate_job_id(&snapshot.id)
            .map_err(|e| ClientError::Submission(format!("Service returned an unusable job id: {e}")))?;

        info!(job_id = %snapshot.id, status = %snapshot.status, "Created {} job", operation);
        Ok(snapshot)
    }

    #[instrument(skip(self), fields(job_id = %job_id))]
    async fn job_status(&self, job_id: &JobId) -> ClientResult<JobSnapshot> {
        let url = self.job_endpoint(job_id, None)?;

        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .map_err(|e| ClientError::PollTransport(format!("Failed to fetch job status: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            return Err(ClientError::PollTransport(format!("Status request returned HTTP {status}{body}")));
        }

        let snapshot: JobSnapshot = response
            .json()
            .await
            .map_err(|e| ClientError::PollTransport(format!("Unreadable job status: {e}")))?;

        if snapshot.id != *job_id {
            warn!(returned = %snapshot.id, "Status response belongs to a different job");
            return Err(ClientError::PollTransport(format!(
                "Status response for {} does not match requested job {job_id}",
                snapshot.id
            )));
        }

        Ok(snapshot)
    }
}

/// Short, printable suffix built from an error response body.
async fn error_body(response: Response) -> String {
    match response.text().await {
        Ok(body) if !body.trim().is_empty() => {
            let trimmed: String = body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect();
            format!(": {trimmed}")
        }
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobStatus, Operation, StatusTracker};

    fn client_for(base: &str) -> HttpJobClient {
        let mut config = Config::default();
        config.api.base_url = base.to_string();
        config.api.auth_password = None;
        HttpJobClient::from_config(&config).unwrap()
    }

    fn completed(id: &str, operation: Operation) -> CompletedJob {
        let mut tracker = StatusTracker::new(JobId::from(id), operation, JobStatus::Created);
        tracker.observe(&JobSnapshot { id: JobId::from(id), status: JobStatus::Completed, error_message: None });
        tracker.completed().unwrap()
    }

    #[test]
    fn download_urls_follow_the_operation_table() {
        let client = client_for("http://localhost:8081");
        let cases = [
            (Operation::Compress, "http://localhost:8081/api/pdf/jobs/abc/download"),
            (Operation::Merge, "http://localhost:8081/api/pdf/jobs/abc/download-merged"),
            (Operation::Split, "http://localhost:8081/api/pdf/jobs/abc/download-split"),
            (Operation::Protect, "http://localhost:8081/api/pdf/jobs/abc/download-protected"),
            (Operation::RemoveProtection, "http://localhost:8081/api/pdf/jobs/abc/download-protected"),
            (Operation::PdfToWord, "http://localhost:8081/api/pdf/jobs/abc/download-word"),
        ];
        for (operation, expected) in cases {
            assert_eq!(client.download_url(&completed("abc", operation)).unwrap().as_str(), expected);
        }
    }

    #[test]
    fn base_path_prefix_is_kept() {
        let client = client_for("https://tools.example.com/pdfstation/");
        let url = client.download_url(&completed("abc", Operation::Merge)).unwrap();
        assert_eq!(url.as_str(), "https://tools.example.com/pdfstation/api/pdf/jobs/abc/download-merged");
    }

    #[test]
    fn rejects_invalid_base_url() {
        let mut config = Config::default();
        config.api.base_url = "localhost:8081".to_string();
        assert!(HttpJobClient::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn invalid_request_never_leaves_the_client() {
        // Nothing listens on this port; a validation error proves no connection was attempted.
        let client = client_for("http://127.0.0.1:9");
        let request = JobRequest::Merge {
            files: vec![crate::models::UploadFile::new("a.pdf", b"%PDF-1.7".to_vec())],
        };
        let err = client.create_job(&request).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn status_for_malformed_id_is_rejected_locally() {
        let client = client_for("http://127.0.0.1:9");
        let err = client.job_status(&JobId::from("../admin")).await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }
}
