use crate::error::{ClientError, ClientResult};
use crate::models::{JobId, JobRequest, SplitMode, UploadFile};
use url::Url;

const PDF_SIGNATURE: &[u8] = b"%PDF-";
const MAX_JOB_ID_LENGTH: usize = 100;
const MAX_QUALITY: u8 = 100;
const MIN_MERGE_FILES: usize = 2;

/// Checks everything that can be rejected before talking to the service.
#[derive(Debug, Clone)]
pub struct RequestValidator {
    max_file_size_bytes: u64,
}

impl RequestValidator {
    pub fn new(max_file_size_mb: u64) -> Self {
        Self {
            max_file_size_bytes: max_file_size_mb.saturating_mul(1024 * 1024),
        }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size_bytes
    }

    pub fn validate_request(&self, request: &JobRequest) -> ClientResult<()> {
        for file in request.files() {
            self.validate_upload(file)?;
        }

        match request {
            JobRequest::Compress { quality, .. } => {
                if *quality > MAX_QUALITY {
                    return Err(ClientError::Validation(format!(
                        "Compression quality must be between 0 and {MAX_QUALITY}, got {quality}"
                    )));
                }
            }
            JobRequest::Merge { files } => {
                if files.len() < MIN_MERGE_FILES {
                    return Err(ClientError::Validation(format!(
                        "Please upload at least {MIN_MERGE_FILES} PDF files"
                    )));
                }
            }
            JobRequest::Split { mode, .. } => {
                // Page ranges are checked when parsed; the interval is the only free value.
                if let SplitMode::Interval(0) = mode {
                    return Err(ClientError::Validation("Interval must be at least 1".to_string()));
                }
            }
            JobRequest::Protect { options, .. } => {
                if options.user_password.is_empty() {
                    return Err(ClientError::Validation(
                        "Please set a User Password (required to open the PDF)".to_string(),
                    ));
                }
            }
            JobRequest::RemoveProtection { password, .. } => {
                if password.is_empty() {
                    return Err(ClientError::Validation("Please enter the current password".to_string()));
                }
            }
            JobRequest::PdfToWord { .. } => {}
        }

        Ok(())
    }

    pub fn validate_upload(&self, file: &UploadFile) -> ClientResult<()> {
        if file.is_empty() {
            return Err(ClientError::Validation(format!("{} is empty", file.file_name)));
        }

        if file.len() > self.max_file_size_bytes {
            return Err(ClientError::Validation(format!(
                "{} is too large: {} bytes (max: {} bytes)",
                file.file_name,
                file.len(),
                self.max_file_size_bytes
            )));
        }

        if !file.bytes.starts_with(PDF_SIGNATURE) {
            return Err(ClientError::Validation(format!("{} is not a PDF file", file.file_name)));
        }

        Ok(())
    }
}

/// Job ids end up in URL paths, so only a conservative alphabet is accepted.
pub fn validate_job_id(job_id: &JobId) -> ClientResult<()> {
    let id = job_id.as_str();

    if id.is_empty() || id.len() > MAX_JOB_ID_LENGTH {
        return Err(ClientError::Validation(format!(
            "Job ID must be between 1 and {MAX_JOB_ID_LENGTH} characters"
        )));
    }

    if !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(ClientError::Validation("Job ID contains invalid characters".to_string()));
    }

    Ok(())
}

pub fn validate_base_url(raw: &str) -> ClientResult<Url> {
    let url = Url::parse(raw).map_err(|e| ClientError::Config(format!("Invalid API URL '{raw}': {e}")))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ClientError::Config(format!(
            "API URL must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(ClientError::Config("API URL must have a host".to_string()));
    }

    if url.query().is_some() || url.fragment().is_some() {
        return Err(ClientError::Config("API URL must not carry a query or fragment".to_string()));
    }

    Ok(url)
}

/// Reduces a server-suggested file name to a bare, non-hidden name.
pub fn safe_file_name(candidate: &str) -> Option<String> {
    let name = candidate
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches('"');

    if name.is_empty() || name.starts_with('.') || name.contains("..") {
        return None;
    }

    if name.chars().any(|c| c.is_control()) {
        return None;
    }

    Some(name.to_string())
}
