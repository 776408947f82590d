use thiserror::Error;

pub const GENERIC_FAILURE_MESSAGE: &str = "Processing failed. Please try again.";
pub const TIMEOUT_MESSAGE: &str = "Processing timeout. Please try again.";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Submission error: {0}")]
    Submission(String),
    #[error("Poll transport error: {0}")]
    PollTransport(String),
    #[error("Job {job_id} failed: {}", message.as_deref().unwrap_or("no message"))]
    JobFailed {
        job_id: String,
        message: Option<String>,
    },
    #[error("Job {job_id} did not finish after {polls} polls")]
    PollTimeout { job_id: String, polls: u32 },
    #[error("Download error: {0}")]
    Download(String),
    #[error("Service error: {0}")]
    Service(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Cancelled: {0}")]
    Cancelled(String),
}

impl ClientError {
    /// Message suitable for showing to an end user.
    ///
    /// A server-reported failure message is passed through verbatim; the
    /// other variants collapse to their display form.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::JobFailed { message: Some(msg), .. } if !msg.trim().is_empty() => msg.clone(),
            ClientError::JobFailed { .. } => GENERIC_FAILURE_MESSAGE.to_string(),
            ClientError::PollTimeout { .. } => TIMEOUT_MESSAGE.to_string(),
            ClientError::Validation(msg) => msg.clone(),
            other => other.to_string(),
        }
    }

    /// Whether the job may still be running server-side.
    pub fn job_may_be_running(&self) -> bool {
        matches!(self, ClientError::PollTimeout { .. } | ClientError::Cancelled(_))
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Io(err.to_string())
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
