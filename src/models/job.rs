use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Server-assigned job identifier. Opaque to the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    Compress,
    Merge,
    Split,
    Protect,
    RemoveProtection,
    PdfToWord,
}

/// Routing and naming for one operation kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationProfile {
    pub create_path: &'static str,
    pub download_suffix: &'static str,
    pub file_prefix: &'static str,
    pub extension: &'static str,
    pub content_type: &'static str,
}

const PDF: &str = "application/pdf";
const DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

static COMPRESS_PROFILE: OperationProfile = OperationProfile {
    create_path: "/api/pdf/jobs/compress",
    download_suffix: "download",
    file_prefix: "compressed",
    extension: "pdf",
    content_type: PDF,
};

static MERGE_PROFILE: OperationProfile = OperationProfile {
    create_path: "/api/pdf/jobs/merge",
    download_suffix: "download-merged",
    file_prefix: "merged",
    extension: "pdf",
    content_type: PDF,
};

static SPLIT_PROFILE: OperationProfile = OperationProfile {
    create_path: "/api/pdf/jobs/split",
    download_suffix: "download-split",
    file_prefix: "split",
    extension: "zip",
    content_type: "application/octet-stream",
};

static PROTECT_PROFILE: OperationProfile = OperationProfile {
    create_path: "/api/pdf/jobs/protect",
    download_suffix: "download-protected",
    file_prefix: "protected",
    extension: "pdf",
    content_type: PDF,
};

// The service serves unprotected output from the protected-download route.
static REMOVE_PROTECTION_PROFILE: OperationProfile = OperationProfile {
    create_path: "/api/pdf/jobs/remove-protection",
    download_suffix: "download-protected",
    file_prefix: "unprotected",
    extension: "pdf",
    content_type: PDF,
};

static PDF_TO_WORD_PROFILE: OperationProfile = OperationProfile {
    create_path: "/api/pdf/jobs/pdf-to-word",
    download_suffix: "download-word",
    file_prefix: "converted",
    extension: "docx",
    content_type: DOCX,
};

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::Compress,
        Operation::Merge,
        Operation::Split,
        Operation::Protect,
        Operation::RemoveProtection,
        Operation::PdfToWord,
    ];

    pub fn profile(&self) -> &'static OperationProfile {
        match self {
            Operation::Compress => &COMPRESS_PROFILE,
            Operation::Merge => &MERGE_PROFILE,
            Operation::Split => &SPLIT_PROFILE,
            Operation::Protect => &PROTECT_PROFILE,
            Operation::RemoveProtection => &REMOVE_PROTECTION_PROFILE,
            Operation::PdfToWord => &PDF_TO_WORD_PROFILE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Compress => "COMPRESS",
            Operation::Merge => "MERGE",
            Operation::Split => "SPLIT",
            Operation::Protect => "PROTECT",
            Operation::RemoveProtection => "REMOVE_PROTECTION",
            Operation::PdfToWord => "PDF_TO_WORD",
        }
    }

    /// Default name for a job's result artifact.
    pub fn result_file_name(&self, job_id: &JobId) -> String {
        let profile = self.profile();
        format!("{}_{}.{}", profile.file_prefix, job_id, profile.extension)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == normalized)
            .ok_or_else(|| format!("Unknown operation: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Created,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    fn rank(&self) -> u8 {
        match self {
            JobStatus::Created => 0,
            JobStatus::Processing => 1,
            JobStatus::Completed | JobStatus::Failed => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Forward-only transitions. Staying put is allowed for non-terminal states.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return *self == next;
        }
        next.rank() >= self.rank()
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Created => write!(f, "CREATED"),
            JobStatus::Processing => write!(f, "PROCESSING"),
            JobStatus::Completed => write!(f, "COMPLETED"),
            JobStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// What the status and create endpoints return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub id: JobId,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    Advanced,
    Unchanged,
    /// The snapshot reported an earlier status than one already seen.
    Stale,
}

/// Most advanced status observed for one job.
#[derive(Debug, Clone)]
pub struct StatusTracker {
    job_id: JobId,
    operation: Operation,
    status: JobStatus,
    error_message: Option<String>,
    polls: u32,
}

impl StatusTracker {
    pub fn new(job_id: JobId, operation: Operation, initial: JobStatus) -> Self {
        Self {
            job_id,
            operation,
            status: initial,
            error_message: None,
            polls: 0,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn record_poll(&mut self) {
        self.polls += 1;
    }

    pub fn observe(&mut self, snapshot: &JobSnapshot) -> Observation {
        if snapshot.status == self.status {
            return Observation::Unchanged;
        }
        if !self.status.can_transition_to(snapshot.status) {
            return Observation::Stale;
        }
        self.status = snapshot.status;
        if snapshot.status == JobStatus::Failed {
            self.error_message = snapshot.error_message.clone();
        }
        Observation::Advanced
    }

    /// Proof of completion, only available once COMPLETED has been observed.
    pub fn completed(&self) -> Option<CompletedJob> {
        (self.status == JobStatus::Completed).then(|| CompletedJob {
            id: self.job_id.clone(),
            operation: self.operation,
            polls: self.polls,
            completed_at: Utc::now(),
        })
    }
}

/// A job observed in the COMPLETED state. Download APIs take this instead of
/// a bare id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedJob {
    id: JobId,
    operation: Operation,
    polls: u32,
    completed_at: DateTime<Utc>,
}

impl CompletedJob {
    pub fn id(&self) -> &JobId {
        &self.id
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    pub fn result_file_name(&self) -> String {
        self.operation.result_file_name(&self.id)
    }
}
