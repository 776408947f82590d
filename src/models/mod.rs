pub mod job;
pub mod request;

pub use job::{CompletedJob, JobId, JobSnapshot, JobStatus, Observation, Operation, OperationProfile, StatusTracker};
pub use request::{JobRequest, PageRange, PageRanges, ProtectOptions, SplitMode, UploadFile, DEFAULT_COMPRESSION_QUALITY};
