//! Client for the PDFStation job service.
//!
//! Every operation follows the same cycle: validate and upload the files,
//! receive a job id, poll the job on a fixed interval until it completes or
//! fails, then download the operation's result artifact.

pub mod config;
pub mod error;
pub mod models;
pub mod services;

pub use config::{load_config, Config};
pub use error::{ClientError, ClientResult};
pub use models::{CompletedJob, JobId, JobRequest, JobSnapshot, JobStatus, Operation};
pub use services::{DownloadService, HttpJobClient, JobHandle, JobPhase, JobPoller, JobRunner, JobService};
