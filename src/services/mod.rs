pub mod download;
pub mod job_client;
pub mod lifecycle;
pub mod poller;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

pub use download::DownloadService;
pub use job_client::{HttpJobClient, JobService};
pub use lifecycle::{JobHandle, JobPhase, JobRunner};
pub use poller::JobPoller;
pub use validation::RequestValidator;
