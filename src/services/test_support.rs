use crate::error::{ClientError, ClientResult};
use crate::models::{JobId, JobRequest, JobSnapshot, JobStatus};
use crate::services::job_client::JobService;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

pub fn snapshot(id: &str, status: JobStatus) -> JobSnapshot {
    JobSnapshot {
        id: JobId::from(id),
        status,
        error_message: None,
    }
}

/// In-memory `JobService` that replays canned responses.
pub struct ScriptedService {
    ack: Mutex<ClientResult<JobSnapshot>>,
    statuses: Mutex<VecDeque<ClientResult<JobSnapshot>>>,
    repeat: Option<ClientResult<JobSnapshot>>,
    create_calls: AtomicU32,
    status_calls: AtomicU32,
}

impl ScriptedService {
    pub fn with_statuses(statuses: Vec<ClientResult<JobSnapshot>>) -> Self {
        Self {
            ack: Mutex::new(Ok(snapshot("abc", JobStatus::Created))),
            statuses: Mutex::new(statuses.into()),
            repeat: None,
            create_calls: AtomicU32::new(0),
            status_calls: AtomicU32::new(0),
        }
    }

    pub fn always(status: ClientResult<JobSnapshot>) -> Self {
        Self {
            repeat: Some(status),
            ..Self::with_statuses(Vec::new())
        }
    }

    pub fn acknowledging(self, ack: ClientResult<JobSnapshot>) -> Self {
        *self.ack.lock().unwrap() = ack;
        self
    }

    pub fn create_calls(&self) -> u32 {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobService for ScriptedService {
    async fn create_job(&self, _request: &JobRequest) -> ClientResult<JobSnapshot> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.ack.lock().unwrap().clone()
    }

    async fn job_status(&self, _job_id: &JobId) -> ClientResult<JobSnapshot> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(next) = self.statuses.lock().unwrap().pop_front() {
            return next;
        }
        self.repeat
            .clone()
            .unwrap_or_else(|| Err(ClientError::PollTransport("script exhausted".to_string())))
    }
}
