use crate::config::PollingConfig;
use crate::error::{ClientError, ClientResult};
use crate::models::{CompletedJob, JobId, JobRequest, JobStatus, Operation, StatusTracker};
use crate::services::job_client::JobService;
use crate::services::poller::JobPoller;
use crate::services::validation::RequestValidator;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

/// Client-side view of one submission.
///
/// ```text
/// Idle -> Submitting -> Polling -> Ready
///              |           |-> Failed
///              |-> Failed  |-> TimedOut
/// ```
///
/// `Ready`, `Failed`, `TimedOut` and `Cancelled` are terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum JobPhase {
    Idle,
    Submitting {
        operation: Operation,
    },
    Polling {
        job_id: JobId,
        status: JobStatus,
        polls: u32,
    },
    Ready(CompletedJob),
    Failed {
        job_id: Option<JobId>,
        message: String,
    },
    TimedOut {
        job_id: JobId,
        polls: u32,
    },
    Cancelled {
        job_id: Option<JobId>,
    },
}

impl JobPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobPhase::Ready(_) | JobPhase::Failed { .. } | JobPhase::TimedOut { .. } | JobPhase::Cancelled { .. }
        )
    }

    pub fn job_id(&self) -> Option<&JobId> {
        match self {
            JobPhase::Idle | JobPhase::Submitting { .. } => None,
            JobPhase::Polling { job_id, .. } | JobPhase::TimedOut { job_id, .. } => Some(job_id),
            JobPhase::Ready(job) => Some(job.id()),
            JobPhase::Failed { job_id, .. } | JobPhase::Cancelled { job_id } => job_id.as_ref(),
        }
    }

    pub(crate) fn from_result(result: &ClientResult<CompletedJob>) -> Self {
        let err = match result {
            Ok(job) => return JobPhase::Ready(job.clone()),
            Err(err) => err,
        };

        match err {
            ClientError::PollTimeout { job_id, polls } => JobPhase::TimedOut {
                job_id: JobId::from(job_id.as_str()),
                polls: *polls,
            },
            ClientError::JobFailed { job_id, .. } => JobPhase::Failed {
                job_id: Some(JobId::from(job_id.as_str())),
                message: err.user_message(),
            },
            _ => JobPhase::Failed {
                job_id: None,
                message: err.user_message(),
            },
        }
    }
}

/// Sets the phase unless a terminal phase has already been published.
pub(crate) fn publish(sender: &watch::Sender<JobPhase>, phase: JobPhase) {
    sender.send_if_modified(|current| {
        if current.is_terminal() {
            return false;
        }
        *current = phase;
        true
    });
}

/// Owned handle to a job running in the background.
///
/// Dropping the handle aborts the task, so no status checks outlive the
/// consumer that started them.
pub struct JobHandle {
    task: Option<JoinHandle<ClientResult<CompletedJob>>>,
    sender: Arc<watch::Sender<JobPhase>>,
    receiver: watch::Receiver<JobPhase>,
}

impl JobHandle {
    pub(crate) fn new(
        task: JoinHandle<ClientResult<CompletedJob>>,
        sender: Arc<watch::Sender<JobPhase>>,
        receiver: watch::Receiver<JobPhase>,
    ) -> Self {
        Self {
            task: Some(task),
            sender,
            receiver,
        }
    }

    pub fn phase(&self) -> JobPhase {
        self.receiver.borrow().clone()
    }

    /// A receiver that observes every phase change.
    pub fn subscribe(&self) -> watch::Receiver<JobPhase> {
        self.receiver.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |task| task.is_finished())
    }

    pub fn cancel(&self) {
        if let Some(task) = &self.task {
            task.abort();
        }
        let job_id = self.receiver.borrow().job_id().cloned();
        publish(&self.sender, JobPhase::Cancelled { job_id: job_id.clone() });
        if let Some(id) = job_id {
            info!(job_id = %id, "Stopped watching job");
        }
    }

    pub async fn wait(mut self) -> ClientResult<CompletedJob> {
        // The task stays owned by the handle while awaited, so dropping this
        // future still aborts it.
        let Some(task) = self.task.as_mut() else {
            return Err(ClientError::Cancelled("job handle already consumed".to_string()));
        };
        let joined = task.await;
        self.task = None;

        match joined {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(ClientError::Cancelled(match self.receiver.borrow().job_id() {
                Some(id) => format!("stopped watching job {id}"),
                None => "job cancelled before submission completed".to_string(),
            })),
            Err(e) => Err(ClientError::Cancelled(format!("job task ended unexpectedly: {e}"))),
        }
    }
}

impl Drop for JobHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Generic submit, poll, ready cycle shared by every operation.
#[derive(Clone)]
pub struct JobRunner {
    service: Arc<dyn JobService>,
    poller: JobPoller,
    validator: RequestValidator,
}

impl JobRunner {
    pub fn new(service: Arc<dyn JobService>, polling: PollingConfig, validator: RequestValidator) -> Self {
        let poller = JobPoller::new(service.clone(), polling);
        Self {
            service,
            poller,
            validator,
        }
    }

    pub fn poller(&self) -> &JobPoller {
        &self.poller
    }

    /// Submits and tracks the job on the current task.
    pub async fn run(&self, request: JobRequest) -> ClientResult<CompletedJob> {
        let (sender, _receiver) = watch::channel(JobPhase::Idle);
        let result = self.drive(request, &sender).await;
        publish(&sender, JobPhase::from_result(&result));
        result
    }

    /// Submits and tracks the job in the background.
    pub fn start(&self, request: JobRequest) -> JobHandle {
        let (sender, receiver) = watch::channel(JobPhase::Idle);
        let sender = Arc::new(sender);
        let progress = sender.clone();
        let runner = self.clone();

        let task = tokio::spawn(async move {
            let result = runner.drive(request, &progress).await;
            publish(&progress, JobPhase::from_result(&result));
            result
        });

        JobHandle::new(task, sender, receiver)
    }

    #[instrument(skip(self, request, progress), fields(operation = %request.operation()))]
    async fn drive(&self, request: JobRequest, progress: &watch::Sender<JobPhase>) -> ClientResult<CompletedJob> {
        let operation = request.operation();

        if let Err(e) = self.validator.validate_request(&request) {
            error!("Rejected {} request before submission: {}", operation, e);
            return Err(e);
        }

        if let Err(e) = self.poller.config().validate() {
            error!("Refusing to submit {} job: {}", operation, e);
            return Err(e);
        }

        publish(progress, JobPhase::Submitting { operation });

        let ack = match self.service.create_job(&request).await {
            Ok(ack) => ack,
            Err(e) => {
                error!("Failed to submit {} job: {}", operation, e);
                return Err(e);
            }
        };
        // Upload bytes are not needed while polling.
        drop(request);

        let mut tracker = StatusTracker::new(ack.id.clone(), operation, JobStatus::Created);
        tracker.observe(&ack);

        publish(
            progress,
            JobPhase::Polling {
                job_id: ack.id.clone(),
                status: tracker.status(),
                polls: 0,
            },
        );

        self.poller.wait_for_completion(tracker, progress).await
    }
}
