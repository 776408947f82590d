use crate::config::PollingConfig;
use crate::error::{ClientError, ClientResult};
use crate::models::{CompletedJob, JobId, JobStatus, Observation, Operation, StatusTracker};
use crate::services::job_client::JobService;
use crate::services::lifecycle::{publish, JobHandle, JobPhase};
use crate::services::validation::validate_job_id;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Drives status checks for one job on a fixed interval until it reaches a
/// terminal status or the poll bound runs out.
#[derive(Clone)]
pub struct JobPoller {
    service: Arc<dyn JobService>,
    config: PollingConfig,
}

impl JobPoller {
    pub fn new(service: Arc<dyn JobService>, config: PollingConfig) -> Self {
        Self { service, config }
    }

    pub fn config(&self) -> &PollingConfig {
        &self.config
    }

    /// Polls in the background and hands back an owned handle. Dropping the
    /// handle stops the polling.
    pub fn spawn(&self, job_id: JobId, operation: Operation) -> JobHandle {
        let initial = JobPhase::Polling {
            job_id: job_id.clone(),
            status: JobStatus::Created,
            polls: 0,
        };
        let (sender, receiver) = watch::channel(initial);
        let sender = Arc::new(sender);
        let poller = self.clone();
        let progress = sender.clone();

        let task = tokio::spawn(async move {
            let tracker = StatusTracker::new(job_id, operation, JobStatus::Created);
            let result = poller.wait_for_completion(tracker, &progress).await;
            publish(&progress, JobPhase::from_result(&result));
            result
        });

        JobHandle::new(task, sender, receiver)
    }

    /// Runs the poll loop on the current task.
    ///
    /// The first status check happens one interval after the call. Failed
    /// checks are logged and count toward the bound; they never end the loop.
    pub async fn wait_for_completion(
        &self,
        mut tracker: StatusTracker,
        progress: &watch::Sender<JobPhase>,
    ) -> ClientResult<CompletedJob> {
        validate_job_id(tracker.job_id())?;
        self.config.validate()?;

        if let Some(outcome) = terminal_outcome(&tracker) {
            return outcome;
        }

        let period = self.config.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            job_id = %tracker.job_id(),
            interval_ms = period.as_millis() as u64,
            max_polls = self.config.max_polls,
            "Polling job status"
        );

        while tracker.polls() < self.config.max_polls {
            ticker.tick().await;
            tracker.record_poll();

            match self.service.job_status(tracker.job_id()).await {
                Ok(snapshot) => match tracker.observe(&snapshot) {
                    Observation::Advanced => {
                        info!(job_id = %tracker.job_id(), poll = tracker.polls(), status = %tracker.status(), "Job status changed");
                    }
                    Observation::Unchanged => {
                        debug!(job_id = %tracker.job_id(), poll = tracker.polls(), status = %tracker.status(), "Job status unchanged");
                    }
                    Observation::Stale => {
                        warn!(
                            job_id = %tracker.job_id(),
                            poll = tracker.polls(),
                            reported = %snapshot.status,
                            kept = %tracker.status(),
                            "Ignoring status that would move the job backwards"
                        );
                    }
                },
                Err(e) => {
                    warn!(job_id = %tracker.job_id(), poll = tracker.polls(), error = %e, "Status check failed, retrying on next tick");
                }
            }

            publish(
                progress,
                JobPhase::Polling {
                    job_id: tracker.job_id().clone(),
                    status: tracker.status(),
                    polls: tracker.polls(),
                },
            );

            if let Some(outcome) = terminal_outcome(&tracker) {
                return outcome;
            }
        }

        warn!(job_id = %tracker.job_id(), polls = tracker.polls(), "Giving up on job after reaching the poll limit");
        Err(ClientError::PollTimeout {
            job_id: tracker.job_id().to_string(),
            polls: tracker.polls(),
        })
    }
}

fn terminal_outcome(tracker: &StatusTracker) -> Option<ClientResult<CompletedJob>> {
    match tracker.status() {
        JobStatus::Completed => tracker.completed().map(|job| {
            info!(job_id = %job.id(), polls = job.polls(), "Job completed");
            Ok(job)
        }),
        JobStatus::Failed => {
            warn!(job_id = %tracker.job_id(), message = ?tracker.error_message(), "Job failed");
            Some(Err(ClientError::JobFailed {
                job_id: tracker.job_id().to_string(),
                message: tracker.error_message().map(str::to_string),
            }))
        }
        JobStatus::Created | JobStatus::Processing => None,
    }
}
