//! Job queue infrastructure - In-process background workers

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::domain::jobs::{Job, JobQueue};
use crate::domain::provider_log::ProviderLogService;
use crate::domain::DomainError;

pub const DEFAULT_JOB_QUEUE_CAPACITY: usize = 256;

/// Bounded queue handing jobs to a worker task
///
/// `enqueue` waits for capacity, so a slow worker applies backpressure to
/// the runs producing jobs.
#[derive(Debug, Clone)]
pub struct TokioJobQueue {
    sender: mpsc::Sender<Job>,
}

/// Worker task draining a [`TokioJobQueue`]
#[derive(Debug)]
pub struct JobWorker {
    handle: JoinHandle<()>,
}

impl JobWorker {
    /// Waits until every queue handle is dropped and pending jobs ran
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Job worker stopped abnormally");
        }
    }
}

impl TokioJobQueue {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Job>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Creates the queue and spawns its worker
    pub fn start(capacity: usize, service: ProviderLogService) -> (Self, JobWorker) {
        let (queue, receiver) = Self::new(capacity);
        (queue, spawn_worker(receiver, service))
    }
}

pub fn spawn_worker(mut receiver: mpsc::Receiver<Job>, service: ProviderLogService) -> JobWorker {
    let handle = tokio::spawn(async move {
        while let Some(job) = receiver.recv().await {
            let name = job.name();

            match job {
                Job::CreateProviderLog(log) => {
                    let uuid = log.data.uuid;
                    match service.create_provider_log(log).await {
                        Ok(_) => info!(job = name, %uuid, "Job completed"),
                        Err(e) => error!(job = name, %uuid, error = %e, "Job failed"),
                    }
                }
            }
        }
    });

    JobWorker { handle }
}

#[async_trait]
impl JobQueue for TokioJobQueue {
    async fn enqueue(&self, job: Job) -> Result<(), DomainError> {
        self.sender
            .send(job)
            .await
            .map_err(|_| DomainError::queue("Job queue is closed"))
    }
}
