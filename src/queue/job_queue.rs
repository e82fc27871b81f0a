//! Priority job queue shared by the worker pool

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Named queues, listed from highest to lowest drain priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueName {
    SlipGeneration,
    PythonRequests,
    MlProcessing,
    Default,
}

impl QueueName {
    /// Drain order used by the workers
    pub const PRIORITY: [QueueName; 4] = [
        QueueName::SlipGeneration,
        QueueName::PythonRequests,
        QueueName::MlProcessing,
        QueueName::Default,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::SlipGeneration => "slip_generation",
            QueueName::PythonRequests => "python_requests",
            QueueName::MlProcessing => "ml_processing",
            QueueName::Default => "default",
        }
    }

    fn index(&self) -> usize {
        match self {
            QueueName::SlipGeneration => 0,
            QueueName::PythonRequests => 1,
            QueueName::MlProcessing => 2,
            QueueName::Default => 3,
        }
    }
}

/// Work item carried through a queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobPayload {
    GenerateSlips {
        job_id: String,
        master_slip_id: i64,
    },
}

impl JobPayload {
    pub fn job_id(&self) -> &str {
        match self {
            JobPayload::GenerateSlips { job_id, .. } => job_id,
        }
    }
}

/// FIFO queues drained in [`QueueName::PRIORITY`] order.
///
/// Pushes wake one waiting worker; a worker that takes an item re-notifies
/// when work remains so a burst of pushes cannot strand payloads behind a
/// single stored permit.
pub struct JobQueue {
    queues: Mutex<[VecDeque<JobPayload>; 4]>,
    notify: Notify,
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(Default::default()),
            notify: Notify::new(),
        }
    }

    /// Push a payload onto a queue, optionally after a delay.
    ///
    /// Delayed payloads are invisible to workers until the delay elapses.
    pub fn enqueue(self: &Arc<Self>, queue: QueueName, payload: JobPayload, delay: Duration) {
        if delay.is_zero() {
            self.push(queue, payload);
            return;
        }
        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.push(queue, payload);
        });
    }

    fn push(&self, queue: QueueName, payload: JobPayload) {
        tracing::debug!(queue = queue.as_str(), job_id = payload.job_id(), "Enqueued job");
        self.queues.lock()[queue.index()].push_back(payload);
        self.notify.notify_one();
    }

    /// Take the next payload without waiting
    pub fn try_pop(&self) -> Option<(QueueName, JobPayload)> {
        let mut queues = self.queues.lock();
        for name in QueueName::PRIORITY {
            if let Some(payload) = queues[name.index()].pop_front() {
                return Some((name, payload));
            }
        }
        None
    }

    /// Wait until a payload is available and take it
    pub async fn pop(&self) -> (QueueName, JobPayload) {
        loop {
            {
                let mut queues = self.queues.lock();
                for name in QueueName::PRIORITY {
                    if let Some(payload) = queues[name.index()].pop_front() {
                        if queues.iter().any(|q| !q.is_empty()) {
                            self.notify.notify_one();
                        }
                        return (name, payload);
                    }
                }
            }
            self.notify.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.queues.lock().iter().map(|q| q.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for JobQueue {
    fn default() -> Self {
        Self::new()
    }
}
