use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{
    config::Config,
    errors::{AppError, AppResult},
    models::dto::{DispatchReport, EngineEvent},
    services::reward_engine::RewardEngine,
    utils::{retry_async_when, RetryConfig},
};

/// Producer side of the event queue. Cheap to clone.
#[derive(Clone)]
pub struct TaskQueue {
    sender: mpsc::Sender<EngineEvent>,
}

/// Consumer side: dispatches each queued event through the engine.
pub struct TaskWorker {
    engine: Arc<RewardEngine>,
    receiver: mpsc::Receiver<EngineEvent>,
    retry: RetryConfig,
}

impl TaskQueue {
    pub fn new(engine: Arc<RewardEngine>, config: &Config) -> (Self, TaskWorker) {
        let (sender, receiver) = mpsc::channel(config.task_queue_capacity);
        let worker = TaskWorker {
            engine,
            receiver,
            retry: RetryConfig::new(config.task_max_attempts, config.task_base_backoff()),
        };
        (Self { sender }, worker)
    }

    /// Waits for queue capacity, then hands the event to the worker.
    pub async fn enqueue(&self, event: EngineEvent) -> AppResult<()> {
        log::debug!("Enqueueing {}", event);
        self.sender
            .send(event)
            .await
            .map_err(|err| AppError::InternalError(format!("task queue closed, dropped {}", err.0)))
    }
}

impl TaskWorker {
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Drains the queue until every producer is dropped.
    pub async fn run(mut self) {
        log::info!("Task worker started");
        while let Some(event) = self.receiver.recv().await {
            self.process(event).await;
        }
        log::info!("Task queue closed, worker stopping");
    }

    /// Processes whatever is queued right now without waiting for more.
    pub async fn run_pending(&mut self) -> Vec<DispatchReport> {
        let mut reports = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            reports.push(self.process(event).await);
        }
        reports
    }

    /// Dispatches the event again while retryable failures remain.
    pub async fn process(&self, event: EngineEvent) -> DispatchReport {
        let result = retry_async_when(
            self.retry.clone(),
            |report: &DispatchReport| {
                log::warn!(
                    "Retrying {} for steps {:?}",
                    report.event,
                    report.retryable_steps()
                );
                true
            },
            || {
                let engine = self.engine.clone();
                let event = event.clone();
                async move {
                    let report = engine.dispatch(event).await;
                    if report.retryable_steps().is_empty() {
                        Ok(report)
                    } else {
                        Err(report)
                    }
                }
            },
        )
        .await;

        let report = match result {
            Ok(report) | Err(report) => report,
        };

        match serde_json::to_string(&report) {
            Ok(json) if report.has_failures() => log::warn!("Dispatch report: {}", json),
            Ok(json) => log::info!("Dispatch report: {}", json),
            Err(err) => log::error!("Failed to serialize report for {}: {}", report.event, err),
        }
        report
    }
}
