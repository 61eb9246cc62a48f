use std::time::Duration;

use chrono::Utc;
use tokio::time::sleep;

use crate::{
    config::Config,
    errors::AppResult,
    models::dto::EngineEvent,
    repositories::Repositories,
    services::task_queue::TaskQueue,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    pub quests_expired: usize,
    pub courses_expired: usize,
    /// Expiry events handed to the worker, including redeliveries.
    pub events_enqueued: usize,
}

/// Flips quests and courses past their expiration date to expired and
/// enqueues the matching expiry event.
///
/// Expired content keeps being enqueued on every pass until the engine
/// stamps it as dispatched, so an event lost before it was processed is
/// delivered again.
pub struct ExpirySweeper {
    repos: Repositories,
    queue: TaskQueue,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(repos: Repositories, queue: TaskQueue, config: &Config) -> Self {
        Self {
            repos,
            queue,
            interval: config.expiry_sweep_interval(),
        }
    }

    pub async fn run(&self) {
        log::info!(
            "Starting expiry sweeper loop (interval {}s)",
            self.interval.as_secs()
        );

        loop {
            match self.run_once().await {
                Ok(summary) if summary == SweepSummary::default() => {
                    log::debug!("Expiry sweep found nothing due");
                }
                Ok(summary) => log::info!(
                    "Expiry sweep expired {} quest(s) and {} course(s), enqueued {} event(s)",
                    summary.quests_expired,
                    summary.courses_expired,
                    summary.events_enqueued
                ),
                Err(err) => log::warn!("Expiry sweep failed: {}", err),
            }

            sleep(self.interval).await;
        }
    }

    /// One pass: expire what is due, then enqueue every expired quest and
    /// course whose rewards are not yet stamped.
    pub async fn run_once(&self) -> AppResult<SweepSummary> {
        let now = Utc::now();
        let mut summary = SweepSummary::default();

        for quest in self.repos.quests.list_active().await? {
            if quest.is_due_for_expiry(now) && self.repos.quests.mark_expired(&quest.id).await? {
                summary.quests_expired += 1;
            }
        }

        for course in self.repos.courses.list_active().await? {
            if course.is_due_for_expiry(now) && self.repos.courses.mark_expired(&course.id).await? {
                summary.courses_expired += 1;
            }
        }

        for quest in self.repos.quests.list_expired_awaiting_rewards().await? {
            self.queue
                .enqueue(EngineEvent::QuestExpired { quest_id: quest.id })
                .await?;
            summary.events_enqueued += 1;
        }

        for course in self.repos.courses.list_expired_awaiting_rewards().await? {
            self.queue
                .enqueue(EngineEvent::CourseExpired {
                    course_id: course.id,
                })
                .await?;
            summary.events_enqueued += 1;
        }

        Ok(summary)
    }
}
