use std::sync::Arc;

use chrono::Utc;

use crate::{
    errors::{AppError, AppResult},
    models::domain::Badge,
    models::dto::{DispatchReport, EngineEvent, EngineStep, StepOutcome, StepStatus},
    repositories::Repositories,
    services::{
        attempt_service::AttemptService, badge_rules::BadgeRules,
        course_completion::CourseCompletionTracker, points_ledger::PointsLedger,
    },
    utils::KeyedLocks,
};

/// Runs the steps bound to each event and collects one outcome per step.
///
/// A step that fails does not stop the steps after it; every step is
/// idempotent so a whole event may be dispatched again.
pub struct RewardEngine {
    repos: Repositories,
    attempts: AttemptService,
    ledger: PointsLedger,
    badges: Arc<BadgeRules>,
    completion: CourseCompletionTracker,
}

impl RewardEngine {
    pub fn new(repos: Repositories) -> Self {
        let locks = Arc::new(KeyedLocks::new());
        let badges = Arc::new(BadgeRules::new(repos.clone(), locks.clone()));
        Self {
            attempts: AttemptService::new(repos.clone()),
            ledger: PointsLedger::new(repos.clone(), locks),
            completion: CourseCompletionTracker::new(repos.clone(), badges.clone()),
            badges,
            repos,
        }
    }

    pub fn attempts(&self) -> &AttemptService {
        &self.attempts
    }

    pub fn badges(&self) -> &BadgeRules {
        &self.badges
    }

    pub async fn seed_badges(&self) -> AppResult<Vec<Badge>> {
        self.badges.seed_catalog().await
    }

    /// Scores and submits the attempt, then runs the submission rewards.
    pub async fn on_attempt_submitted(&self, attempt_id: &str) -> DispatchReport {
        self.dispatch(EngineEvent::AttemptSubmitted {
            attempt_id: attempt_id.to_string(),
        })
        .await
    }

    pub async fn on_quest_expired(&self, quest_id: &str) -> DispatchReport {
        self.dispatch(EngineEvent::QuestExpired {
            quest_id: quest_id.to_string(),
        })
        .await
    }

    pub async fn on_course_expired(&self, course_id: &str) -> DispatchReport {
        self.dispatch(EngineEvent::CourseExpired {
            course_id: course_id.to_string(),
        })
        .await
    }

    pub async fn dispatch(&self, event: EngineEvent) -> DispatchReport {
        log::info!("Dispatching {} ({} steps)", event, event.steps().len());
        let mut report = DispatchReport::new(event.clone());

        for &step in event.steps() {
            let outcome = match self.execute(&event, step).await {
                Ok(outcome) => outcome,
                Err(err) => StepOutcome::from_error(step, &err),
            };

            match outcome.status {
                StepStatus::Applied => log::info!("{} {}: {}", event, step, outcome.message),
                StepStatus::Skipped => log::debug!("{} {} skipped: {}", event, step, outcome.message),
                StepStatus::Failed => log::warn!(
                    "{} {} failed ({}): {}",
                    event,
                    step,
                    outcome.error_code.unwrap_or("UNKNOWN"),
                    outcome.message
                ),
            }
            report.push(outcome);
        }

        if report.retryable_steps().is_empty() {
            self.record_expiry_rewards(&event).await;
        }
        report
    }

    /// Stamps expired content once its expiry rules have settled, so the
    /// sweeper stops redelivering it.
    async fn record_expiry_rewards(&self, event: &EngineEvent) {
        let now = Utc::now();
        let result = match event {
            EngineEvent::QuestExpired { quest_id } => {
                self.repos.quests.mark_rewards_dispatched(quest_id, now).await
            }
            EngineEvent::CourseExpired { course_id } => {
                self.repos.courses.mark_rewards_dispatched(course_id, now).await
            }
            EngineEvent::AttemptSubmitted { .. } => return,
        };

        match result {
            Ok(true) => log::info!("Recorded expiry rewards for {}", event),
            Ok(false) => {}
            Err(err) => log::warn!("Could not record expiry rewards for {}: {}", event, err),
        }
    }

    async fn execute(&self, event: &EngineEvent, step: EngineStep) -> AppResult<StepOutcome> {
        let subject = event.subject_id();
        match (event, step) {
            (EngineEvent::AttemptSubmitted { .. }, EngineStep::AggregateAttempt) => {
                self.attempts.aggregate_submission(subject).await
            }
            (EngineEvent::AttemptSubmitted { .. }, EngineStep::PointsLedger) => {
                self.ledger.credit_attempt(subject).await
            }
            (EngineEvent::AttemptSubmitted { .. }, EngineStep::FirstAttemptBadge) => {
                self.badges.first_attempt(subject).await
            }
            (EngineEvent::AttemptSubmitted { .. }, EngineStep::PerfectionistBadge) => {
                self.badges.perfectionist(subject).await
            }
            (EngineEvent::AttemptSubmitted { .. }, EngineStep::CourseCompletion) => {
                self.completion.after_submission(subject).await
            }
            (EngineEvent::QuestExpired { .. }, EngineStep::ExpertBadge) => {
                self.badges.expert(subject).await
            }
            (EngineEvent::QuestExpired { .. }, EngineStep::SpeedsterBadge) => {
                self.badges.speedster(subject).await
            }
            (EngineEvent::CourseExpired { .. }, EngineStep::CourseCompletion) => {
                self.completion.after_course_expired(subject).await
            }
            (event, step) => Err(AppError::InternalError(format!(
                "step {} is not bound to {}",
                step, event
            ))),
        }
    }
}
