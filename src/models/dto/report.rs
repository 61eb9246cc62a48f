use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::errors::AppError;
use crate::models::dto::event::{EngineEvent, EngineStep};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Copy)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// The step changed state (score persisted, points credited, badge awarded...).
    Applied,
    /// Nothing to do: zero candidates, already done, private content, wrong state.
    Skipped,
    Failed,
}

#[derive(Clone, Debug, Serialize)]
pub struct StepOutcome {
    pub step: EngineStep,
    pub status: StepStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    #[serde(skip_serializing)]
    pub retryable: bool,
}

impl StepOutcome {
    pub fn applied(step: EngineStep, message: impl Into<String>) -> Self {
        Self {
            step,
            status: StepStatus::Applied,
            message: message.into(),
            error_code: None,
            retryable: false,
        }
    }

    pub fn skipped(step: EngineStep, message: impl Into<String>) -> Self {
        Self {
            step,
            status: StepStatus::Skipped,
            message: message.into(),
            error_code: None,
            retryable: false,
        }
    }

    /// Maps a step error onto the outcome taxonomy. Invalid state is an
    /// informational skip and a lost create race is a success.
    pub fn from_error(step: EngineStep, err: &AppError) -> Self {
        match err {
            AppError::InvalidState(message) => Self::skipped(step, message.clone()),
            AppError::ConcurrencyConflict(message) => {
                Self::skipped(step, format!("already recorded: {}", message))
            }
            other => Self {
                step,
                status: StepStatus::Failed,
                message: other.to_string(),
                error_code: Some(other.error_code()),
                retryable: other.is_retryable(),
            },
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == StepStatus::Failed
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct DispatchReport {
    pub event: EngineEvent,
    pub outcomes: Vec<StepOutcome>,
    pub dispatched_at: DateTime<Utc>,
}

impl DispatchReport {
    pub fn new(event: EngineEvent) -> Self {
        Self {
            event,
            outcomes: Vec::new(),
            dispatched_at: Utc::now(),
        }
    }

    pub fn push(&mut self, outcome: StepOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn outcome(&self, step: EngineStep) -> Option<&StepOutcome> {
        self.outcomes.iter().find(|o| o.step == step)
    }

    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(StepOutcome::is_failed)
    }

    pub fn retryable_steps(&self) -> Vec<EngineStep> {
        self.outcomes
            .iter()
            .filter(|o| o.is_failed() && o.retryable)
            .map(|o| o.step)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_state_is_reported_as_skip() {
        let err = AppError::InvalidState("quest is still active".into());
        let outcome = StepOutcome::from_error(EngineStep::ExpertBadge, &err);

        assert_eq!(outcome.status, StepStatus::Skipped);
        assert_eq!(outcome.message, "quest is still active");
        assert!(outcome.error_code.is_none());
    }

    #[test]
    fn concurrency_conflict_is_not_a_failure() {
        let err = AppError::ConcurrencyConflict("badge exists".into());
        let outcome = StepOutcome::from_error(EngineStep::FirstAttemptBadge, &err);

        assert!(!outcome.is_failed());
    }

    #[test]
    fn not_found_fails_without_retry() {
        let err = AppError::NotFound("quest q-1".into());
        let outcome = StepOutcome::from_error(EngineStep::PointsLedger, &err);

        assert!(outcome.is_failed());
        assert!(!outcome.retryable);
        assert_eq!(outcome.error_code, Some("NOT_FOUND"));
    }

    #[test]
    fn report_lists_only_retryable_failures() {
        let mut report = DispatchReport::new(EngineEvent::QuestExpired {
            quest_id: "q-1".into(),
        });
        report.push(StepOutcome::from_error(
            EngineStep::ExpertBadge,
            &AppError::DatabaseError("timeout".into()),
        ));
        report.push(StepOutcome::from_error(
            EngineStep::SpeedsterBadge,
            &AppError::NotFound("quest".into()),
        ));

        assert!(report.has_failures());
        assert_eq!(report.retryable_steps(), vec![EngineStep::ExpertBadge]);
        assert!(report.outcome(EngineStep::SpeedsterBadge).is_some());
    }
}
