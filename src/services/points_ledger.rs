use std::sync::Arc;

use chrono::Utc;

use crate::{
    errors::{AppError, AppResult},
    models::domain::{EduquestUser, PointsCredit, UserQuestAttempt},
    models::dto::{EngineStep, StepOutcome},
    repositories::Repositories,
    services::load,
    utils::KeyedLocks,
};

const STEP: EngineStep = EngineStep::PointsLedger;

/// Keeps `total_points` equal to the sum of each quest's best submitted score.
pub struct PointsLedger {
    repos: Repositories,
    locks: Arc<KeyedLocks>,
}

/// Points owed for `score` given the best score already credited on the quest.
pub fn improvement_over(score: f64, prior_best: f64) -> f64 {
    if score > prior_best {
        score - prior_best
    } else {
        0.0
    }
}

/// Best score among `others` that this user has already been credited for.
///
/// Attempts that were submitted but not yet credited are ignored, so two
/// submissions processed out of order still converge on the quest's best.
pub fn prior_best(user: &EduquestUser, others: &[UserQuestAttempt]) -> f64 {
    others
        .iter()
        .filter(|attempt| attempt.submitted && user.credit_for(&attempt.id).is_some())
        .map(|attempt| attempt.total_score_achieved)
        .fold(0.0, f64::max)
}

impl PointsLedger {
    pub fn new(repos: Repositories, locks: Arc<KeyedLocks>) -> Self {
        Self { repos, locks }
    }

    pub async fn credit_attempt(&self, attempt_id: &str) -> AppResult<StepOutcome> {
        let attempt = load::attempt(&self.repos, attempt_id).await?;
        let quest = load::quest(&self.repos, &attempt.quest_id).await?;
        load::user(&self.repos, &attempt.user_id).await?;

        if !attempt.submitted {
            return Err(AppError::InvalidState(format!(
                "attempt '{}' has not been submitted",
                attempt.id
            )));
        }
        if load::excluded_from_rewards(&self.repos, &quest).await? {
            return Ok(StepOutcome::skipped(STEP, "private content earns no points"));
        }

        let _guard = self
            .locks
            .lock(&format!("ledger:{}:{}", attempt.user_id, quest.id))
            .await;

        // Re-read under the lock so the credit list is current.
        let user = load::user(&self.repos, &attempt.user_id).await?;
        if let Some(credit) = user.credit_for(&attempt.id) {
            return Ok(StepOutcome::skipped(
                STEP,
                format!("attempt already credited with {} points", credit.delta),
            ));
        }

        let others = self
            .repos
            .attempts
            .list_submitted_by_user_and_quest_excluding(&attempt.user_id, &quest.id, &attempt.id)
            .await?;
        let best_so_far = prior_best(&user, &others);
        let delta = improvement_over(attempt.total_score_achieved, best_so_far);

        let credit = PointsCredit {
            attempt_id: attempt.id.clone(),
            quest_id: quest.id.clone(),
            score: attempt.total_score_achieved,
            delta,
            credited_on: Utc::now(),
        };

        if !self.repos.users.credit_points(&user.id, credit).await? {
            return Ok(StepOutcome::skipped(STEP, "attempt already credited"));
        }

        if delta > 0.0 {
            log::info!(
                "Credited {} points to user {} for attempt {} (prior best {})",
                delta,
                user.id,
                attempt.id,
                best_so_far
            );
            Ok(StepOutcome::applied(
                STEP,
                format!("credited {} points (prior best {})", delta, best_so_far),
            ))
        } else {
            Ok(StepOutcome::skipped(
                STEP,
                format!(
                    "score {} does not beat prior best {}",
                    attempt.total_score_achieved, best_so_far
                ),
            ))
        }
    }
}
