use chrono::Utc;

use crate::{
    errors::{AppError, AppResult},
    models::domain::UserQuestAttempt,
    models::dto::{EngineStep, StepOutcome},
    repositories::Repositories,
    services::{load, scoring::ScoringService},
};

pub struct AttemptService {
    repos: Repositories,
}

impl AttemptService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// Opens a new attempt with an unselected row for every answer.
    pub async fn start_attempt(&self, user_id: &str, quest_id: &str) -> AppResult<UserQuestAttempt> {
        load::user(&self.repos, user_id).await?;
        let quest = load::quest(&self.repos, quest_id).await?;

        if quest.is_expired() {
            return Err(AppError::InvalidState(format!(
                "quest '{}' has expired",
                quest.id
            )));
        }

        let used = self
            .repos
            .attempts
            .count_by_user_and_quest(user_id, quest_id)
            .await?;
        if used >= quest.max_attempts as usize {
            return Err(AppError::ValidationError(format!(
                "attempt limit of {} reached for quest '{}'",
                quest.max_attempts, quest.id
            )));
        }

        let attempt = UserQuestAttempt::start(user_id, &quest);
        let attempt = self.repos.attempts.create(attempt).await?;
        log::info!(
            "User {} started attempt {} on quest {} ({} of {})",
            user_id,
            attempt.id,
            quest.id,
            used + 1,
            quest.max_attempts
        );
        Ok(attempt)
    }

    /// Sets the selected answers of one question; every other answer of that
    /// question becomes unselected.
    pub async fn select_answers(
        &self,
        attempt_id: &str,
        question_id: &str,
        answer_ids: &[String],
    ) -> AppResult<UserQuestAttempt> {
        let mut attempt = load::attempt(&self.repos, attempt_id).await?;
        if attempt.submitted {
            return Err(AppError::InvalidState(format!(
                "attempt '{}' is already submitted",
                attempt.id
            )));
        }

        let quest = load::quest(&self.repos, &attempt.quest_id).await?;
        let question = quest.question(question_id).ok_or_else(|| {
            AppError::NotFound(format!(
                "Question '{}' not found in quest '{}'",
                question_id, quest.id
            ))
        })?;

        if let Some(unknown) = answer_ids
            .iter()
            .find(|id| !question.answers.iter().any(|answer| &answer.id == *id))
        {
            return Err(AppError::ValidationError(format!(
                "answer '{}' does not belong to question '{}'",
                unknown, question_id
            )));
        }

        for row in attempt
            .answer_attempts
            .iter_mut()
            .filter(|row| row.question_id == question_id)
        {
            row.is_selected = answer_ids.contains(&row.answer_id);
        }

        let now = Utc::now();
        let updated = self
            .repos
            .attempts
            .update_selections(&attempt.id, attempt.answer_attempts.clone(), now)
            .await?;
        if !updated {
            return Err(AppError::InvalidState(format!(
                "attempt '{}' was submitted concurrently",
                attempt.id
            )));
        }

        attempt.last_attempted_on = Some(now);
        Ok(attempt)
    }

    /// Scores the attempt and flips it to submitted, exactly once.
    ///
    /// An attempt that is already submitted keeps its stored total.
    pub async fn aggregate_submission(&self, attempt_id: &str) -> AppResult<StepOutcome> {
        const STEP: EngineStep = EngineStep::AggregateAttempt;
        let attempt = load::attempt(&self.repos, attempt_id).await?;
        if attempt.submitted {
            return Ok(StepOutcome::skipped(
                STEP,
                format!(
                    "attempt already submitted with total {}",
                    attempt.total_score_achieved
                ),
            ));
        }

        let quest = load::quest(&self.repos, &attempt.quest_id).await?;
        let scored = ScoringService::score_attempt(&quest, &attempt);
        let last_attempted_on = attempt.last_attempted_on.unwrap_or_else(Utc::now);

        let finalized = self
            .repos
            .attempts
            .finalize_submission(
                &attempt.id,
                scored.answer_attempts,
                scored.total_score_achieved,
                last_attempted_on,
            )
            .await?;
        if !finalized {
            return Ok(StepOutcome::skipped(STEP, "attempt was submitted concurrently"));
        }

        log::info!(
            "Attempt {} submitted with total score {} / {}",
            attempt.id,
            scored.total_score_achieved,
            quest.total_max_score()
        );
        Ok(StepOutcome::applied(
            STEP,
            format!(
                "total score {} over {} question(s)",
                scored.total_score_achieved,
                scored.question_scores.len()
            ),
        ))
    }
}
