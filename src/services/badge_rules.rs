use std::sync::Arc;

use crate::{
    errors::{AppError, AppResult},
    models::domain::{
        Badge, BadgeKind, CourseEnrollment, Quest, UserCourseBadge, UserQuestAttempt,
        UserQuestBadge,
    },
    models::dto::{EngineStep, StepOutcome},
    repositories::Repositories,
    services::{
        load,
        scoring::{scores_equal, SCORE_EPSILON},
    },
    utils::KeyedLocks,
};

/// Number of distinct score values that qualify for Speedster.
pub const SPEEDSTER_TOP_SCORES: usize = 3;

/// Every attempt holding the quest's highest total, provided it is above zero.
pub fn expert_winners(attempts: &[UserQuestAttempt]) -> Vec<&UserQuestAttempt> {
    let highest = attempts
        .iter()
        .map(|attempt| attempt.total_score_achieved)
        .fold(f64::NEG_INFINITY, f64::max);

    if highest <= SCORE_EPSILON {
        return Vec::new();
    }

    attempts
        .iter()
        .filter(|attempt| scores_equal(attempt.total_score_achieved, highest))
        .collect()
}

/// Highest distinct score values, descending, at most `limit` of them.
pub fn top_unique_scores(scores: impl IntoIterator<Item = f64>, limit: usize) -> Vec<f64> {
    let mut scores: Vec<f64> = scores.into_iter().collect();
    scores.sort_by(|a, b| b.total_cmp(a));
    scores.dedup_by(|a, b| scores_equal(*a, *b));
    scores.truncate(limit);
    scores
}

/// Submitted attempts with a positive score and a positive duration.
pub fn speedster_qualifiers(attempts: &[UserQuestAttempt]) -> Vec<&UserQuestAttempt> {
    attempts
        .iter()
        .filter(|attempt| attempt.total_score_achieved > SCORE_EPSILON && attempt.time_taken_ms() > 0)
        .collect()
}

/// The fastest attempt with a positive score and a positive duration, if its
/// score is one of the top three distinct scores among those attempts.
///
/// The fastest attempt is picked from all qualifiers first and only then
/// checked against the top scores. Equal times go to the earlier start.
pub fn speedster_winner(attempts: &[UserQuestAttempt]) -> Option<&UserQuestAttempt> {
    let qualifying = speedster_qualifiers(attempts);

    let top_scores = top_unique_scores(
        qualifying.iter().map(|attempt| attempt.total_score_achieved),
        SPEEDSTER_TOP_SCORES,
    );

    let fastest = qualifying.into_iter().min_by(|a, b| {
        a.time_taken_ms()
            .cmp(&b.time_taken_ms())
            .then_with(|| a.first_attempted_on.cmp(&b.first_attempted_on))
            .then_with(|| a.id.cmp(&b.id))
    })?;

    top_scores
        .iter()
        .any(|score| scores_equal(*score, fastest.total_score_achieved))
        .then_some(fastest)
}

pub struct BadgeRules {
    repos: Repositories,
    locks: Arc<KeyedLocks>,
}

impl BadgeRules {
    pub fn new(repos: Repositories, locks: Arc<KeyedLocks>) -> Self {
        Self { repos, locks }
    }

    /// Ensures every catalog badge exists.
    pub async fn seed_catalog(&self) -> AppResult<Vec<Badge>> {
        let mut badges = Vec::with_capacity(BadgeKind::ALL.len());
        for kind in BadgeKind::ALL {
            badges.push(self.repos.badges.get_or_create(kind).await?);
        }
        log::info!("Badge catalog ready ({} badges)", badges.len());
        Ok(badges)
    }

    async fn award_attempt(
        &self,
        kind: BadgeKind,
        badge: &Badge,
        attempt: &UserQuestAttempt,
    ) -> AppResult<bool> {
        let created = self
            .repos
            .badges
            .award_quest_badge(UserQuestBadge::new(&badge.id, &attempt.id, &attempt.user_id))
            .await?;
        if created {
            log::info!(
                "Awarded '{}' to user {} for attempt {}",
                kind,
                attempt.user_id,
                attempt.id
            );
        }
        Ok(created)
    }

    pub async fn award_enrollment(
        &self,
        kind: BadgeKind,
        enrollment: &CourseEnrollment,
    ) -> AppResult<bool> {
        let badge = self.repos.badges.get_or_create(kind).await?;
        let created = self
            .repos
            .badges
            .award_course_badge(UserCourseBadge::new(
                &badge.id,
                &enrollment.id,
                &enrollment.user_id,
            ))
            .await?;
        if created {
            log::info!(
                "Awarded '{}' to user {} for course {}",
                kind,
                enrollment.user_id,
                enrollment.course_id
            );
        }
        Ok(created)
    }

    async fn submitted_attempt(&self, attempt_id: &str) -> AppResult<(UserQuestAttempt, Quest)> {
        let attempt = load::attempt(&self.repos, attempt_id).await?;
        let quest = load::quest(&self.repos, &attempt.quest_id).await?;
        if !attempt.submitted {
            return Err(AppError::InvalidState(format!(
                "attempt '{}' has not been submitted",
                attempt.id
            )));
        }
        Ok((attempt, quest))
    }

    async fn expired_quest(&self, quest_id: &str) -> AppResult<Quest> {
        let quest = load::quest(&self.repos, quest_id).await?;
        if !quest.is_expired() {
            return Err(AppError::InvalidState(format!(
                "quest '{}' has not expired",
                quest.id
            )));
        }
        Ok(quest)
    }

    pub async fn first_attempt(&self, attempt_id: &str) -> AppResult<StepOutcome> {
        const STEP: EngineStep = EngineStep::FirstAttemptBadge;
        let (attempt, quest) = self.submitted_attempt(attempt_id).await?;
        if load::excluded_from_rewards(&self.repos, &quest).await? {
            return Ok(StepOutcome::skipped(STEP, "private quest or course"));
        }

        let badge = self.repos.badges.get_or_create(BadgeKind::FirstAttempt).await?;

        // Two first submissions by one user must not both see zero rows.
        let _guard = self
            .locks
            .lock(&format!("first-attempt:{}", attempt.user_id))
            .await;

        let held = self
            .repos
            .badges
            .count_user_quest_badges(&attempt.user_id, &badge.id)
            .await?;
        if held > 0 {
            return Ok(StepOutcome::skipped(STEP, "user already holds First Attempt"));
        }

        if self.award_attempt(BadgeKind::FirstAttempt, &badge, &attempt).await? {
            Ok(StepOutcome::applied(STEP, "awarded First Attempt"))
        } else {
            Ok(StepOutcome::skipped(STEP, "First Attempt already awarded"))
        }
    }

    pub async fn perfectionist(&self, attempt_id: &str) -> AppResult<StepOutcome> {
        const STEP: EngineStep = EngineStep::PerfectionistBadge;
        let (attempt, quest) = self.submitted_attempt(attempt_id).await?;
        if load::excluded_from_rewards(&self.repos, &quest).await? {
            return Ok(StepOutcome::skipped(STEP, "private quest or course"));
        }

        let max_score = quest.total_max_score();
        if max_score <= SCORE_EPSILON {
            return Ok(StepOutcome::skipped(STEP, "quest has no scorable questions"));
        }
        if !scores_equal(attempt.total_score_achieved, max_score) {
            return Ok(StepOutcome::skipped(
                STEP,
                format!(
                    "score {} is below the maximum {}",
                    attempt.total_score_achieved, max_score
                ),
            ));
        }

        let badge = self.repos.badges.get_or_create(BadgeKind::Perfectionist).await?;
        if self.award_attempt(BadgeKind::Perfectionist, &badge, &attempt).await? {
            Ok(StepOutcome::applied(STEP, "awarded Perfectionist"))
        } else {
            Ok(StepOutcome::skipped(STEP, "Perfectionist already awarded"))
        }
    }

    pub async fn expert(&self, quest_id: &str) -> AppResult<StepOutcome> {
        const STEP: EngineStep = EngineStep::ExpertBadge;
        let quest = self.expired_quest(quest_id).await?;
        if load::excluded_from_rewards(&self.repos, &quest).await? {
            return Ok(StepOutcome::skipped(STEP, "private quest or course"));
        }

        let attempts = self.repos.attempts.list_by_quest(&quest.id).await?;
        if attempts.is_empty() {
            return Ok(StepOutcome::skipped(STEP, "quest has no attempts"));
        }

        let winners = expert_winners(&attempts);
        if winners.is_empty() {
            return Ok(StepOutcome::skipped(STEP, "no attempt scored above zero"));
        }

        let badge = self.repos.badges.get_or_create(BadgeKind::Expert).await?;
        let mut created = 0;
        for attempt in &winners {
            if self.award_attempt(BadgeKind::Expert, &badge, attempt).await? {
                created += 1;
            }
        }

        let message = format!(
            "{} attempt(s) share the highest score {}; {} new award(s)",
            winners.len(),
            winners[0].total_score_achieved,
            created
        );
        if created > 0 {
            Ok(StepOutcome::applied(STEP, message))
        } else {
            Ok(StepOutcome::skipped(STEP, message))
        }
    }

    pub async fn speedster(&self, quest_id: &str) -> AppResult<StepOutcome> {
        const STEP: EngineStep = EngineStep::SpeedsterBadge;
        let quest = self.expired_quest(quest_id).await?;
        if load::excluded_from_rewards(&self.repos, &quest).await? {
            return Ok(StepOutcome::skipped(STEP, "private quest or course"));
        }

        let attempts = self.repos.attempts.list_by_quest(&quest.id).await?;
        if speedster_qualifiers(&attempts).is_empty() {
            return Ok(StepOutcome::skipped(
                STEP,
                "no attempt with a positive score and time",
            ));
        }
        let Some(winner) = speedster_winner(&attempts) else {
            return Ok(StepOutcome::skipped(
                STEP,
                "fastest qualifying attempt is not among the top scores",
            ));
        };

        let badge = self.repos.badges.get_or_create(BadgeKind::Speedster).await?;
        if self.award_attempt(BadgeKind::Speedster, &badge, winner).await? {
            Ok(StepOutcome::applied(
                STEP,
                format!(
                    "awarded Speedster to attempt {} ({} ms)",
                    winner.id,
                    winner.time_taken_ms()
                ),
            ))
        } else {
            Ok(StepOutcome::skipped(STEP, "Speedster already awarded"))
        }
    }
}
