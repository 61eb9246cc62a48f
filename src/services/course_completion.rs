use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;

use crate::{
    errors::{AppError, AppResult},
    models::domain::{BadgeKind, Course, CourseEnrollment},
    models::dto::{EngineStep, StepOutcome},
    repositories::Repositories,
    services::{badge_rules::BadgeRules, load},
};

const STEP: EngineStep = EngineStep::CourseCompletion;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentProgress {
    /// Every required quest has a submitted attempt.
    Complete {
        newly_completed: bool,
        badge_awarded: bool,
    },
    Incomplete {
        missing: usize,
    },
    /// The course has no non-private quests to complete.
    NothingToComplete,
}

/// Quests in `required` the user has not yet submitted. Matching is by quest
/// identity, so repeated submissions of one quest never stand in for another.
pub fn missing_quests<'a>(
    required: &'a HashSet<String>,
    submitted: &'a HashSet<String>,
) -> Vec<&'a str> {
    let mut missing: Vec<&str> = required
        .difference(submitted)
        .map(String::as_str)
        .collect();
    missing.sort_unstable();
    missing
}

pub struct CourseCompletionTracker {
    repos: Repositories,
    badges: Arc<BadgeRules>,
}

impl CourseCompletionTracker {
    pub fn new(repos: Repositories, badges: Arc<BadgeRules>) -> Self {
        Self { repos, badges }
    }

    /// Re-derives completion for one enrollment, marking it and awarding
    /// Completionist when every required quest is submitted.
    pub async fn evaluate_enrollment(
        &self,
        course: &Course,
        enrollment: &CourseEnrollment,
    ) -> AppResult<EnrollmentProgress> {
        let required: HashSet<String> = self
            .repos
            .quests
            .list_by_course_excluding_private(&course.id)
            .await?
            .into_iter()
            .map(|quest| quest.id)
            .collect();

        if required.is_empty() {
            return Ok(EnrollmentProgress::NothingToComplete);
        }

        let quest_ids: Vec<String> = required.iter().cloned().collect();
        let submitted: HashSet<String> = self
            .repos
            .attempts
            .list_submitted_by_user_for_quests(&enrollment.user_id, &quest_ids)
            .await?
            .into_iter()
            .map(|attempt| attempt.quest_id)
            .collect();

        let missing = missing_quests(&required, &submitted);
        if !missing.is_empty() {
            log::debug!(
                "Enrollment {} still misses {} quest(s)",
                enrollment.id,
                missing.len()
            );
            return Ok(EnrollmentProgress::Incomplete {
                missing: missing.len(),
            });
        }

        let newly_completed = if enrollment.is_completed() {
            false
        } else {
            self.repos
                .courses
                .mark_enrollment_completed(&enrollment.id, Utc::now())
                .await?
        };
        if newly_completed {
            log::info!(
                "User {} completed course {}",
                enrollment.user_id,
                course.id
            );
        }

        // Awarded even when already completed, so a retry after a failed
        // award still lands the badge.
        let badge_awarded = self
            .badges
            .award_enrollment(BadgeKind::Completionist, enrollment)
            .await?;

        Ok(EnrollmentProgress::Complete {
            newly_completed,
            badge_awarded,
        })
    }

    /// Completion check triggered by a submission.
    pub async fn after_submission(&self, attempt_id: &str) -> AppResult<StepOutcome> {
        let attempt = load::attempt(&self.repos, attempt_id).await?;
        if !attempt.submitted {
            return Err(AppError::InvalidState(format!(
                "attempt '{}' has not been submitted",
                attempt.id
            )));
        }
        let quest = load::quest(&self.repos, &attempt.quest_id).await?;
        if quest.is_private() {
            return Ok(StepOutcome::skipped(STEP, "private quest"));
        }
        let course = load::course(&self.repos, &quest.course_id).await?;
        if course.is_private() {
            return Ok(StepOutcome::skipped(STEP, "private course"));
        }

        let Some(enrollment) = self
            .repos
            .courses
            .find_enrollment(&attempt.user_id, &course.id)
            .await?
        else {
            return Ok(StepOutcome::skipped(STEP, "user is not enrolled in the course"));
        };

        let progress = self.evaluate_enrollment(&course, &enrollment).await?;
        Ok(Self::describe(progress))
    }

    /// Completion check across every enrollment of an expired course.
    pub async fn after_course_expired(&self, course_id: &str) -> AppResult<StepOutcome> {
        let course = load::course(&self.repos, course_id).await?;
        if !course.is_expired() {
            return Err(AppError::InvalidState(format!(
                "course '{}' has not expired",
                course.id
            )));
        }
        if course.is_private() {
            return Ok(StepOutcome::skipped(STEP, "private course"));
        }

        let enrollments = self.repos.courses.list_enrollments(&course.id).await?;
        if enrollments.is_empty() {
            return Ok(StepOutcome::skipped(STEP, "course has no enrollments"));
        }

        let mut completed = 0;
        let mut newly_completed = 0;
        let mut badges_awarded = 0;
        let mut first_error: Option<AppError> = None;

        for enrollment in &enrollments {
            match self.evaluate_enrollment(&course, enrollment).await {
                Ok(EnrollmentProgress::Complete {
                    newly_completed: newly,
                    badge_awarded,
                }) => {
                    completed += 1;
                    newly_completed += usize::from(newly);
                    badges_awarded += usize::from(badge_awarded);
                }
                Ok(EnrollmentProgress::NothingToComplete) => {
                    return Ok(StepOutcome::skipped(STEP, "course has no quests to complete"));
                }
                Ok(EnrollmentProgress::Incomplete { .. }) => {}
                Err(err) => {
                    log::warn!(
                        "Completion check failed for enrollment {}: {}",
                        enrollment.id,
                        err
                    );
                    first_error.get_or_insert(err);
                }
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }

        let message = format!(
            "{} of {} enrollment(s) complete; {} newly completed, {} Completionist award(s)",
            completed,
            enrollments.len(),
            newly_completed,
            badges_awarded
        );
        if newly_completed > 0 || badges_awarded > 0 {
            Ok(StepOutcome::applied(STEP, message))
        } else {
            Ok(StepOutcome::skipped(STEP, message))
        }
    }

    fn describe(progress: EnrollmentProgress) -> StepOutcome {
        match progress {
            EnrollmentProgress::Complete {
                newly_completed,
                badge_awarded,
            } if newly_completed || badge_awarded => StepOutcome::applied(
                STEP,
                format!(
                    "course complete (newly completed: {}, Completionist awarded: {})",
                    newly_completed, badge_awarded
                ),
            ),
            EnrollmentProgress::Complete { .. } => {
                StepOutcome::skipped(STEP, "course already completed")
            }
            EnrollmentProgress::Incomplete { missing } => {
                StepOutcome::skipped(STEP, format!("{} quest(s) still unsubmitted", missing))
            }
            EnrollmentProgress::NothingToComplete => {
                StepOutcome::skipped(STEP, "course has no quests to complete")
            }
        }
    }
}
