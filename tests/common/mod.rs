#![allow(dead_code)]

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use eduquest_engine::{
    errors::{AppError, AppResult},
    models::domain::{
        course::CourseType,
        quest::{QuestStatus, QuestType},
        Answer, Badge, BadgeKind, Course, CourseEnrollment, EduquestUser, PointsCredit, Quest,
        Question, UserAnswerAttempt, UserCourseBadge, UserQuestAttempt, UserQuestBadge,
    },
    repositories::{
        AttemptRepository, BadgeRepository, CourseRepository, QuestRepository, Repositories,
        UserRepository,
    },
    services::RewardEngine,
};

/// Every repository seam backed by one set of in-process maps.
#[derive(Default)]
pub struct InMemoryStore {
    pub quests: RwLock<HashMap<String, Quest>>,
    pub attempts: RwLock<HashMap<String, UserQuestAttempt>>,
    pub badges: RwLock<HashMap<String, Badge>>,
    pub quest_badges: RwLock<Vec<UserQuestBadge>>,
    pub course_badges: RwLock<Vec<UserCourseBadge>>,
    pub users: RwLock<HashMap<String, EduquestUser>>,
    pub courses: RwLock<HashMap<String, Course>>,
    pub enrollments: RwLock<HashMap<String, CourseEnrollment>>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn put_attempt(&self, attempt: UserQuestAttempt) {
        self.attempts
            .write()
            .await
            .insert(attempt.id.clone(), attempt);
    }

    pub async fn quest_badges_named(&self, kind: BadgeKind) -> Vec<UserQuestBadge> {
        let Some(badge_id) = self.badge_id(kind).await else {
            return Vec::new();
        };
        self.quest_badges
            .read()
            .await
            .iter()
            .filter(|award| award.badge_id == badge_id)
            .cloned()
            .collect()
    }

    pub async fn course_badges_named(&self, kind: BadgeKind) -> Vec<UserCourseBadge> {
        let Some(badge_id) = self.badge_id(kind).await else {
            return Vec::new();
        };
        self.course_badges
            .read()
            .await
            .iter()
            .filter(|award| award.badge_id == badge_id)
            .cloned()
            .collect()
    }

    async fn badge_id(&self, kind: BadgeKind) -> Option<String> {
        self.badges
            .read()
            .await
            .values()
            .find(|badge| badge.name == kind.name())
            .map(|badge| badge.id.clone())
    }
}

fn sorted_by_id(mut attempts: Vec<UserQuestAttempt>) -> Vec<UserQuestAttempt> {
    attempts.sort_by(|a, b| a.id.cmp(&b.id));
    attempts
}

#[async_trait]
impl QuestRepository for InMemoryStore {
    async fn create(&self, quest: Quest) -> AppResult<Quest> {
        let mut quests = self.quests.write().await;
        if quests.contains_key(&quest.id) {
            return Err(AppError::ConcurrencyConflict(format!(
                "Quest with id '{}' already exists",
                quest.id
            )));
        }
        quests.insert(quest.id.clone(), quest.clone());
        Ok(quest)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Quest>> {
        Ok(self.quests.read().await.get(id).cloned())
    }

    async fn list_by_course_excluding_private(&self, course_id: &str) -> AppResult<Vec<Quest>> {
        Ok(self
            .quests
            .read()
            .await
            .values()
            .filter(|quest| quest.course_id == course_id && !quest.is_private())
            .cloned()
            .collect())
    }

    async fn list_active(&self) -> AppResult<Vec<Quest>> {
        Ok(self
            .quests
            .read()
            .await
            .values()
            .filter(|quest| !quest.is_expired())
            .cloned()
            .collect())
    }

    async fn mark_expired(&self, id: &str) -> AppResult<bool> {
        let mut quests = self.quests.write().await;
        match quests.get_mut(id) {
            Some(quest) if !quest.is_expired() => {
                quest.status = QuestStatus::Expired;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_expired_awaiting_rewards(&self) -> AppResult<Vec<Quest>> {
        Ok(self
            .quests
            .read()
            .await
            .values()
            .filter(|quest| quest.awaits_expiry_rewards())
            .cloned()
            .collect())
    }

    async fn mark_rewards_dispatched(&self, id: &str, on: DateTime<Utc>) -> AppResult<bool> {
        let mut quests = self.quests.write().await;
        match quests.get_mut(id) {
            Some(quest) if quest.awaits_expiry_rewards() => {
                quest.rewards_dispatched_on = Some(on);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl AttemptRepository for InMemoryStore {
    async fn create(&self, attempt: UserQuestAttempt) -> AppResult<UserQuestAttempt> {
        let mut attempts = self.attempts.write().await;
        if attempts.contains_key(&attempt.id) {
            return Err(AppError::ConcurrencyConflict(format!(
                "Attempt with id '{}' already exists",
                attempt.id
            )));
        }
        attempts.insert(attempt.id.clone(), attempt.clone());
        Ok(attempt)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<UserQuestAttempt>> {
        Ok(self.attempts.read().await.get(id).cloned())
    }

    async fn list_by_user_and_quest(
        &self,
        user_id: &str,
        quest_id: &str,
    ) -> AppResult<Vec<UserQuestAttempt>> {
        let attempts = self.attempts.read().await;
        Ok(sorted_by_id(
            attempts
                .values()
                .filter(|a| a.user_id == user_id && a.quest_id == quest_id)
                .cloned()
                .collect(),
        ))
    }

    async fn count_by_user_and_quest(&self, user_id: &str, quest_id: &str) -> AppResult<usize> {
        let attempts = self.attempts.read().await;
        Ok(attempts
            .values()
            .filter(|a| a.user_id == user_id && a.quest_id == quest_id)
            .count())
    }

    async fn list_by_quest(&self, quest_id: &str) -> AppResult<Vec<UserQuestAttempt>> {
        let attempts = self.attempts.read().await;
        Ok(sorted_by_id(
            attempts
                .values()
                .filter(|a| a.quest_id == quest_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_submitted_by_user_and_quest_excluding(
        &self,
        user_id: &str,
        quest_id: &str,
        excluded_attempt_id: &str,
    ) -> AppResult<Vec<UserQuestAttempt>> {
        let attempts = self.attempts.read().await;
        Ok(sorted_by_id(
            attempts
                .values()
                .filter(|a| {
                    a.submitted
                        && a.user_id == user_id
                        && a.quest_id == quest_id
                        && a.id != excluded_attempt_id
                })
                .cloned()
                .collect(),
        ))
    }

    async fn list_submitted_by_user_for_quests(
        &self,
        user_id: &str,
        quest_ids: &[String],
    ) -> AppResult<Vec<UserQuestAttempt>> {
        let attempts = self.attempts.read().await;
        Ok(sorted_by_id(
            attempts
                .values()
                .filter(|a| a.submitted && a.user_id == user_id && quest_ids.contains(&a.quest_id))
                .cloned()
                .collect(),
        ))
    }

    async fn update_selections(
        &self,
        attempt_id: &str,
        answer_attempts: Vec<UserAnswerAttempt>,
        last_attempted_on: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut attempts = self.attempts.write().await;
        match attempts.get_mut(attempt_id) {
            Some(attempt) if !attempt.submitted => {
                attempt.answer_attempts = answer_attempts;
                attempt.last_attempted_on = Some(last_attempted_on);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn finalize_submission(
        &self,
        attempt_id: &str,
        answer_attempts: Vec<UserAnswerAttempt>,
        total_score_achieved: f64,
        last_attempted_on: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut attempts = self.attempts.write().await;
        match attempts.get_mut(attempt_id) {
            Some(attempt) if !attempt.submitted => {
                attempt.answer_attempts = answer_attempts;
                attempt.total_score_achieved = total_score_achieved;
                attempt.last_attempted_on = Some(last_attempted_on);
                attempt.submitted = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl BadgeRepository for InMemoryStore {
    async fn find_by_name(&self, name: &str) -> AppResult<Option<Badge>> {
        Ok(self
            .badges
            .read()
            .await
            .values()
            .find(|badge| badge.name == name)
            .cloned())
    }

    async fn get_or_create(&self, kind: BadgeKind) -> AppResult<Badge> {
        let mut badges = self.badges.write().await;
        if let Some(existing) = badges.values().find(|badge| badge.name == kind.name()) {
            return Ok(existing.clone());
        }
        let badge = Badge::from_kind(kind);
        badges.insert(badge.id.clone(), badge.clone());
        Ok(badge)
    }

    async fn award_quest_badge(&self, award: UserQuestBadge) -> AppResult<bool> {
        let mut awards = self.quest_badges.write().await;
        if awards
            .iter()
            .any(|a| a.badge_id == award.badge_id && a.attempt_id == award.attempt_id)
        {
            return Ok(false);
        }
        awards.push(award);
        Ok(true)
    }

    async fn award_course_badge(&self, award: UserCourseBadge) -> AppResult<bool> {
        let mut awards = self.course_badges.write().await;
        if awards
            .iter()
            .any(|a| a.badge_id == award.badge_id && a.enrollment_id == award.enrollment_id)
        {
            return Ok(false);
        }
        awards.push(award);
        Ok(true)
    }

    async fn count_user_quest_badges(&self, user_id: &str, badge_id: &str) -> AppResult<u64> {
        let awards = self.quest_badges.read().await;
        Ok(awards
            .iter()
            .filter(|a| a.user_id == user_id && a.badge_id == badge_id)
            .count() as u64)
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create(&self, user: EduquestUser) -> AppResult<EduquestUser> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) {
            return Err(AppError::ConcurrencyConflict(format!(
                "User with id '{}' already exists",
                user.id
            )));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<EduquestUser>> {
        Ok(self.users.read().await.get(id).cloned())
    }

    async fn credit_points(&self, user_id: &str, credit: PointsCredit) -> AppResult<bool> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| AppError::NotFound(format!("User with id '{}' not found", user_id)))?;
        if user.credit_for(&credit.attempt_id).is_some() {
            return Ok(false);
        }
        user.total_points += credit.delta;
        user.points_credits.push(credit);
        Ok(true)
    }
}

#[async_trait]
impl CourseRepository for InMemoryStore {
    async fn create(&self, course: Course) -> AppResult<Course> {
        let mut courses = self.courses.write().await;
        if courses.contains_key(&course.id) {
            return Err(AppError::ConcurrencyConflict(format!(
                "Course with id '{}' already exists",
                course.id
            )));
        }
        courses.insert(course.id.clone(), course.clone());
        Ok(course)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Course>> {
        Ok(self.courses.read().await.get(id).cloned())
    }

    async fn list_active(&self) -> AppResult<Vec<Course>> {
        Ok(self
            .courses
            .read()
            .await
            .values()
            .filter(|course| !course.is_expired())
            .cloned()
            .collect())
    }

    async fn mark_expired(&self, id: &str) -> AppResult<bool> {
        use eduquest_engine::models::domain::course::CourseStatus;

        let mut courses = self.courses.write().await;
        match courses.get_mut(id) {
            Some(course) if !course.is_expired() => {
                course.status = CourseStatus::Expired;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_expired_awaiting_rewards(&self) -> AppResult<Vec<Course>> {
        Ok(self
            .courses
            .read()
            .await
            .values()
            .filter(|course| course.awaits_expiry_rewards())
            .cloned()
            .collect())
    }

    async fn mark_rewards_dispatched(&self, id: &str, on: DateTime<Utc>) -> AppResult<bool> {
        let mut courses = self.courses.write().await;
        match courses.get_mut(id) {
            Some(course) if course.awaits_expiry_rewards() => {
                course.rewards_dispatched_on = Some(on);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn create_enrollment(&self, enrollment: CourseEnrollment) -> AppResult<CourseEnrollment> {
        let mut enrollments = self.enrollments.write().await;
        if enrollments
            .values()
            .any(|e| e.user_id == enrollment.user_id && e.course_id == enrollment.course_id)
        {
            return Err(AppError::ConcurrencyConflict(format!(
                "User '{}' is already enrolled in course '{}'",
                enrollment.user_id, enrollment.course_id
            )));
        }
        enrollments.insert(enrollment.id.clone(), enrollment.clone());
        Ok(enrollment)
    }

    async fn find_enrollment(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> AppResult<Option<CourseEnrollment>> {
        Ok(self
            .enrollments
            .read()
            .await
            .values()
            .find(|e| e.user_id == user_id && e.course_id == course_id)
            .cloned())
    }

    async fn list_enrollments(&self, course_id: &str) -> AppResult<Vec<CourseEnrollment>> {
        let enrollments = self.enrollments.read().await;
        let mut items: Vec<_> = enrollments
            .values()
            .filter(|e| e.course_id == course_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    async fn mark_enrollment_completed(
        &self,
        enrollment_id: &str,
        completed_on: DateTime<Utc>,
    ) -> AppResult<bool> {
        let mut enrollments = self.enrollments.write().await;
        match enrollments.get_mut(enrollment_id) {
            Some(enrollment) if enrollment.completed_on.is_none() => {
                enrollment.completed_on = Some(completed_on);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

pub fn repositories(store: &Arc<InMemoryStore>) -> Repositories {
    Repositories {
        quests: store.clone(),
        attempts: store.clone(),
        badges: store.clone(),
        users: store.clone(),
        courses: store.clone(),
    }
}

/// A store, the engine wired to it, and helpers to build fixtures.
pub struct World {
    pub store: Arc<InMemoryStore>,
    pub repos: Repositories,
    pub engine: RewardEngine,
}

impl World {
    pub fn new() -> Self {
        let store = InMemoryStore::new();
        let repos = repositories(&store);
        let engine = RewardEngine::new(repos.clone());
        Self {
            store,
            repos,
            engine,
        }
    }

    pub async fn user(&self, username: &str) -> EduquestUser {
        let user = EduquestUser::new(username, &format!("{}@example.com", username));
        self.repos
            .users
            .create(user)
            .await
            .expect("user should be created")
    }

    pub async fn course(&self) -> Course {
        self.repos
            .courses
            .create(Course::new("Course", CourseType::Public, None))
            .await
            .expect("course should be created")
    }

    pub async fn enroll(&self, user: &EduquestUser, course: &Course) -> CourseEnrollment {
        self.repos
            .courses
            .create_enrollment(CourseEnrollment::new(&user.id, &course.id))
            .await
            .expect("enrollment should be created")
    }

    /// A quest of `points` one-point questions, each with a single correct
    /// answer, so selecting k answers scores exactly k.
    pub async fn quest(&self, course: &Course, quest_type: QuestType, points: u32) -> Quest {
        let mut quest = Quest::new(&course.id, "Quest", quest_type, 10, None);
        quest.questions = (1..=points)
            .map(|n| Question::new(n, &format!("Question {}", n), 1.0, vec![Answer::new("yes", true)]))
            .collect();
        self.repos
            .quests
            .create(quest)
            .await
            .expect("quest should be created")
    }

    /// Starts an attempt and selects the first `correct` answers, leaving it open.
    pub async fn answered(&self, user: &EduquestUser, quest: &Quest, correct: usize) -> UserQuestAttempt {
        let attempt = self
            .engine
            .attempts()
            .start_attempt(&user.id, &quest.id)
            .await
            .expect("attempt should start");

        for question in quest.questions.iter().take(correct) {
            let answer_ids: Vec<String> = question.answers.iter().map(|a| a.id.clone()).collect();
            self.engine
                .attempts()
                .select_answers(&attempt.id, &question.id, &answer_ids)
                .await
                .expect("selection should be accepted");
        }
        attempt
    }

    /// Starts an attempt, selects the first `correct` answers and submits it.
    pub async fn submit(&self, user: &EduquestUser, quest: &Quest, correct: usize) -> UserQuestAttempt {
        let attempt = self.answered(user, quest, correct).await;

        let report = self.engine.on_attempt_submitted(&attempt.id).await;
        assert!(!report.has_failures(), "submission failed: {:?}", report);

        self.repos
            .attempts
            .find_by_id(&attempt.id)
            .await
            .expect("attempt lookup")
            .expect("attempt should exist")
    }

    /// Stores a submitted attempt with a fixed score and duration.
    pub async fn finished_attempt(
        &self,
        user: &EduquestUser,
        quest: &Quest,
        score: f64,
        time_ms: i64,
    ) -> UserQuestAttempt {
        let mut attempt = UserQuestAttempt::start(&user.id, quest);
        let first = Utc::now() - Duration::hours(1);
        attempt.first_attempted_on = Some(first);
        attempt.last_attempted_on = Some(first + Duration::milliseconds(time_ms));
        attempt.submitted = true;
        attempt.total_score_achieved = score;
        self.store.put_attempt(attempt.clone()).await;
        attempt
    }

    pub async fn expire_quest(&self, quest: &Quest) {
        assert!(self
            .repos
            .quests
            .mark_expired(&quest.id)
            .await
            .expect("quest expiry"));
    }

    pub async fn total_points(&self, user: &EduquestUser) -> f64 {
        self.repos
            .users
            .find_by_id(&user.id)
            .await
            .expect("user lookup")
            .expect("user should exist")
            .total_points
    }
}
