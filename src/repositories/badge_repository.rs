use async_trait::async_trait;
use mongodb::{
    bson::{doc, to_document},
    options::{IndexOptions, ReturnDocument},
    Collection, IndexModel,
};

use crate::{
    db::Database,
    errors::{AppError, AppResult},
    models::domain::{Badge, BadgeKind, UserCourseBadge, UserQuestBadge},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BadgeRepository: Send + Sync {
    async fn find_by_name(&self, name: &str) -> AppResult<Option<Badge>>;
    /// Upserts the catalog row for `kind`, keyed by name.
    async fn get_or_create(&self, kind: BadgeKind) -> AppResult<Badge>;
    /// Create-if-absent on (badge, attempt). Returns true when a row was created.
    async fn award_quest_badge(&self, award: UserQuestBadge) -> AppResult<bool>;
    /// Create-if-absent on (badge, enrollment). Returns true when a row was created.
    async fn award_course_badge(&self, award: UserCourseBadge) -> AppResult<bool>;
    async fn count_user_quest_badges(&self, user_id: &str, badge_id: &str) -> AppResult<u64>;
}

pub struct MongoBadgeRepository {
    badges: Collection<Badge>,
    quest_badges: Collection<UserQuestBadge>,
    course_badges: Collection<UserCourseBadge>,
}

impl MongoBadgeRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            badges: db.get_collection("badges"),
            quest_badges: db.get_collection("user_quest_badges"),
            course_badges: db.get_collection("user_course_badges"),
        }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for badge collections");

        let name_index = IndexModel::builder()
            .keys(doc! { "name": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("name_unique".to_string())
                    .build(),
            )
            .build();

        let quest_award_index = IndexModel::builder()
            .keys(doc! { "badge_id": 1, "attempt_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("badge_attempt_unique".to_string())
                    .build(),
            )
            .build();

        let quest_award_user_index = IndexModel::builder()
            .keys(doc! { "user_id": 1, "badge_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("user_badge".to_string())
                    .build(),
            )
            .build();

        let course_award_index = IndexModel::builder()
            .keys(doc! { "badge_id": 1, "enrollment_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("badge_enrollment_unique".to_string())
                    .build(),
            )
            .build();

        self.badges.create_index(name_index).await?;
        self.quest_badges.create_index(quest_award_index).await?;
        self.quest_badges.create_index(quest_award_user_index).await?;
        self.course_badges.create_index(course_award_index).await?;

        log::info!("Successfully created indexes for badge collections");
        Ok(())
    }
}

/// A lost upsert race surfaces as a duplicate key; the row exists either way.
fn created_or_existing(result: AppResult<bool>) -> AppResult<bool> {
    match result {
        Err(AppError::ConcurrencyConflict(_)) => Ok(false),
        other => other,
    }
}

#[async_trait]
impl BadgeRepository for MongoBadgeRepository {
    async fn find_by_name(&self, name: &str) -> AppResult<Option<Badge>> {
        let badge = self.badges.find_one(doc! { "name": name }).await?;
        Ok(badge)
    }

    async fn get_or_create(&self, kind: BadgeKind) -> AppResult<Badge> {
        let candidate = Badge::from_kind(kind);
        let upserted = self
            .badges
            .find_one_and_update(
                doc! { "name": kind.name() },
                doc! { "$setOnInsert": to_document(&candidate)? },
            )
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await;

        match upserted {
            Ok(Some(badge)) => Ok(badge),
            Ok(None) => Err(AppError::InternalError(format!(
                "Upsert of badge '{}' returned no document",
                kind
            ))),
            Err(err) => match AppError::from(err) {
                AppError::ConcurrencyConflict(_) => self
                    .find_by_name(kind.name())
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Badge '{}' not found", kind))),
                other => Err(other),
            },
        }
    }

    async fn award_quest_badge(&self, award: UserQuestBadge) -> AppResult<bool> {
        let filter = doc! { "badge_id": award.badge_id.as_str(), "attempt_id": award.attempt_id.as_str() };
        let insert = doc! { "$setOnInsert": to_document(&award)? };

        let result = self
            .quest_badges
            .update_one(filter, insert)
            .upsert(true)
            .await
            .map(|r| r.upserted_id.is_some())
            .map_err(AppError::from);
        created_or_existing(result)
    }

    async fn award_course_badge(&self, award: UserCourseBadge) -> AppResult<bool> {
        let filter = doc! { "badge_id": award.badge_id.as_str(), "enrollment_id": award.enrollment_id.as_str() };
        let insert = doc! { "$setOnInsert": to_document(&award)? };

        let result = self
            .course_badges
            .update_one(filter, insert)
            .upsert(true)
            .await
            .map(|r| r.upserted_id.is_some())
            .map_err(AppError::from);
        created_or_existing(result)
    }

    async fn count_user_quest_badges(&self, user_id: &str, badge_id: &str) -> AppResult<u64> {
        let count = self
            .quest_badges
            .count_documents(doc! { "user_id": user_id, "badge_id": badge_id })
            .await?;
        Ok(count)
    }
}
