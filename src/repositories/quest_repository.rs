use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, to_bson},
    options::IndexOptions,
    Collection, IndexModel,
};

use crate::{db::Database, errors::AppResult, models::domain::Quest};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuestRepository: Send + Sync {
    async fn create(&self, quest: Quest) -> AppResult<Quest>;
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Quest>>;
    async fn list_by_course_excluding_private(&self, course_id: &str) -> AppResult<Vec<Quest>>;
    async fn list_active(&self) -> AppResult<Vec<Quest>>;
    /// One-way Active -> Expired. Returns false when already expired.
    async fn mark_expired(&self, id: &str) -> AppResult<bool>;
    /// Expired quests whose expiry rewards were never confirmed.
    async fn list_expired_awaiting_rewards(&self) -> AppResult<Vec<Quest>>;
    /// Stamps an expired quest once. Returns false when not expired or already stamped.
    async fn mark_rewards_dispatched(&self, id: &str, on: DateTime<Utc>) -> AppResult<bool>;
}

pub struct MongoQuestRepository {
    collection: Collection<Quest>,
}

impl MongoQuestRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection("quests");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for quests collection");

        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        let course_index = IndexModel::builder()
            .keys(doc! { "course_id": 1, "quest_type": 1 })
            .options(
                IndexOptions::builder()
                    .name("course_type".to_string())
                    .build(),
            )
            .build();

        self.collection.create_index(id_index).await?;
        self.collection.create_index(course_index).await?;

        log::info!("Successfully created indexes for quests collection");
        Ok(())
    }
}

#[async_trait]
impl QuestRepository for MongoQuestRepository {
    async fn create(&self, quest: Quest) -> AppResult<Quest> {
        self.collection.insert_one(&quest).await?;
        Ok(quest)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Quest>> {
        let quest = self.collection.find_one(doc! { "id": id }).await?;
        Ok(quest)
    }

    async fn list_by_course_excluding_private(&self, course_id: &str) -> AppResult<Vec<Quest>> {
        let quests = self
            .collection
            .find(doc! { "course_id": course_id, "quest_type": { "$ne": "Private" } })
            .await?
            .try_collect()
            .await?;
        Ok(quests)
    }

    async fn list_active(&self) -> AppResult<Vec<Quest>> {
        let quests = self
            .collection
            .find(doc! { "status": "Active" })
            .await?
            .try_collect()
            .await?;
        Ok(quests)
    }

    async fn mark_expired(&self, id: &str) -> AppResult<bool> {
        let result = self
            .collection
            .update_one(
                doc! { "id": id, "status": "Active" },
                doc! { "$set": { "status": "Expired" } },
            )
            .await?;
        Ok(result.modified_count > 0)
    }

    async fn list_expired_awaiting_rewards(&self) -> AppResult<Vec<Quest>> {
        let quests = self
            .collection
            .find(doc! { "status": "Expired", "rewards_dispatched_on": null })
            .await?
            .try_collect()
            .await?;
        Ok(quests)
    }

    async fn mark_rewards_dispatched(&self, id: &str, on: DateTime<Utc>) -> AppResult<bool> {
        let result = self
            .collection
            .update_one(
                doc! { "id": id, "status": "Expired", "rewards_dispatched_on": null },
                doc! { "$set": { "rewards_dispatched_on": to_bson(&on)? } },
            )
            .await?;
        Ok(result.modified_count > 0)
    }
}
