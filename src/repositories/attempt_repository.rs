use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, to_bson},
    options::IndexOptions,
    Collection, IndexModel,
};

use crate::{
    db::Database,
    errors::AppResult,
    models::domain::{UserAnswerAttempt, UserQuestAttempt},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttemptRepository: Send + Sync {
    async fn create(&self, attempt: UserQuestAttempt) -> AppResult<UserQuestAttempt>;
    async fn find_by_id(&self, id: &str) -> AppResult<Option<UserQuestAttempt>>;
    async fn list_by_user_and_quest(
        &self,
        user_id: &str,
        quest_id: &str,
    ) -> AppResult<Vec<UserQuestAttempt>>;
    async fn count_by_user_and_quest(&self, user_id: &str, quest_id: &str) -> AppResult<usize>;
    async fn list_by_quest(&self, quest_id: &str) -> AppResult<Vec<UserQuestAttempt>>;
    async fn list_submitted_by_user_and_quest_excluding(
        &self,
        user_id: &str,
        quest_id: &str,
        excluded_attempt_id: &str,
    ) -> AppResult<Vec<UserQuestAttempt>>;
    async fn list_submitted_by_user_for_quests(
        &self,
        user_id: &str,
        quest_ids: &[String],
    ) -> AppResult<Vec<UserQuestAttempt>>;
    /// Replaces the answer rows of an unsubmitted attempt. Returns false when
    /// the attempt is already submitted.
    async fn update_selections(
        &self,
        attempt_id: &str,
        answer_attempts: Vec<UserAnswerAttempt>,
        last_attempted_on: DateTime<Utc>,
    ) -> AppResult<bool>;
    /// Flips `submitted` false -> true together with the scored rows and total.
    /// Returns false when another caller already submitted the attempt.
    async fn finalize_submission(
        &self,
        attempt_id: &str,
        answer_attempts: Vec<UserAnswerAttempt>,
        total_score_achieved: f64,
        last_attempted_on: DateTime<Utc>,
    ) -> AppResult<bool>;
}

pub struct MongoAttemptRepository {
    collection: Collection<UserQuestAttempt>,
}

impl MongoAttemptRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection("quest_attempts");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for quest_attempts collection");

        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        let user_quest_index = IndexModel::builder()
            .keys(doc! { "user_id": 1, "quest_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("user_quest".to_string())
                    .build(),
            )
            .build();

        let quest_index = IndexModel::builder()
            .keys(doc! { "quest_id": 1 })
            .options(IndexOptions::builder().name("quest_id".to_string()).build())
            .build();

        self.collection.create_index(id_index).await?;
        self.collection.create_index(user_quest_index).await?;
        self.collection.create_index(quest_index).await?;

        log::info!("Successfully created indexes for quest_attempts collection");
        Ok(())
    }
}

#[async_trait]
impl AttemptRepository for MongoAttemptRepository {
    async fn create(&self, attempt: UserQuestAttempt) -> AppResult<UserQuestAttempt> {
        self.collection.insert_one(&attempt).await?;
        Ok(attempt)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<UserQuestAttempt>> {
        let attempt = self.collection.find_one(doc! { "id": id }).await?;
        Ok(attempt)
    }

    async fn list_by_user_and_quest(
        &self,
        user_id: &str,
        quest_id: &str,
    ) -> AppResult<Vec<UserQuestAttempt>> {
        let attempts = self
            .collection
            .find(doc! { "user_id": user_id, "quest_id": quest_id })
            .sort(doc! { "first_attempted_on": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(attempts)
    }

    async fn count_by_user_and_quest(&self, user_id: &str, quest_id: &str) -> AppResult<usize> {
        let count = self
            .collection
            .count_documents(doc! { "user_id": user_id, "quest_id": quest_id })
            .await?;
        Ok(count as usize)
    }

    async fn list_by_quest(&self, quest_id: &str) -> AppResult<Vec<UserQuestAttempt>> {
        let attempts = self
            .collection
            .find(doc! { "quest_id": quest_id })
            .sort(doc! { "first_attempted_on": 1 })
            .await?
            .try_collect()
            .await?;
        Ok(attempts)
    }

    async fn list_submitted_by_user_and_quest_excluding(
        &self,
        user_id: &str,
        quest_id: &str,
        excluded_attempt_id: &str,
    ) -> AppResult<Vec<UserQuestAttempt>> {
        let attempts = self
            .collection
            .find(doc! {
                "user_id": user_id,
                "quest_id": quest_id,
                "submitted": true,
                "id": { "$ne": excluded_attempt_id },
            })
            .await?
            .try_collect()
            .await?;
        Ok(attempts)
    }

    async fn list_submitted_by_user_for_quests(
        &self,
        user_id: &str,
        quest_ids: &[String],
    ) -> AppResult<Vec<UserQuestAttempt>> {
        let attempts = self
            .collection
            .find(doc! {
                "user_id": user_id,
                "quest_id": { "$in": quest_ids.to_vec() },
                "submitted": true,
            })
            .await?
            .try_collect()
            .await?;
        Ok(attempts)
    }

    async fn update_selections(
        &self,
        attempt_id: &str,
        answer_attempts: Vec<UserAnswerAttempt>,
        last_attempted_on: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = self
            .collection
            .update_one(
                doc! { "id": attempt_id, "submitted": false },
                doc! {
                    "$set": {
                        "answer_attempts": to_bson(&answer_attempts)?,
                        "last_attempted_on": to_bson(&last_attempted_on)?,
                    }
                },
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn finalize_submission(
        &self,
        attempt_id: &str,
        answer_attempts: Vec<UserAnswerAttempt>,
        total_score_achieved: f64,
        last_attempted_on: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = self
            .collection
            .update_one(
                doc! { "id": attempt_id, "submitted": false },
                doc! {
                    "$set": {
                        "submitted": true,
                        "total_score_achieved": total_score_achieved,
                        "answer_attempts": to_bson(&answer_attempts)?,
                        "last_attempted_on": to_bson(&last_attempted_on)?,
                    }
                },
            )
            .await?;
        Ok(result.modified_count > 0)
    }
}
