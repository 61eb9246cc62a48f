use async_trait::async_trait;
use mongodb::{
    bson::{doc, to_bson},
    options::IndexOptions,
    Collection, IndexModel,
};

use crate::{
    db::Database,
    errors::{AppError, AppResult},
    models::domain::{EduquestUser, PointsCredit},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: EduquestUser) -> AppResult<EduquestUser>;
    async fn find_by_id(&self, id: &str) -> AppResult<Option<EduquestUser>>;
    /// Adds `credit.delta` to `total_points` and records the credit in one
    /// atomic write. Returns false when the attempt was already credited.
    async fn credit_points(&self, user_id: &str, credit: PointsCredit) -> AppResult<bool>;
}

pub struct MongoUserRepository {
    collection: Collection<EduquestUser>,
}

impl MongoUserRepository {
    pub fn new(db: &Database) -> Self {
        let collection = db.get_collection("users");
        Self { collection }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for users collection");

        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        let username_index = IndexModel::builder()
            .keys(doc! { "username": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("username_unique".to_string())
                    .build(),
            )
            .build();

        self.collection.create_index(id_index).await?;
        self.collection.create_index(username_index).await?;

        log::info!("Successfully created indexes for users collection");
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    async fn create(&self, user: EduquestUser) -> AppResult<EduquestUser> {
        self.collection.insert_one(&user).await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<EduquestUser>> {
        let user = self.collection.find_one(doc! { "id": id }).await?;
        Ok(user)
    }

    async fn credit_points(&self, user_id: &str, credit: PointsCredit) -> AppResult<bool> {
        let filter = doc! {
            "id": user_id,
            "points_credits.attempt_id": { "$ne": credit.attempt_id.as_str() },
        };
        let update = doc! {
            "$inc": { "total_points": credit.delta },
            "$push": { "points_credits": to_bson(&credit)? },
        };

        let result = self.collection.update_one(filter, update).await?;
        if result.matched_count > 0 {
            return Ok(true);
        }

        match self.find_by_id(user_id).await? {
            Some(_) => Ok(false),
            None => Err(AppError::NotFound(format!(
                "User with id '{}' not found",
                user_id
            ))),
        }
    }
}
