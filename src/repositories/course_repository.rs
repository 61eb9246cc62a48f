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
    models::domain::{Course, CourseEnrollment},
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CourseRepository: Send + Sync {
    async fn create(&self, course: Course) -> AppResult<Course>;
    async fn find_by_id(&self, id: &str) -> AppResult<Option<Course>>;
    async fn list_active(&self) -> AppResult<Vec<Course>>;
    /// One-way Active -> Expired. Returns false when already expired.
    async fn mark_expired(&self, id: &str) -> AppResult<bool>;
    async fn list_expired_awaiting_rewards(&self) -> AppResult<Vec<Course>>;
    async fn mark_rewards_dispatched(&self, id: &str, on: DateTime<Utc>) -> AppResult<bool>;
    async fn create_enrollment(&self, enrollment: CourseEnrollment) -> AppResult<CourseEnrollment>;
    async fn find_enrollment(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> AppResult<Option<CourseEnrollment>>;
    async fn list_enrollments(&self, course_id: &str) -> AppResult<Vec<CourseEnrollment>>;
    /// Sets `completed_on` only if it is still empty. Returns false otherwise.
    async fn mark_enrollment_completed(
        &self,
        enrollment_id: &str,
        completed_on: DateTime<Utc>,
    ) -> AppResult<bool>;
}

pub struct MongoCourseRepository {
    courses: Collection<Course>,
    enrollments: Collection<CourseEnrollment>,
}

impl MongoCourseRepository {
    pub fn new(db: &Database) -> Self {
        Self {
            courses: db.get_collection("courses"),
            enrollments: db.get_collection("course_enrollments"),
        }
    }

    pub async fn ensure_indexes(&self) -> AppResult<()> {
        log::info!("Creating indexes for courses and course_enrollments collections");

        let id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        let enrollment_id_index = IndexModel::builder()
            .keys(doc! { "id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("id_unique".to_string())
                    .build(),
            )
            .build();

        let user_course_index = IndexModel::builder()
            .keys(doc! { "user_id": 1, "course_id": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name("user_course_unique".to_string())
                    .build(),
            )
            .build();

        self.courses.create_index(id_index).await?;
        self.enrollments.create_index(enrollment_id_index).await?;
        self.enrollments.create_index(user_course_index).await?;

        log::info!("Successfully created indexes for courses and course_enrollments collections");
        Ok(())
    }
}

#[async_trait]
impl CourseRepository for MongoCourseRepository {
    async fn create(&self, course: Course) -> AppResult<Course> {
        self.courses.insert_one(&course).await?;
        Ok(course)
    }

    async fn find_by_id(&self, id: &str) -> AppResult<Option<Course>> {
        let course = self.courses.find_one(doc! { "id": id }).await?;
        Ok(course)
    }

    async fn list_active(&self) -> AppResult<Vec<Course>> {
        let courses = self
            .courses
            .find(doc! { "status": "Active" })
            .await?
            .try_collect()
            .await?;
        Ok(courses)
    }

    async fn mark_expired(&self, id: &str) -> AppResult<bool> {
        let result = self
            .courses
            .update_one(
                doc! { "id": id, "status": "Active" },
                doc! { "$set": { "status": "Expired" } },
            )
            .await?;
        Ok(result.modified_count > 0)
    }

    async fn list_expired_awaiting_rewards(&self) -> AppResult<Vec<Course>> {
        let courses = self
            .courses
            .find(doc! { "status": "Expired", "rewards_dispatched_on": null })
            .await?
            .try_collect()
            .await?;
        Ok(courses)
    }

    async fn mark_rewards_dispatched(&self, id: &str, on: DateTime<Utc>) -> AppResult<bool> {
        let result = self
            .courses
            .update_one(
                doc! { "id": id, "status": "Expired", "rewards_dispatched_on": null },
                doc! { "$set": { "rewards_dispatched_on": to_bson(&on)? } },
            )
            .await?;
        Ok(result.modified_count > 0)
    }

    async fn create_enrollment(&self, enrollment: CourseEnrollment) -> AppResult<CourseEnrollment> {
        self.enrollments.insert_one(&enrollment).await?;
        Ok(enrollment)
    }

    async fn find_enrollment(
        &self,
        user_id: &str,
        course_id: &str,
    ) -> AppResult<Option<CourseEnrollment>> {
        let enrollment = self
            .enrollments
            .find_one(doc! { "user_id": user_id, "course_id": course_id })
            .await?;
        Ok(enrollment)
    }

    async fn list_enrollments(&self, course_id: &str) -> AppResult<Vec<CourseEnrollment>> {
        let enrollments = self
            .enrollments
            .find(doc! { "course_id": course_id })
            .await?
            .try_collect()
            .await?;
        Ok(enrollments)
    }

    async fn mark_enrollment_completed(
        &self,
        enrollment_id: &str,
        completed_on: DateTime<Utc>,
    ) -> AppResult<bool> {
        let result = self
            .enrollments
            .update_one(
                doc! { "id": enrollment_id, "completed_on": null },
                doc! { "$set": { "completed_on": to_bson(&completed_on)? } },
            )
            .await?;
        Ok(result.modified_count > 0)
    }
}
