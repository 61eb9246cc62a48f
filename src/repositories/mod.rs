pub mod attempt_repository;
pub mod badge_repository;
pub mod course_repository;
pub mod quest_repository;
pub mod user_repository;

pub use attempt_repository::{AttemptRepository, MongoAttemptRepository};
pub use badge_repository::{BadgeRepository, MongoBadgeRepository};
pub use course_repository::{CourseRepository, MongoCourseRepository};
pub use quest_repository::{MongoQuestRepository, QuestRepository};
pub use user_repository::{MongoUserRepository, UserRepository};

use std::sync::Arc;

/// The data-store seams the reward engine reads and writes through.
#[derive(Clone)]
pub struct Repositories {
    pub quests: Arc<dyn QuestRepository>,
    pub attempts: Arc<dyn AttemptRepository>,
    pub badges: Arc<dyn BadgeRepository>,
    pub users: Arc<dyn UserRepository>,
    pub courses: Arc<dyn CourseRepository>,
}
