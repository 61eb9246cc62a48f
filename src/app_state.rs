use std::sync::Arc;

use crate::{
    config::Config,
    db::Database,
    errors::AppResult,
    repositories::{
        MongoAttemptRepository, MongoBadgeRepository, MongoCourseRepository,
        MongoQuestRepository, MongoUserRepository, Repositories,
    },
    services::{ExpirySweeper, RewardEngine, TaskQueue, TaskWorker},
};

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub repos: Repositories,
    pub engine: Arc<RewardEngine>,
    pub queue: TaskQueue,
    pub config: Arc<Config>,
}

impl AppState {
    /// Connects, prepares indexes and the badge catalog, and returns the
    /// state together with the queue worker the caller must spawn.
    pub async fn new(config: Config) -> AppResult<(Self, TaskWorker)> {
        let db = Database::connect(&config).await?;

        let quests = Arc::new(MongoQuestRepository::new(&db));
        quests.ensure_indexes().await?;
        let attempts = Arc::new(MongoAttemptRepository::new(&db));
        attempts.ensure_indexes().await?;
        let badges = Arc::new(MongoBadgeRepository::new(&db));
        badges.ensure_indexes().await?;
        let users = Arc::new(MongoUserRepository::new(&db));
        users.ensure_indexes().await?;
        let courses = Arc::new(MongoCourseRepository::new(&db));
        courses.ensure_indexes().await?;

        let repos = Repositories {
            quests,
            attempts,
            badges,
            users,
            courses,
        };

        let engine = Arc::new(RewardEngine::new(repos.clone()));
        engine.seed_badges().await?;

        let (queue, worker) = TaskQueue::new(engine.clone(), &config);

        Ok((
            Self {
                db,
                repos,
                engine,
                queue,
                config: Arc::new(config),
            },
            worker,
        ))
    }

    pub fn expiry_sweeper(&self) -> ExpirySweeper {
        ExpirySweeper::new(self.repos.clone(), self.queue.clone(), &self.config)
    }
}
