//! Fetch-or-NotFound helpers shared by the engine steps.

use crate::{
    errors::{AppError, AppResult},
    models::domain::{Course, EduquestUser, Quest, UserQuestAttempt},
    repositories::Repositories,
};

pub async fn attempt(repos: &Repositories, id: &str) -> AppResult<UserQuestAttempt> {
    repos
        .attempts
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Attempt with id '{}' not found", id)))
}

pub async fn quest(repos: &Repositories, id: &str) -> AppResult<Quest> {
    repos
        .quests
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Quest with id '{}' not found", id)))
}

pub async fn user(repos: &Repositories, id: &str) -> AppResult<EduquestUser> {
    repos
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User with id '{}' not found", id)))
}

pub async fn course(repos: &Repositories, id: &str) -> AppResult<Course> {
    repos
        .courses
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Course with id '{}' not found", id)))
}

/// A private quest, or any quest of a private course, earns no points or badges.
pub async fn excluded_from_rewards(repos: &Repositories, quest: &Quest) -> AppResult<bool> {
    if quest.is_private() {
        return Ok(true);
    }
    Ok(course(repos, &quest.course_id).await?.is_private())
}
