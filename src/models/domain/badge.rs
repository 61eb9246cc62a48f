use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Badge {
    pub id: String,
    pub name: String,
    pub description: String,
    pub condition: String,
}

/// The five catalog badges the rule engine awards.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize, Copy)]
pub enum BadgeKind {
    FirstAttempt,
    Perfectionist,
    Expert,
    Speedster,
    Completionist,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct UserQuestBadge {
    pub id: String,
    pub badge_id: String,
    pub attempt_id: String,
    pub user_id: String,
    pub awarded_on: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct UserCourseBadge {
    pub id: String,
    pub badge_id: String,
    pub enrollment_id: String,
    pub user_id: String,
    pub awarded_on: DateTime<Utc>,
}

impl BadgeKind {
    pub const ALL: [BadgeKind; 5] = [
        BadgeKind::FirstAttempt,
        BadgeKind::Perfectionist,
        BadgeKind::Expert,
        BadgeKind::Speedster,
        BadgeKind::Completionist,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BadgeKind::FirstAttempt => "First Attempt",
            BadgeKind::Perfectionist => "Perfectionist",
            BadgeKind::Expert => "Expert",
            BadgeKind::Speedster => "Speedster",
            BadgeKind::Completionist => "Completionist",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            BadgeKind::FirstAttempt => "Submitted a quest for the very first time",
            BadgeKind::Perfectionist => "Achieved full marks on a quest",
            BadgeKind::Expert => "Achieved the highest score on a quest",
            BadgeKind::Speedster => "Fastest attempt among the top scorers of a quest",
            BadgeKind::Completionist => "Submitted every quest in a course",
        }
    }

    pub fn condition(&self) -> &'static str {
        match self {
            BadgeKind::FirstAttempt => "Awarded on the first submitted attempt of any quest",
            BadgeKind::Perfectionist => "Awarded when the attempt score equals the quest's total max score",
            BadgeKind::Expert => "Awarded at quest expiry to every attempt holding the highest score",
            BadgeKind::Speedster => {
                "Awarded at quest expiry to the fastest attempt if its score is among the top three"
            }
            BadgeKind::Completionist => "Awarded once every non-private quest in the course is submitted",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        BadgeKind::ALL.into_iter().find(|kind| kind.name() == name)
    }
}

impl fmt::Display for BadgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Badge {
    pub fn from_kind(kind: BadgeKind) -> Self {
        Badge {
            id: Uuid::new_v4().to_string(),
            name: kind.name().to_string(),
            description: kind.description().to_string(),
            condition: kind.condition().to_string(),
        }
    }
}

impl UserQuestBadge {
    pub fn new(badge_id: &str, attempt_id: &str, user_id: &str) -> Self {
        UserQuestBadge {
            id: Uuid::new_v4().to_string(),
            badge_id: badge_id.to_string(),
            attempt_id: attempt_id.to_string(),
            user_id: user_id.to_string(),
            awarded_on: Utc::now(),
        }
    }
}

impl UserCourseBadge {
    pub fn new(badge_id: &str, enrollment_id: &str, user_id: &str) -> Self {
        UserCourseBadge {
            id: Uuid::new_v4().to_string(),
            badge_id: badge_id.to_string(),
            enrollment_id: enrollment_id.to_string(),
            user_id: user_id.to_string(),
            awarded_on: Utc::now(),
        }
    }
}
