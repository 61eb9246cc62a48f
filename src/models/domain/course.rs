use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Course {
    pub id: String,
    pub name: String,
    pub course_type: CourseType,
    pub status: CourseStatus,
    pub expiration_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rewards_dispatched_on: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, Copy)]
pub enum CourseType {
    Public,
    Private,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, Copy)]
pub enum CourseStatus {
    Active,
    Expired,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct CourseEnrollment {
    pub id: String,
    pub user_id: String,
    pub course_id: String,
    pub enrolled_on: DateTime<Utc>,
    pub completed_on: Option<DateTime<Utc>>,
}

impl Course {
    pub fn new(name: &str, course_type: CourseType, expiration_date: Option<DateTime<Utc>>) -> Self {
        Course {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            course_type,
            status: CourseStatus::Active,
            expiration_date,
            rewards_dispatched_on: None,
            created_at: Some(Utc::now()),
        }
    }

    pub fn is_private(&self) -> bool {
        self.course_type == CourseType::Private
    }

    pub fn is_expired(&self) -> bool {
        self.status == CourseStatus::Expired
    }

    pub fn is_due_for_expiry(&self, now: DateTime<Utc>) -> bool {
        self.status == CourseStatus::Active
            && self.expiration_date.map(|date| date <= now).unwrap_or(false)
    }

    pub fn awaits_expiry_rewards(&self) -> bool {
        self.is_expired() && self.rewards_dispatched_on.is_none()
    }
}

impl CourseEnrollment {
    pub fn new(user_id: &str, course_id: &str) -> Self {
        CourseEnrollment {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            course_id: course_id.to_string(),
            enrolled_on: Utc::now(),
            completed_on: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.completed_on.is_some()
    }
}
