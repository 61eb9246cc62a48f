use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct EduquestUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub total_points: f64,
    #[serde(default)]
    pub points_credits: Vec<PointsCredit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Ledger entry written together with the `total_points` increment it caused.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PointsCredit {
    pub attempt_id: String,
    pub quest_id: String,
    pub score: f64,
    pub delta: f64,
    pub credited_on: DateTime<Utc>,
}

impl EduquestUser {
    pub fn new(username: &str, email: &str) -> Self {
        EduquestUser {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: email.to_string(),
            total_points: 0.0,
            points_credits: Vec::new(),
            created_at: Some(Utc::now()),
        }
    }

    pub fn credit_for(&self, attempt_id: &str) -> Option<&PointsCredit> {
        self.points_credits
            .iter()
            .find(|credit| credit.attempt_id == attempt_id)
    }
}
