use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Quest {
    pub id: String,
    pub course_id: String,
    pub name: String,
    pub quest_type: QuestType,
    pub status: QuestStatus,
    pub max_attempts: u32,
    pub expiration_date: Option<DateTime<Utc>>,
    pub questions: Vec<Question>,
    /// Set once the expiry rules have run to completion for this quest.
    #[serde(default)]
    pub rewards_dispatched_on: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, Copy)]
pub enum QuestType {
    EduquestMcq,
    KahootQuiz,
    WooclapQuiz,
    Private, // user-owned sandbox, never scored for points or badges
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize, Copy)]
pub enum QuestStatus {
    Active,
    Expired,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub number: u32,
    pub max_score: f64,
    pub answers: Vec<Answer>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Answer {
    pub id: String,
    pub text: String,
    pub is_correct: bool,
}

impl Quest {
    pub fn new(
        course_id: &str,
        name: &str,
        quest_type: QuestType,
        max_attempts: u32,
        expiration_date: Option<DateTime<Utc>>,
    ) -> Self {
        Quest {
            id: Uuid::new_v4().to_string(),
            course_id: course_id.to_string(),
            name: name.to_string(),
            quest_type,
            status: QuestStatus::Active,
            max_attempts,
            expiration_date,
            questions: Vec::new(),
            rewards_dispatched_on: None,
            created_at: Some(Utc::now()),
        }
    }

    pub fn is_private(&self) -> bool {
        self.quest_type == QuestType::Private
    }

    pub fn is_expired(&self) -> bool {
        self.status == QuestStatus::Expired
    }

    pub fn is_due_for_expiry(&self, now: DateTime<Utc>) -> bool {
        self.status == QuestStatus::Active
            && self.expiration_date.map(|date| date <= now).unwrap_or(false)
    }

    /// Expired, but the expiry badges have not been confirmed as evaluated.
    pub fn awaits_expiry_rewards(&self) -> bool {
        self.is_expired() && self.rewards_dispatched_on.is_none()
    }

    /// Sum of every question's max score.
    pub fn total_max_score(&self) -> f64 {
        self.questions.iter().map(|q| q.max_score).sum()
    }

    pub fn total_questions(&self) -> usize {
        self.questions.len()
    }

    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }
}

impl Question {
    pub fn new(number: u32, text: &str, max_score: f64, answers: Vec<Answer>) -> Self {
        Question {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            number,
            max_score,
            answers,
        }
    }
}

impl Answer {
    pub fn new(text: &str, is_correct: bool) -> Self {
        Answer {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            is_correct,
        }
    }
}
