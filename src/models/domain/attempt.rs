use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::domain::quest::Quest;

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct UserQuestAttempt {
    pub id: String,
    pub user_id: String,
    pub quest_id: String,
    pub first_attempted_on: Option<DateTime<Utc>>,
    pub last_attempted_on: Option<DateTime<Utc>>,
    pub submitted: bool,
    pub total_score_achieved: f64,
    pub answer_attempts: Vec<UserAnswerAttempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// One row per (attempt, question, answer).
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct UserAnswerAttempt {
    pub question_id: String,
    pub answer_id: String,
    pub is_selected: bool,
    pub score_achieved: f64,
}

impl UserQuestAttempt {
    /// Creates an attempt with an unselected row for every answer of the quest.
    pub fn start(user_id: &str, quest: &Quest) -> Self {
        let now = Utc::now();
        let answer_attempts = quest
            .questions
            .iter()
            .flat_map(|question| {
                question.answers.iter().map(move |answer| UserAnswerAttempt {
                    question_id: question.id.clone(),
                    answer_id: answer.id.clone(),
                    is_selected: false,
                    score_achieved: 0.0,
                })
            })
            .collect();

        UserQuestAttempt {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            quest_id: quest.id.clone(),
            first_attempted_on: Some(now),
            last_attempted_on: None,
            submitted: false,
            total_score_achieved: 0.0,
            answer_attempts,
            created_at: Some(now),
        }
    }

    /// Elapsed milliseconds between first and last activity.
    ///
    /// Unsubmitted attempts, missing timestamps and negative deltas all
    /// report 0 rather than failing.
    pub fn time_taken_ms(&self) -> i64 {
        if !self.submitted {
            return 0;
        }
        match (self.first_attempted_on, self.last_attempted_on) {
            (Some(first), Some(last)) => (last - first).num_milliseconds().max(0),
            _ => 0,
        }
    }

    pub fn rows_for_question<'a>(
        &'a self,
        question_id: &'a str,
    ) -> impl Iterator<Item = &'a UserAnswerAttempt> + 'a {
        self.answer_attempts
            .iter()
            .filter(move |row| row.question_id == question_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::domain::quest::{Answer, Question, QuestType};
    use chrono::Duration;

    fn two_question_quest() -> Quest {
        let mut quest = Quest::new("course-1", "Quest", QuestType::EduquestMcq, 2, None);
        quest.questions = vec![
            Question::new(
                1,
                "Pick one",
                2.0,
                vec![Answer::new("A", true), Answer::new("B", false)],
            ),
            Question::new(
                2,
                "Pick all",
                3.0,
                vec![
                    Answer::new("A", true),
                    Answer::new("B", true),
                    Answer::new("C", false),
                ],
            ),
        ];
        quest
    }

    #[test]
    fn start_creates_one_unselected_row_per_answer() {
        let quest = two_question_quest();
        let attempt = UserQuestAttempt::start("user-1", &quest);

        assert_eq!(attempt.answer_attempts.len(), 5);
        assert!(attempt.answer_attempts.iter().all(|row| !row.is_selected));
        assert!(!attempt.submitted);
        assert!(attempt.first_attempted_on.is_some());
        assert!(attempt.last_attempted_on.is_none());

        let second_question = &quest.questions[1].id;
        assert_eq!(attempt.rows_for_question(second_question).count(), 3);
    }

    #[test]
    fn time_taken_is_zero_until_submitted() {
        let quest = two_question_quest();
        let mut attempt = UserQuestAttempt::start("user-1", &quest);
        let first = attempt.first_attempted_on.expect("start sets first_attempted_on");
        attempt.last_attempted_on = Some(first + Duration::milliseconds(1500));

        assert_eq!(attempt.time_taken_ms(), 0);

        attempt.submitted = true;
        assert_eq!(attempt.time_taken_ms(), 1500);
    }

    #[test]
    fn time_taken_tolerates_missing_and_negative_deltas() {
        let quest = two_question_quest();
        let mut attempt = UserQuestAttempt::start("user-1", &quest);
        attempt.submitted = true;
        assert_eq!(attempt.time_taken_ms(), 0);

        let first = attempt.first_attempted_on.expect("start sets first_attempted_on");
        attempt.last_attempted_on = Some(first - Duration::seconds(5));
        assert_eq!(attempt.time_taken_ms(), 0);

        attempt.first_attempted_on = None;
        attempt.last_attempted_on = Some(first);
        assert_eq!(attempt.time_taken_ms(), 0);
    }
}
