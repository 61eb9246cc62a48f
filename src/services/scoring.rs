use crate::models::domain::{Quest, Question, UserAnswerAttempt, UserQuestAttempt};

/// Tolerance used whenever two scores are compared for equality.
pub const SCORE_EPSILON: f64 = 1e-9;

pub fn scores_equal(a: f64, b: f64) -> bool {
    (a - b).abs() <= SCORE_EPSILON
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestionScore {
    pub question_id: String,
    pub correct_count: usize,
    pub answer_count: usize,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredAttempt {
    pub answer_attempts: Vec<UserAnswerAttempt>,
    pub question_scores: Vec<QuestionScore>,
    pub total_score_achieved: f64,
}

pub struct ScoringService;

impl ScoringService {
    /// Per-row partial credit for one question.
    ///
    /// A row is correctly classified when `is_selected == is_correct`; each
    /// such row earns `max_score / answer_count`. Rows for answers that are
    /// no longer part of the question earn nothing.
    pub fn score_question(question: &Question, rows: &mut [&mut UserAnswerAttempt]) -> QuestionScore {
        let answer_count = question.answers.len();
        let weight_per_option = if answer_count > 0 {
            question.max_score / answer_count as f64
        } else {
            0.0
        };

        let mut correct_count = 0;
        for row in rows.iter_mut() {
            let is_correct = question
                .answers
                .iter()
                .find(|answer| answer.id == row.answer_id)
                .map(|answer| answer.is_correct);

            row.score_achieved = match is_correct {
                Some(is_correct) if row.is_selected == is_correct => {
                    correct_count += 1;
                    weight_per_option
                }
                _ => 0.0,
            };
        }

        QuestionScore {
            question_id: question.id.clone(),
            correct_count,
            answer_count,
            score: correct_count as f64 * weight_per_option,
        }
    }

    /// Scores every row of `attempt` against `quest` and sums the total.
    pub fn score_attempt(quest: &Quest, attempt: &UserQuestAttempt) -> ScoredAttempt {
        let mut answer_attempts = attempt.answer_attempts.clone();
        let mut question_scores = Vec::with_capacity(quest.questions.len());

        for question in &quest.questions {
            let mut rows: Vec<&mut UserAnswerAttempt> = answer_attempts
                .iter_mut()
                .filter(|row| row.question_id == question.id)
                .collect();
            question_scores.push(Self::score_question(question, &mut rows));
        }

        // Rows pointing at questions the quest no longer has earn nothing.
        for row in answer_attempts.iter_mut() {
            if quest.question(&row.question_id).is_none() {
                row.score_achieved = 0.0;
            }
        }

        let total_score_achieved = Self::total_score(&answer_attempts);

        ScoredAttempt {
            answer_attempts,
            question_scores,
            total_score_achieved,
        }
    }

    pub fn total_score(rows: &[UserAnswerAttempt]) -> f64 {
        rows.iter().map(|row| row.score_achieved).sum()
    }
}
