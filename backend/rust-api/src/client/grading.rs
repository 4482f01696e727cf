use chrono::{DateTime, Utc};
use std::{collections::HashMap, time::Duration};

use crate::models::catalog::{Question, TestAttempt};

/// Minimum percentage for a passed test.
pub const PASSING_SCORE: u32 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestOutcome {
    pub score: u32,
    pub correct_answers: u32,
    pub total_questions: u32,
    pub time_spent_seconds: u64,
    pub passed: bool,
}

/// Scores a finished run. `selections` maps question id to the chosen
/// answer id; unanswered questions count as wrong.
pub fn grade(
    questions: &[Question],
    selections: &HashMap<String, String>,
    time_spent: Duration,
) -> TestOutcome {
    let total_questions = questions.len() as u32;
    let correct_answers = questions
        .iter()
        .filter(|question| is_answered_correctly(question, selections))
        .count() as u32;

    let score = if total_questions == 0 {
        0
    } else {
        (f64::from(correct_answers) / f64::from(total_questions) * 100.0).round() as u32
    };

    TestOutcome {
        score,
        correct_answers,
        total_questions,
        time_spent_seconds: time_spent.as_secs(),
        passed: total_questions > 0 && score >= PASSING_SCORE,
    }
}

fn is_answered_correctly(question: &Question, selections: &HashMap<String, String>) -> bool {
    let Some(selected) = question
        .id
        .as_ref()
        .and_then(|id| selections.get(id))
    else {
        return false;
    };

    question
        .answers
        .iter()
        .any(|answer| answer.is_correct && answer.id.as_ref() == Some(selected))
}

impl TestOutcome {
    /// Result document for `test_results`; completion is start plus time spent.
    pub fn into_attempt(
        self,
        user_id: Option<String>,
        category_id: Option<String>,
        started_at: DateTime<Utc>,
    ) -> TestAttempt {
        let elapsed = i64::try_from(self.time_spent_seconds).unwrap_or(i64::MAX);
        TestAttempt {
            id: None,
            user_id,
            test_id: None,
            category_id,
            score: self.score,
            correct_answers: self.correct_answers,
            total_questions: self.total_questions,
            time_spent_seconds: self.time_spent_seconds,
            passed: self.passed,
            started_at: Some(started_at),
            completed_at: chrono::Duration::try_seconds(elapsed)
                .and_then(|spent| started_at.checked_add_signed(spent)),
        }
    }
}
