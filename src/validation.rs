// Typed checks on generator output before a quiz is allowed to start

use crate::models::QuizData;
use std::collections::HashSet;
use thiserror::Error;

pub const OPTIONS_PER_QUESTION: usize = 4;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("response is not a quiz document: {0}")]
    Shape(#[from] serde_json::Error),
    #[error("quiz title is empty")]
    EmptyTitle,
    #[error("quiz has no questions")]
    NoQuestions,
    #[error("expected {expected} questions, got {actual}")]
    WrongCount { expected: usize, actual: usize },
    #[error("question id {0} appears more than once")]
    DuplicateId(i64),
    #[error("question {id}: {issue}")]
    Question { id: i64, issue: String },
}

fn issue(id: i64, issue: impl Into<String>) -> ValidationError {
    ValidationError::Question { id, issue: issue.into() }
}

/// Parses and checks raw generator text. `expected` is the requested
/// question count, if any.
pub fn validate_quiz(text: &str, expected: Option<usize>) -> Result<QuizData, ValidationError> {
    let quiz: QuizData = serde_json::from_str(text.trim())?;

    if quiz.title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    if quiz.questions.is_empty() {
        return Err(ValidationError::NoQuestions);
    }
    if let Some(expected) = expected {
        if quiz.questions.len() != expected {
            return Err(ValidationError::WrongCount {
                expected,
                actual: quiz.questions.len(),
            });
        }
    }

    let mut ids = HashSet::new();
    for q in &quiz.questions {
        if !ids.insert(q.id) {
            return Err(ValidationError::DuplicateId(q.id));
        }
        if q.text.trim().is_empty() {
            return Err(issue(q.id, "text is empty"));
        }
        if q.options.len() != OPTIONS_PER_QUESTION {
            return Err(issue(
                q.id,
                format!("has {} options, expected {OPTIONS_PER_QUESTION}", q.options.len()),
            ));
        }
        let distinct: HashSet<&str> = q.options.iter().map(String::as_str).collect();
        if distinct.len() != q.options.len() {
            return Err(issue(q.id, "options are not distinct"));
        }
        if !distinct.contains(q.correct_answer.as_str()) {
            return Err(issue(q.id, "correctAnswer matches no option"));
        }
    }

    Ok(quiz)
}
