use crate::models::{Question, QuizData, QuizMode, UserAnswer};
use thiserror::Error;

/// Where the current question stands.
#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    Selecting,
    Selected(String),
    /// Practice only: the answer is recorded and the explanation is showing.
    Feedback(UserAnswer),
    Finished,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionFlowError {
    #[error("quiz has no questions")]
    EmptyQuiz,
    #[error("answer is already confirmed")]
    Locked,
    #[error("{0:?} is not one of the options")]
    UnknownOption(String),
    #[error("no option selected")]
    NothingSelected,
    #[error("no feedback is showing")]
    NoFeedback,
    #[error("quiz is finished")]
    Finished,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Feedback { is_correct: bool },
    Advanced { index: usize },
    /// Carries every answer, including the one just recorded.
    Completed(Vec<UserAnswer>),
}

#[derive(Debug, Clone)]
pub struct QuizSession {
    quiz: QuizData,
    mode: QuizMode,
    index: usize,
    phase: Phase,
    answers: Vec<UserAnswer>,
}

impl QuizSession {
    pub fn new(quiz: QuizData, mode: QuizMode) -> Result<Self, SessionFlowError> {
        if quiz.questions.is_empty() {
            return Err(SessionFlowError::EmptyQuiz);
        }
        Ok(Self {
            quiz,
            mode,
            index: 0,
            phase: Phase::Selecting,
            answers: Vec::new(),
        })
    }

    pub fn quiz(&self) -> &QuizData {
        &self.quiz
    }

    pub fn mode(&self) -> QuizMode {
        self.mode
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn answers(&self) -> &[UserAnswer] {
        &self.answers
    }

    pub fn current(&self) -> Option<&Question> {
        match self.phase {
            Phase::Finished => None,
            _ => self.quiz.questions.get(self.index),
        }
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.quiz.questions.len()
    }

    /// Percentage of questions behind the current one.
    pub fn progress(&self) -> f64 {
        let done = match self.phase {
            Phase::Finished => self.quiz.questions.len(),
            _ => self.index,
        };
        done as f64 / self.quiz.questions.len() as f64 * 100.0
    }

    /// Explanation for the answer just confirmed, while feedback is showing.
    pub fn feedback(&self) -> Option<(&UserAnswer, &str)> {
        match &self.phase {
            Phase::Feedback(a) => Some((a, self.quiz.questions[self.index].explanation.as_str())),
            _ => None,
        }
    }

    pub fn select(&mut self, option: &str) -> Result<(), SessionFlowError> {
        match self.phase {
            Phase::Finished => return Err(SessionFlowError::Finished),
            Phase::Feedback(_) => return Err(SessionFlowError::Locked),
            Phase::Selecting | Phase::Selected(_) => {}
        }
        let q = &self.quiz.questions[self.index];
        if !q.options.iter().any(|o| o == option) {
            return Err(SessionFlowError::UnknownOption(option.to_string()));
        }
        self.phase = Phase::Selected(option.to_string());
        Ok(())
    }

    /// Records the selected option. Exam mode moves straight on; practice
    /// mode shows feedback and waits for [`QuizSession::next`].
    pub fn confirm(&mut self) -> Result<Outcome, SessionFlowError> {
        let selected = match &self.phase {
            Phase::Selected(s) => s.clone(),
            Phase::Selecting => return Err(SessionFlowError::NothingSelected),
            Phase::Feedback(_) => return Err(SessionFlowError::Locked),
            Phase::Finished => return Err(SessionFlowError::Finished),
        };

        let q = &self.quiz.questions[self.index];
        let answer = UserAnswer {
            question_id: q.id,
            is_correct: q.is_correct(&selected),
            selected_option: selected,
        };
        self.answers.push(answer.clone());

        match self.mode {
            QuizMode::Practice => {
                let is_correct = answer.is_correct;
                self.phase = Phase::Feedback(answer);
                Ok(Outcome::Feedback { is_correct })
            }
            QuizMode::Exam => Ok(self.advance()),
        }
    }

    pub fn next(&mut self) -> Result<Outcome, SessionFlowError> {
        match self.phase {
            Phase::Feedback(_) => Ok(self.advance()),
            Phase::Finished => Err(SessionFlowError::Finished),
            _ => Err(SessionFlowError::NoFeedback),
        }
    }

    fn advance(&mut self) -> Outcome {
        if self.is_last() {
            self.phase = Phase::Finished;
            Outcome::Completed(self.answers.clone())
        } else {
            self.index += 1;
            self.phase = Phase::Selecting;
            Outcome::Advanced { index: self.index }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn quiz(n: usize) -> QuizData {
        QuizData {
            title: "Cell Biology".into(),
            estimated_time_minutes: 5.0,
            questions: (1..=n as i64)
                .map(|id| Question {
                    id,
                    text: format!("Q{id}"),
                    options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
                    correct_answer: "B".into(),
                    explanation: format!("B is right for Q{id}"),
                    difficulty: "Beginner".into(),
                    topic_tag: "cells".into(),
                })
                .collect(),
        }
    }

    #[test]
    fn exam_mode_records_n_answers_without_feedback() {
        let mut s = QuizSession::new(quiz(3), QuizMode::Exam).unwrap();
        s.select("B").unwrap();
        assert_eq!(s.confirm().unwrap(), Outcome::Advanced { index: 1 });
        assert_eq!(s.phase(), &Phase::Selecting);
        s.select("A").unwrap();
        assert_eq!(s.confirm().unwrap(), Outcome::Advanced { index: 2 });
        s.select("B").unwrap();

        match s.confirm().unwrap() {
            Outcome::Completed(answers) => {
                assert_eq!(answers.len(), 3);
                // the last answer is included
                assert_eq!(answers[2].question_id, 3);
                assert_eq!(
                    answers.iter().map(|a| a.is_correct).collect::<Vec<_>>(),
                    vec![true, false, true]
                );
            }
            other => panic!("expected completion, got {other:?}"),
        }
        assert_eq!(s.phase(), &Phase::Finished);
        assert_eq!(s.select("A"), Err(SessionFlowError::Finished));
        assert_eq!(s.progress(), 100.0);
    }

    #[test]
    fn practice_mode_locks_answer_behind_feedback() {
        let mut s = QuizSession::new(quiz(2), QuizMode::Practice).unwrap();
        s.select("C").unwrap();
        s.select("D").unwrap(); // changing your mind before confirming is fine
        assert_eq!(s.confirm().unwrap(), Outcome::Feedback { is_correct: false });

        let (answer, explanation) = s.feedback().unwrap();
        assert_eq!(answer.selected_option, "D");
        assert_eq!(explanation, "B is right for Q1");

        assert_eq!(s.select("B"), Err(SessionFlowError::Locked));
        assert_eq!(s.confirm(), Err(SessionFlowError::Locked));
        assert_eq!(s.answers().len(), 1);
        assert_eq!(s.answers()[0].selected_option, "D");

        assert_eq!(s.next().unwrap(), Outcome::Advanced { index: 1 });
        s.select("B").unwrap();
        assert_eq!(s.confirm().unwrap(), Outcome::Feedback { is_correct: true });
        match s.next().unwrap() {
            Outcome::Completed(a) => assert_eq!(a.len(), 2),
            other => panic!("expected completion, got {other:?}"),
        }
    }

    #[test]
    fn guards_against_out_of_order_actions() {
        assert_eq!(
            QuizSession::new(quiz(0), QuizMode::Exam).unwrap_err(),
            SessionFlowError::EmptyQuiz
        );
        let mut s = QuizSession::new(quiz(1), QuizMode::Practice).unwrap();
        assert_eq!(s.confirm(), Err(SessionFlowError::NothingSelected));
        assert_eq!(s.next(), Err(SessionFlowError::NoFeedback));
        assert_eq!(s.select("E"), Err(SessionFlowError::UnknownOption("E".into())));
        assert!(s.feedback().is_none());
        assert_eq!(s.progress(), 0.0);
        assert!(s.is_last());
    }
}
